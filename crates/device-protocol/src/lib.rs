//! Module-gateway device protocol: wire framing and envelope types.
//!
//! Every message in either direction travels as one frame:
//!
//! ```text
//! ┌──────────────────────┬───────────────────────────────┐
//! │ length: u32 (BE, 4B) │ payload: `length` bytes       │
//! └──────────────────────┴───────────────────────────────┘
//! ```
//!
//! The payload is a protobuf envelope.  A device sends a [`ClientMessage`]
//! (`device_connect` once, then `device_status` repeatedly) and the gateway
//! answers each with a [`ServerMessage`] (`device_connect_response` for the
//! handshake, `device_command` for every status).

pub mod envelope;
pub mod frame;

pub use envelope::{
    ClientMessage, ClientPayload, Device, DeviceCommand, DeviceConnect, DeviceConnectResponse,
    DeviceStatus, ResponseType, ServerMessage, ServerPayload,
};
pub use frame::{
    decode_frame, decode_header, encode_frame, FrameError, DEFAULT_MAX_FRAME_BYTES,
    FRAME_HEADER_LEN,
};

/// Re-exported so callers can `encode_to_vec` / `decode` envelopes without
/// naming prost themselves.
pub use prost::{DecodeError, Message};
