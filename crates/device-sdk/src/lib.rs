//! `mg-device-sdk`: client side of the module-gateway device protocol.
//!
//! A "device" is any process that reports its status to a module gateway
//! and receives a command back for every status it sends.  This crate owns
//! the connection so device authors only decide *what* to report and *what*
//! to do with the command.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your device loop                                         │
//! │                                                           │
//! │   let mut client = DeviceClientBuilder::new()             │
//! │       .host("127.0.0.1").port(8888)                       │
//! │       .device_name("button1")                             │
//! │       .device_role("left_button")                         │
//! │       .connect().await?;                                  │
//! │   loop {                                                  │
//! │       client.send_status(&status, 10_000).await?;         │
//! │       let command = client.get_command()?;                │
//! │   }                                                       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection flow (hard-coded by the SDK)
//!
//! 1. Open TCP to the gateway (bounded by the connect timeout)
//! 2. Send `device_connect { device }`
//! 3. Wait for `device_connect_response { response_type }`; anything but
//!    `OK` is a terminal [`Rejection`]
//! 4. Each `send_status` sends `device_status { device, status_data }` and
//!    reads back `device_command { command_data }`
//! 5. On a transient failure, reconnect (steps 1–3) and resend, up to
//!    `send_retry_count` times
//!
//! Every frame is a big-endian `u32` length followed by the protobuf
//! envelope, see [`mg_protocol::frame`].
//!
//! # Errors
//!
//! [`ClientError`] separates rejections (never retried), transient failures
//! (retried within the budget), and usage errors (no I/O attempted).  Any
//! path that gives up leaves the client [`ConnectionState::Destroyed`].

pub mod builder;
pub mod client;
pub mod config;
pub mod connector;
pub mod handshake;
pub mod reconnect;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::DeviceClientBuilder;
pub use client::DeviceClient;
pub use config::{DeviceIdentity, GatewayConfig, DEFAULT_MODULE_ID};
pub use connector::{BoxedStream, Connector, GatewayStream, TcpConnector};
pub use types::{ClientError, ConnectionState, ErrorKind, Rejection};

// Re-export mg-protocol so devices never need to import it directly.
pub use mg_protocol::{ResponseType, DEFAULT_MAX_FRAME_BYTES};
