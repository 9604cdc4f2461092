//! Protobuf envelopes exchanged with the module gateway.
//!
//! Field tags mirror the gateway's `InternalProtocol` schema; changing any
//! tag breaks wire compatibility with deployed gateways.

use prost::{Enumeration, Message, Oneof};

/// Identity block carried by both the connect request and every status.
#[derive(Clone, PartialEq, Message)]
pub struct Device {
    #[prost(uint32, tag = "1")]
    pub module: u32,
    #[prost(uint32, tag = "2")]
    pub device_type: u32,
    #[prost(string, tag = "3")]
    pub device_role: String,
    #[prost(string, tag = "4")]
    pub device_name: String,
    #[prost(uint32, tag = "5")]
    pub priority: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceConnect {
    #[prost(message, optional, tag = "1")]
    pub device: Option<Device>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceStatus {
    #[prost(message, optional, tag = "1")]
    pub device: Option<Device>,
    #[prost(bytes = "vec", tag = "2")]
    pub status_data: Vec<u8>,
}

/// Gateway verdict on a `device_connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ResponseType {
    Ok = 0,
    /// A device with the same name and type is already connected.
    AlreadyConnected = 1,
    /// The gateway does not serve the requested module.
    ModuleNotSupported = 2,
    /// The module does not know the device type.
    DeviceNotSupported = 3,
    /// A device of the same type with higher priority holds the slot.
    HigherPriorityAlreadyConnected = 4,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceConnectResponse {
    #[prost(enumeration = "ResponseType", tag = "1")]
    pub response_type: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceCommand {
    #[prost(bytes = "vec", tag = "1")]
    pub command_data: Vec<u8>,
}

/// Device → gateway envelope.
#[derive(Clone, PartialEq, Message)]
pub struct ClientMessage {
    #[prost(oneof = "ClientPayload", tags = "1, 2")]
    pub payload: Option<ClientPayload>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ClientPayload {
    #[prost(message, tag = "1")]
    DeviceConnect(DeviceConnect),
    #[prost(message, tag = "2")]
    DeviceStatus(DeviceStatus),
}

/// Gateway → device envelope.
#[derive(Clone, PartialEq, Message)]
pub struct ServerMessage {
    #[prost(oneof = "ServerPayload", tags = "1, 2")]
    pub payload: Option<ServerPayload>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ServerPayload {
    #[prost(message, tag = "1")]
    DeviceConnectResponse(DeviceConnectResponse),
    #[prost(message, tag = "2")]
    DeviceCommand(DeviceCommand),
}

impl ClientMessage {
    pub fn connect(device: Device) -> Self {
        Self {
            payload: Some(ClientPayload::DeviceConnect(DeviceConnect {
                device: Some(device),
            })),
        }
    }

    pub fn status(device: Device, status_data: Vec<u8>) -> Self {
        Self {
            payload: Some(ClientPayload::DeviceStatus(DeviceStatus {
                device: Some(device),
                status_data,
            })),
        }
    }
}

impl ServerMessage {
    pub fn connect_response(response_type: ResponseType) -> Self {
        Self {
            payload: Some(ServerPayload::DeviceConnectResponse(DeviceConnectResponse {
                response_type: response_type as i32,
            })),
        }
    }

    pub fn command(command_data: Vec<u8>) -> Self {
        Self {
            payload: Some(ServerPayload::DeviceCommand(DeviceCommand { command_data })),
        }
    }
}
