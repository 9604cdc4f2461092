//! Error taxonomy and connection state.

use mg_protocol::{FrameError, ResponseType};

/// Definitive refusal from the gateway during the handshake.
///
/// Maps 1:1 to the non-OK [`ResponseType`] codes.  A rejection is a policy
/// decision, so it is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    AlreadyConnected,
    ModuleNotSupported,
    DeviceNotSupported,
    HigherPriorityAlreadyConnected,
}

impl Rejection {
    /// `None` for [`ResponseType::Ok`].
    pub fn from_response(code: ResponseType) -> Option<Self> {
        match code {
            ResponseType::Ok => None,
            ResponseType::AlreadyConnected => Some(Self::AlreadyConnected),
            ResponseType::ModuleNotSupported => Some(Self::ModuleNotSupported),
            ResponseType::DeviceNotSupported => Some(Self::DeviceNotSupported),
            ResponseType::HigherPriorityAlreadyConnected => {
                Some(Self::HigherPriorityAlreadyConnected)
            }
        }
    }

    pub fn response_type(self) -> ResponseType {
        match self {
            Self::AlreadyConnected => ResponseType::AlreadyConnected,
            Self::ModuleNotSupported => ResponseType::ModuleNotSupported,
            Self::DeviceNotSupported => ResponseType::DeviceNotSupported,
            Self::HigherPriorityAlreadyConnected => ResponseType::HigherPriorityAlreadyConnected,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::AlreadyConnected => "device with the same name and type is already connected",
            Self::ModuleNotSupported => "module is not supported by the gateway",
            Self::DeviceNotSupported => "device type is not supported by the module",
            Self::HigherPriorityAlreadyConnected => {
                "device of the same type with higher priority is already connected"
            }
        };
        f.write_str(reason)
    }
}

/// Flat discriminant of [`ClientError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Rejection(Rejection),
    Timeout,
    ConnectionRefused,
    MalformedResponse,
    ContextDestroyed,
    NoCommand,
    InvalidTimeout,
    Config,
}

/// Every failure the client can report.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("rejected by gateway: {0}")]
    Rejected(Rejection),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("context already destroyed")]
    ContextDestroyed,
    #[error("no command available, call send_status first")]
    NoCommand,
    #[error("invalid timeout: {0} ms (must not be negative)")]
    InvalidTimeout(i64),
    #[error("config: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(r) => ErrorKind::Rejection(*r),
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ContextDestroyed => ErrorKind::ContextDestroyed,
            Self::NoCommand => ErrorKind::NoCommand,
            Self::InvalidTimeout(_) => ErrorKind::InvalidTimeout,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Retry-eligible: timeout, refusal or malformed response.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ConnectionRefused(_) | Self::MalformedResponse(_)
        )
    }

    /// Annotate a transient error with the size of the budget it exhausted.
    pub(crate) fn after_attempts(self, attempts: u32) -> Self {
        let suffix = format!(
            "gave up after {attempts} attempt{}",
            if attempts == 1 { "" } else { "s" }
        );
        match self {
            Self::Timeout(m) => Self::Timeout(format!("{m}; {suffix}")),
            Self::ConnectionRefused(m) => Self::ConnectionRefused(format!("{m}; {suffix}")),
            Self::MalformedResponse(m) => Self::MalformedResponse(format!("{m}; {suffix}")),
            other => other,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

impl From<mg_protocol::DecodeError> for ClientError {
    fn from(e: mg_protocol::DecodeError) -> Self {
        Self::MalformedResponse(format!("undecodable server message: {e}"))
    }
}

/// Observable connection state.  The stream handle exists only while
/// `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Destroyed,
}
