//! Opening the transport-level connection to the gateway.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::types::ClientError;

/// Byte stream the client talks over.
pub trait GatewayStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T> GatewayStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

pub type BoxedStream = Box<dyn GatewayStream>;

/// Opens a fresh connection for each connect attempt.
///
/// Implementations classify their own failures: an attempt that runs out of
/// time is [`ClientError::Timeout`], one the peer turns away is
/// [`ClientError::ConnectionRefused`].
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, timeout: Duration) -> Result<BoxedStream, ClientError>;

    /// `host:port` (or similar) for log lines.
    fn endpoint(&self) -> String;
}

/// Plain TCP to `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, timeout: Duration) -> Result<BoxedStream, ClientError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(classify_connect_error(&self.endpoint(), e)),
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "connecting to {} took longer than {} ms",
                    self.endpoint(),
                    timeout.as_millis()
                )))
            }
        };
        // Frames are small request/response pairs; don't let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn classify_connect_error(endpoint: &str, e: io::Error) -> ClientError {
    match e.kind() {
        io::ErrorKind::TimedOut => ClientError::Timeout(format!("connecting to {endpoint}: {e}")),
        _ => ClientError::ConnectionRefused(format!("{endpoint}: {e}")),
    }
}
