//! Builder pattern for constructing a [`DeviceClient`].

use std::sync::Arc;
use std::time::Duration;

use crate::client::DeviceClient;
use crate::config::{DeviceIdentity, GatewayConfig};
use crate::connector::{Connector, TcpConnector};
use crate::types::ClientError;

/// Fluent builder for [`DeviceClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use mg_device_sdk::DeviceClientBuilder;
/// # async fn run() -> Result<(), mg_device_sdk::ClientError> {
/// let mut client = DeviceClientBuilder::new()
///     .host("127.0.0.1")
///     .port(8888)
///     .module_id(0)
///     .device_name("button1")
///     .device_type(0)
///     .device_role("left_button")
///     .connection_retry_count(3)
///     .connect()
///     .await?;
/// client.send_status(br#"{"pressed":false}"#, 10_000).await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceClientBuilder {
    pub(crate) gateway: GatewayConfig,
    pub(crate) identity: DeviceIdentity,
    pub(crate) connector: Option<Arc<dyn Connector>>,
    pub(crate) span: Option<tracing::Span>,
}

impl DeviceClientBuilder {
    pub fn new() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            identity: DeviceIdentity::default(),
            connector: None,
            span: None,
        }
    }

    // ── Gateway ──────────────────────────────────────────────────────

    /// Replace all gateway settings at once (e.g. from a config file).
    pub fn gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.gateway.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.gateway.port = port;
        self
    }

    /// Bound on each TCP connect and handshake (default 1s).
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.gateway.connect_timeout_ms = d.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Connect + handshake attempts per `establish()` (default 1).
    pub fn connection_retry_count(mut self, n: u32) -> Self {
        self.gateway.connection_retry_count = n;
        self
    }

    /// Reconnect-and-resend iterations after a failed status (default 1).
    pub fn send_retry_count(mut self, n: u32) -> Self {
        self.gateway.send_retry_count = n;
        self
    }

    /// Maximum accepted response payload (default 16 MiB).
    pub fn max_frame_bytes(mut self, n: usize) -> Self {
        self.gateway.max_frame_bytes = n;
        self
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Set all identity fields at once.
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn module_id(mut self, id: u32) -> Self {
        self.identity.module_id = id;
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.identity.name = name.into();
        self
    }

    /// Module-specific device type.
    pub fn device_type(mut self, t: u32) -> Self {
        self.identity.device_type = t;
        self
    }

    pub fn device_role(mut self, role: impl Into<String>) -> Self {
        self.identity.role = role.into();
        self
    }

    pub fn device_priority(mut self, priority: u32) -> Self {
        self.identity.priority = priority;
        self
    }

    // ── Collaborators ────────────────────────────────────────────────

    /// Override how connections are opened (default: TCP to `host:port`).
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Span the client's log events are recorded under.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Validate settings and build a disconnected [`DeviceClient`].
    pub fn build(self) -> Result<DeviceClient, ClientError> {
        self.gateway.validate()?;
        self.identity.validate()?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TcpConnector::new(
                self.gateway.host.clone(),
                self.gateway.port,
            )),
        };
        let span = self.span.unwrap_or_else(|| {
            tracing::info_span!(
                "device_client",
                device = %self.identity.name,
                module_id = self.identity.module_id
            )
        });

        Ok(DeviceClient::new(self.gateway, self.identity, connector, span))
    }

    /// Build and connect.  On failure no connection is left open.
    pub async fn connect(self) -> Result<DeviceClient, ClientError> {
        let mut client = self.build()?;
        client.establish().await?;
        Ok(client)
    }
}

impl Default for DeviceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
