//! Core device client.  Owns the gateway connection, runs the bounded
//! connect loop and the status/command exchange.

use std::sync::Arc;
use std::time::Duration;

use mg_protocol::{ClientMessage, Device, Message, ServerMessage, ServerPayload};
use tracing::Instrument;

use crate::config::{DeviceIdentity, GatewayConfig};
use crate::connector::{BoxedStream, Connector};
use crate::handshake;
use crate::reconnect::RetryBudget;
use crate::transport::send_request;
use crate::types::{ClientError, ConnectionState};

/// Connection slot.  The stream exists only in `Connected`.
enum Connection {
    Disconnected,
    Connected(BoxedStream),
    Destroyed,
}

/// A device's session with the module gateway.
///
/// Create via [`DeviceClientBuilder`](crate::builder::DeviceClientBuilder)
/// or [`DeviceClient::connect`].  All operations take `&mut self`: one call
/// in flight at a time.  Wrap the client in a mutex to share it.
pub struct DeviceClient {
    gateway: GatewayConfig,
    identity: DeviceIdentity,
    connector: Arc<dyn Connector>,
    connection: Connection,
    pending_command: Option<Vec<u8>>,
    device: Device,
    /// `device_connect` envelope, encoded once.
    connect_message: Vec<u8>,
    span: tracing::Span,
}

impl DeviceClient {
    /// Start a new builder.
    pub fn builder() -> crate::builder::DeviceClientBuilder {
        crate::builder::DeviceClientBuilder::new()
    }

    /// Build a client for `identity` and connect it to the gateway.
    pub async fn connect(
        gateway: GatewayConfig,
        identity: DeviceIdentity,
    ) -> Result<Self, ClientError> {
        Self::builder()
            .gateway(gateway)
            .identity(identity)
            .connect()
            .await
    }

    pub(crate) fn new(
        gateway: GatewayConfig,
        identity: DeviceIdentity,
        connector: Arc<dyn Connector>,
        span: tracing::Span,
    ) -> Self {
        let device = identity.to_device();
        let connect_message = ClientMessage::connect(device.clone()).encode_to_vec();
        Self {
            gateway,
            identity,
            connector,
            connection: Connection::Disconnected,
            pending_command: None,
            device,
            connect_message,
            span,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.connection {
            Connection::Disconnected => ConnectionState::Disconnected,
            Connection::Connected(_) => ConnectionState::Connected,
            Connection::Destroyed => ConnectionState::Destroyed,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected(_))
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    /// (Re)connect to the gateway, closing any current connection first.
    ///
    /// Makes up to `connection_retry_count` connect + handshake attempts.
    /// A rejection stops immediately.  On any failure the client is
    /// destroyed.
    pub async fn establish(&mut self) -> Result<(), ClientError> {
        self.ensure_alive()?;
        let attempts = self.gateway.connection_retry_count;
        let span = self.span.clone();
        let result = self.connect_with_budget(attempts).instrument(span).await;
        if result.is_err() {
            self.destroy();
        }
        result
    }

    /// Report `data` as the device status and wait for the gateway's command.
    ///
    /// `timeout_ms` bounds each send/receive; it must not be negative.  On a
    /// transient failure the client reconnects and resends up to
    /// `send_retry_count` times.  Giving up, or being rejected while
    /// reconnecting, destroys the client.
    pub async fn send_status(&mut self, data: &[u8], timeout_ms: i64) -> Result<(), ClientError> {
        self.ensure_alive()?;
        let timeout = status_timeout(timeout_ms)?;
        let span = self.span.clone();
        self.exchange_status(data, timeout).instrument(span).await
    }

    /// The command received with the last successful status.
    ///
    /// Does not consume it: repeated calls return the same bytes until the
    /// next successful [`send_status`](Self::send_status).
    pub fn get_command(&self) -> Result<&[u8], ClientError> {
        self.ensure_alive()?;
        self.pending_command
            .as_deref()
            .ok_or(ClientError::NoCommand)
    }

    /// Close the connection and invalidate the client.  Safe to call again.
    pub fn destroy(&mut self) {
        if matches!(self.connection, Connection::Destroyed) {
            return;
        }
        let _entered = self.span.enter();
        tracing::info!(device = %self.identity.name, "destroying client");
        self.connection = Connection::Destroyed;
        self.pending_command = None;
    }

    // ── Connection manager ───────────────────────────────────────────

    async fn connect_with_budget(&mut self, attempts: u32) -> Result<(), ClientError> {
        self.close_handle();
        let endpoint = self.connector.endpoint();
        let mut budget = RetryBudget::new(attempts);

        while let Some(attempt) = budget.next_attempt() {
            if attempt > 1 {
                tracing::info!(endpoint = %endpoint, attempt, "retrying connection to gateway");
            } else {
                tracing::info!(endpoint = %endpoint, "connecting to gateway");
            }

            match self.open_session().await {
                Ok(stream) => {
                    self.connection = Connection::Connected(stream);
                    tracing::info!(
                        endpoint = %endpoint,
                        device = %self.identity.name,
                        attempt,
                        "connected to gateway"
                    );
                    return Ok(());
                }
                Err(e) if e.is_rejection() => {
                    tracing::error!(device = %self.identity.name, error = %e, "gateway refused device");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, attempt, error = %e, "connection attempt failed");
                    budget.record(e);
                }
            }
        }

        tracing::error!(
            endpoint = %endpoint,
            attempts = budget.attempts_made(),
            "could not establish connection to gateway"
        );
        Err(budget.exhausted())
    }

    /// One attempt: fresh stream + handshake.  A failed attempt drops its
    /// stream before returning.
    async fn open_session(&self) -> Result<BoxedStream, ClientError> {
        let timeout = self.gateway.connect_timeout();
        let mut stream = self.connector.connect(timeout).await?;
        handshake::perform(
            &mut stream,
            &self.connect_message,
            timeout,
            self.gateway.max_frame_bytes,
        )
        .await?;
        Ok(stream)
    }

    fn close_handle(&mut self) {
        if let Connection::Connected(_) = self.connection {
            self.connection = Connection::Disconnected;
        }
    }

    // ── Status exchange ──────────────────────────────────────────────

    async fn exchange_status(&mut self, data: &[u8], timeout: Duration) -> Result<(), ClientError> {
        let message = ClientMessage::status(self.device.clone(), data.to_vec()).encode_to_vec();

        let response = match self.send_on_current(&message, timeout).await {
            Ok(response) => response,
            Err(first) => {
                tracing::error!(error = %first, "status send failed, reconnecting");
                self.resend_after_reconnect(&message, timeout, first).await?
            }
        };

        let command = parse_command(&response)?;
        tracing::debug!(command_bytes = command.len(), "received device_command");
        self.pending_command = Some(command);
        Ok(())
    }

    /// Send on the open connection.  Any failure closes it.
    async fn send_on_current(
        &mut self,
        message: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let max_frame_bytes = self.gateway.max_frame_bytes;
        let result = match &mut self.connection {
            Connection::Connected(stream) => {
                send_request(stream, message, timeout, max_frame_bytes).await
            }
            Connection::Disconnected => Err(ClientError::ConnectionRefused(
                "not connected to gateway".into(),
            )),
            Connection::Destroyed => Err(ClientError::ContextDestroyed),
        };
        if result.is_err() {
            self.close_handle();
        }
        result
    }

    /// Each iteration makes one connect + handshake attempt and one resend,
    /// so a single status call never exceeds `send_retry_count` reconnects.
    async fn resend_after_reconnect(
        &mut self,
        message: &[u8],
        timeout: Duration,
        first: ClientError,
    ) -> Result<Vec<u8>, ClientError> {
        let mut budget = RetryBudget::new(self.gateway.send_retry_count);

        while let Some(iteration) = budget.next_attempt() {
            tracing::info!(iteration, "re-establishing connection to resend status");
            let outcome = match self.connect_with_budget(1).await {
                Ok(()) => self.send_on_current(message, timeout).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(response) => {
                    tracing::info!(reconnections = iteration, "status sent after reconnecting");
                    return Ok(response);
                }
                Err(e) if e.is_rejection() => {
                    self.destroy();
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "status resend failed");
                    budget.record(e);
                }
            }
        }

        tracing::error!(
            reconnections = budget.attempts_made(),
            "status was not sent, client is no longer usable"
        );
        self.destroy();
        Err(budget.into_last().unwrap_or(first))
    }

    fn ensure_alive(&self) -> Result<(), ClientError> {
        match self.connection {
            Connection::Destroyed => Err(ClientError::ContextDestroyed),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DeviceClient(module_id={}, device_name={}, device_type={}, priority={})",
            self.identity.module_id,
            self.identity.name,
            self.identity.device_type,
            self.identity.priority
        )
    }
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("endpoint", &self.connector.endpoint())
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("has_command", &self.pending_command.is_some())
            .finish()
    }
}

fn status_timeout(timeout_ms: i64) -> Result<Duration, ClientError> {
    u64::try_from(timeout_ms)
        .map(Duration::from_millis)
        .map_err(|_| ClientError::InvalidTimeout(timeout_ms))
}

/// Pull the command payload out of a status response.
fn parse_command(response: &[u8]) -> Result<Vec<u8>, ClientError> {
    match ServerMessage::decode(response)?.payload {
        Some(ServerPayload::DeviceCommand(command)) => Ok(command.command_data),
        _ => {
            tracing::error!("device_command missing in server message");
            Err(ClientError::MalformedResponse(
                "device_command missing in server message".into(),
            ))
        }
    }
}
