use std::time::Duration;

use mg_protocol::{Device, DEFAULT_MAX_FRAME_BYTES};
use serde::{Deserialize, Serialize};

use crate::types::ClientError;

/// Module identifier used when none is configured.
pub const DEFAULT_MODULE_ID: u32 = 0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the gateway lives and how hard to try reaching it.
///
/// Fixed for the lifetime of a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_8888")]
    pub port: u16,
    /// Bounds both the TCP connect and the handshake exchange.
    #[serde(default = "d_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Connect + handshake attempts made by `establish()`.
    #[serde(default = "d_1")]
    pub connection_retry_count: u32,
    /// Reconnect-and-resend iterations after a failed status send.
    /// Each iteration makes a single connection attempt.
    #[serde(default = "d_1")]
    pub send_retry_count: u32,
    /// Largest response payload accepted from the gateway.
    #[serde(default = "d_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_8888(),
            connect_timeout_ms: d_connect_timeout_ms(),
            connection_retry_count: d_1(),
            send_retry_count: d_1(),
            max_frame_bytes: d_max_frame_bytes(),
        }
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("gateway host is required".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::Config("connect_timeout_ms must be positive".into()));
        }
        if self.connection_retry_count == 0 {
            return Err(ClientError::Config(
                "connection_retry_count must be at least 1".into(),
            ));
        }
        if self.send_retry_count == 0 {
            return Err(ClientError::Config("send_retry_count must be at least 1".into()));
        }
        if self.max_frame_bytes == 0 {
            return Err(ClientError::Config("max_frame_bytes must be positive".into()));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who this device is.  Sent with the handshake and with every status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(default = "d_module_id")]
    pub module_id: u32,
    pub name: String,
    /// Module-specific device type.
    #[serde(default)]
    pub device_type: u32,
    #[serde(default)]
    pub role: String,
    /// Higher priority wins when two devices of the same type compete.
    #[serde(default)]
    pub priority: u32,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            module_id: DEFAULT_MODULE_ID,
            name: String::new(),
            device_type: 0,
            role: String::new(),
            priority: 0,
        }
    }
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, device_type: u32, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type,
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn with_module_id(mut self, module_id: u32) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.is_empty() {
            return Err(ClientError::Config("device name is required".into()));
        }
        Ok(())
    }

    pub(crate) fn to_device(&self) -> Device {
        Device {
            module: self.module_id,
            device_type: self.device_type,
            device_name: self.name.clone(),
            device_role: self.role.clone(),
            priority: self.priority,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_8888() -> u16 {
    8888
}

fn d_connect_timeout_ms() -> u64 {
    1_000
}

fn d_1() -> u32 {
    1
}

fn d_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn d_module_id() -> u32 {
    DEFAULT_MODULE_ID
}
