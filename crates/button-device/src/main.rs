//! Reference "button" device for the module gateway.
//!
//! Connects to the gateway, then loops: report `{"pressed": <bool>}` as the
//! device status, log the command the gateway sends back.  Exits when the
//! client gives up (the context is invalid at that point).
//!
//! Usage:
//!   mg-button-device --config device.toml
//!   mg-button-device --host 127.0.0.1 --port 8888 --name button1
//!
//! Config file (all keys optional):
//!
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 8888
//! connect_timeout_ms = 1000
//! connection_retry_count = 1
//! send_retry_count = 1
//!
//! [device]
//! module_id = 0
//! name = "button1"
//! device_type = 0
//! role = "left_button"
//! priority = 0
//! ```
//!
//! Env vars:
//!   MG_CONFIG  config path when `--config` is not given (default: "device.toml")
//!   RUST_LOG   log filter (default: "info")

use clap::Parser;
use mg_device_sdk::{ClientError, DeviceClient, DeviceIdentity, ErrorKind, GatewayConfig};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Button device speaking the module-gateway protocol.
#[derive(Debug, Parser)]
#[command(name = "mg-button-device", version, about)]
struct Cli {
    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(long, env = "MG_CONFIG", default_value = "device.toml")]
    config: String,
    /// Gateway host (overrides the config file).
    #[arg(long)]
    host: Option<String>,
    /// Gateway port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
    /// Device name (overrides the config file).
    #[arg(long)]
    name: Option<String>,
    /// Per-status send timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: i64,
    /// Stop after this many statuses (0 runs until the client gives up).
    #[arg(long, default_value_t = 0)]
    count: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DeviceConfig {
    #[serde(default)]
    gateway: GatewayConfig,
    #[serde(default = "d_device")]
    device: DeviceIdentity,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            device: d_device(),
        }
    }
}

fn d_device() -> DeviceIdentity {
    DeviceIdentity::new("button1", 0, "left_button")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let (mut config, config_path) = load_config(&cli.config)?;
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(name) = cli.name {
        config.device.name = name;
    }

    tracing::info!(
        config = %config_path,
        endpoint = %config.gateway.endpoint(),
        device = %config.device.name,
        "starting button device"
    );

    let mut client = match DeviceClient::connect(config.gateway, config.device).await {
        Ok(client) => client,
        Err(e) => {
            report_connect_failure(&e);
            std::process::exit(1);
        }
    };
    tracing::info!(client = %client, "connected");

    let mut sent: u64 = 0;
    loop {
        let status = serde_json::json!({ "pressed": button_state(sent) });
        let data = serde_json::to_vec(&status)?;

        if let Err(e) = client.send_status(&data, cli.timeout_ms).await {
            match e.kind() {
                ErrorKind::Timeout => tracing::error!(error = %e, "gateway timed out, context invalid"),
                _ => tracing::error!(error = %e, "gateway error, context invalid"),
            }
            break;
        }

        let command = client.get_command()?;
        tracing::info!(
            status = %status,
            command = %String::from_utf8_lossy(command),
            "received command"
        );

        sent += 1;
        if cli.count > 0 && sent >= cli.count {
            break;
        }
    }

    client.destroy();
    tracing::info!(statuses = sent, "device exiting");
    Ok(())
}

fn load_config(config_path: &str) -> anyhow::Result<(DeviceConfig, String)> {
    let config = if std::path::Path::new(config_path).exists() {
        let raw = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        parse_config(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        DeviceConfig::default()
    };

    Ok((config, config_path.to_string()))
}

fn parse_config(raw: &str) -> Result<DeviceConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn report_connect_failure(e: &ClientError) {
    match e.kind() {
        ErrorKind::Rejection(rejection) => tracing::error!(
            reason = %rejection,
            "device could not be connected, gateway refused it"
        ),
        _ => tracing::error!(error = %e, "couldn't connect to gateway"),
    }
}

/// Stand-in for reading a real button: released, pressed, released, ...
fn button_state(step: u64) -> bool {
    step % 2 == 1
}
