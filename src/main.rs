// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN daemon

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use dohome_lan::constants::{COMMAND_PORT, DEFAULT_SETTLE_DELAY_MS, DEVICE_TCP_PORT, DISCOVERY_PORT};
use dohome_lan::{ClientConfig, ClientEvent, DoHomeClient};

/// How long to wait for the listener to wind down on exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "dohome-lan")]
#[command(about = "Discover and monitor DoHome LED controllers on the local network")]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults are used when
    /// omitted.
    #[arg(long)]
    config: Option<String>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    client: ClientToml,
    #[serde(default)]
    listener: ListenerToml,
}

#[derive(Debug, Deserialize)]
struct ClientToml {
    #[serde(default = "default_command_port")]
    command_port: u16,
    #[serde(default = "default_discovery_port")]
    discovery_port: u16,
    #[serde(default = "default_device_port")]
    device_port: u16,
    /// Local IPv4 addresses to bind. All non-loopback interfaces when omitted.
    #[serde(default)]
    interfaces: Option<Vec<Ipv4Addr>>,
    #[serde(default = "default_broadcast_addr")]
    broadcast_addr: Ipv4Addr,
    #[serde(default = "default_settle_delay")]
    settle_delay_ms: u64,
    #[serde(default = "default_command_timeout")]
    command_timeout_ms: u64,
    #[serde(default = "default_event_capacity")]
    event_capacity: usize,
}

impl Default for ClientToml {
    fn default() -> Self {
        Self {
            command_port: default_command_port(),
            discovery_port: default_discovery_port(),
            device_port: default_device_port(),
            interfaces: None,
            broadcast_addr: default_broadcast_addr(),
            settle_delay_ms: default_settle_delay(),
            command_timeout_ms: default_command_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListenerToml {
    /// Color poll period in milliseconds, 0 to disable
    #[serde(default = "default_refresh_interval")]
    refresh_interval_ms: u64,
    /// Discovery probe period in milliseconds, 0 to disable
    #[serde(default = "default_discover_interval")]
    discover_interval_ms: u64,
}

impl Default for ListenerToml {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval(),
            discover_interval_ms: default_discover_interval(),
        }
    }
}

fn default_command_port() -> u16 {
    COMMAND_PORT
}
fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}
fn default_device_port() -> u16 {
    DEVICE_TCP_PORT
}
fn default_broadcast_addr() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}
fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}
fn default_command_timeout() -> u64 {
    5000
}
fn default_event_capacity() -> usize {
    256
}
fn default_refresh_interval() -> u64 {
    30_000
}
fn default_discover_interval() -> u64 {
    60_000
}

fn build_client_config(toml: &ClientToml) -> ClientConfig {
    let mut builder = ClientConfig::builder()
        .command_port(toml.command_port)
        .discovery_port(toml.discovery_port)
        .device_port(toml.device_port)
        .broadcast_addr(toml.broadcast_addr)
        .settle_delay_ms(toml.settle_delay_ms)
        .command_timeout_ms(toml.command_timeout_ms)
        .event_capacity(toml.event_capacity);
    if let Some(interfaces) = &toml.interfaces {
        builder = builder.interfaces(interfaces.iter().copied());
    }
    builder.build()
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&text).context("Failed to parse config file")
        }
        None => Ok(Config::default()),
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

async fn log_events(mut rx: dohome_lan::EventReceiver) {
    loop {
        match rx.recv().await {
            Ok(ClientEvent::DeviceDiscovered(device)) => {
                info!(
                    "Discovered {} ({}) at {}, chip {}",
                    device.device_name(),
                    device.device_id(),
                    device.sta_ip(),
                    device.chip()
                );
            }
            Ok(ClientEvent::ColorChanged { device, new, .. }) => {
                info!(
                    "{}: r={} g={} b={} w={} m={}",
                    device.device_name(),
                    new.red(),
                    new.green(),
                    new.blue(),
                    new.white(),
                    new.warmth()
                );
            }
            Ok(ClientEvent::ListenerStateChanged(state)) => {
                debug!("Listener {}", state);
            }
            Err(RecvError::Lagged(n)) => warn!("Event logger lagged, {} events dropped", n),
            Err(RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=dohome_lan=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let client = DoHomeClient::bind(build_client_config(&config.client))
            .await
            .context("Failed to bind client sockets")?;
        let event_handle = tokio::spawn(log_events(client.subscribe()));

        client
            .start_listener(
                config.listener.refresh_interval_ms,
                config.listener.discover_interval_ms,
            )
            .await
            .context("Failed to start listener")?;
        info!(
            "Listening on {:?}. Send SIGHUP to reload, SIGINT/SIGTERM to stop.",
            client.local_endpoints()
        );

        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting listener...");
                true
            }
        };

        client.stop_listener().await;
        if timeout(STOP_TIMEOUT, client.wait_until_stopped()).await.is_err() {
            warn!(
                "Listener still {} after {:?}",
                client.listener_state(),
                STOP_TIMEOUT
            );
        }

        for device in client.devices().await {
            let color = device.last_known_color().await;
            info!(
                "Known device {} ({}) at {}, last color {:?}",
                device.device_name(),
                device.short_id(),
                device.sta_ip(),
                color
            );
        }
        event_handle.abort();

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        match load_config(cli.config.as_deref()) {
            Ok(new_config) => config = new_config,
            Err(e) => warn!("Config reload failed, keeping previous config: {e:#}"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}
