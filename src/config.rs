// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::constants::{
    COMMAND_PORT, DEFAULT_SETTLE_DELAY_MS, DEVICE_TCP_PORT, DISCOVERY_PORT, MIN_INTERVAL_MS,
};
use crate::error::{DoHomeError, Result};

/// Configuration for a [`DoHomeClient`](crate::client::DoHomeClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// UDP port for broadcast control and status echoes (default: 6091)
    pub command_port: u16,
    /// UDP port devices announce themselves on (default: 6095)
    pub discovery_port: u16,
    /// TCP port for direct device commands (default: 5555)
    pub device_port: u16,
    /// Local IPv4 addresses to bind. `None` binds every non-loopback IPv4
    /// interface found on the host.
    pub interfaces: Option<Vec<Ipv4Addr>>,
    /// Destination address for outbound broadcasts (default: 255.255.255.255)
    pub broadcast_addr: Ipv4Addr,
    /// Pause after the startup discovery probe, in milliseconds (default: 250)
    pub settle_delay_ms: u64,
    /// Timeout for one TCP request/response exchange, in milliseconds (default: 5000)
    pub command_timeout_ms: u64,
    /// Capacity of the client event channel (default: 256)
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_port: COMMAND_PORT,
            discovery_port: DISCOVERY_PORT,
            device_port: DEVICE_TCP_PORT,
            interfaces: None,
            broadcast_addr: Ipv4Addr::BROADCAST,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            command_timeout_ms: 5000,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn command_port(mut self, port: u16) -> Self {
        self.config.command_port = port;
        self
    }

    pub fn discovery_port(mut self, port: u16) -> Self {
        self.config.discovery_port = port;
        self
    }

    pub fn device_port(mut self, port: u16) -> Self {
        self.config.device_port = port;
        self
    }

    pub fn interfaces(mut self, interfaces: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.config.interfaces = Some(interfaces.into_iter().collect());
        self
    }

    pub fn broadcast_addr(mut self, addr: Ipv4Addr) -> Self {
        self.config.broadcast_addr = addr;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = ms;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Check a periodic interval: 0 disables it, anything else must be at least
/// [`MIN_INTERVAL_MS`]. Returns the period for an enabled interval.
pub fn validate_interval(name: &'static str, ms: u64) -> Result<Option<Duration>> {
    match ms {
        0 => Ok(None),
        ms if ms < MIN_INTERVAL_MS => Err(DoHomeError::InvalidInterval {
            name,
            value: ms,
            min: MIN_INTERVAL_MS,
        }),
        ms => Ok(Some(Duration::from_millis(ms))),
    }
}
