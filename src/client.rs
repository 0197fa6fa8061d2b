// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::devices::{Color, Device};
use crate::dispatch::ProtocolDispatcher;
use crate::error::{DoHomeError, Result};
use crate::event::{event_channel, EventReceiver, EventSender};
use crate::listener::{ListenerState, ListenerSupervisor};
use crate::protocol::Command;
use crate::registry::DeviceRegistry;
use crate::transport::broadcast::{BroadcastSocket, Broadcaster};

/// Client for DoHome controllers on the local network.
///
/// Binding opens a command socket and a discovery socket on each local IPv4
/// interface, plus one receive-only wildcard socket per port for broadcast
/// replies. The sockets stay open for the client's lifetime, so broadcast
/// commands can be sent whether or not the listener is running. Devices only
/// appear in the registry while the listener is receiving.
///
/// ```no_run
/// use dohome_lan::{ClientConfig, DoHomeClient};
///
/// # async fn example() -> dohome_lan::Result<()> {
/// let client = DoHomeClient::bind(ClientConfig::default()).await?;
/// client.start_listener(30_000, 60_000).await?;
/// client.turn_on(&client.devices().await).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DoHomeClient {
    config: ClientConfig,
    registry: Arc<DeviceRegistry>,
    broadcaster: Arc<Broadcaster>,
    supervisor: ListenerSupervisor,
    event_tx: EventSender,
}

impl DoHomeClient {
    /// Bind sockets on the configured (or discovered) interfaces.
    pub async fn bind(config: ClientConfig) -> Result<Self> {
        let addresses = match &config.interfaces {
            Some(list) => list.clone(),
            None => local_ipv4_addresses()?,
        };
        if addresses.is_empty() {
            return Err(DoHomeError::NoInterfaces);
        }

        let mut command_sockets = Vec::with_capacity(addresses.len());
        let mut discovery_sockets = Vec::with_capacity(addresses.len());
        for ip in &addresses {
            command_sockets.push(Arc::new(
                BroadcastSocket::bind(
                    SocketAddrV4::new(*ip, config.command_port),
                    config.broadcast_addr,
                )
                .await?,
            ));
            discovery_sockets.push(Arc::new(
                BroadcastSocket::bind(
                    SocketAddrV4::new(*ip, config.discovery_port),
                    config.broadcast_addr,
                )
                .await?,
            ));
        }

        // Interface sockets miss broadcasts on Linux; a wildcard socket on the
        // same port picks them up.
        let mut wildcard_sockets = Vec::new();
        if !addresses.contains(&Ipv4Addr::UNSPECIFIED) {
            for sockets in [&command_sockets, &discovery_sockets] {
                if let Some(first) = sockets.first() {
                    wildcard_sockets.push(Arc::new(
                        BroadcastSocket::bind(
                            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, first.local_addr().port()),
                            config.broadcast_addr,
                        )
                        .await?,
                    ));
                }
            }
        }
        info!(interfaces = ?addresses, wildcard = wildcard_sockets.len(), "Client sockets bound");

        let broadcaster = Arc::new(
            Broadcaster::new(command_sockets, discovery_sockets, config.command_port)
                .with_wildcard_sockets(wildcard_sockets),
        );
        let own_endpoints = own_endpoints(broadcaster.interface_endpoints())?;
        debug!(?own_endpoints, "Self-echo endpoints");

        let registry = Arc::new(DeviceRegistry::new());
        let (event_tx, _) = event_channel(config.event_capacity);
        let dispatcher = ProtocolDispatcher::new(
            registry.clone(),
            event_tx.clone(),
            config.device_port,
            config.command_timeout(),
        )
        .with_own_endpoints(own_endpoints);
        let supervisor = ListenerSupervisor::new(
            broadcaster.clone(),
            dispatcher,
            registry.clone(),
            event_tx.clone(),
            config.settle_delay(),
        );

        Ok(Self {
            config,
            registry,
            broadcaster,
            supervisor,
            event_tx,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Start the background listener. See [`ListenerSupervisor::start`].
    pub async fn start_listener(&self, refresh_ms: u64, discover_ms: u64) -> Result<()> {
        self.supervisor.start(refresh_ms, discover_ms).await
    }

    /// Request the listener to stop. Returns without waiting.
    pub async fn stop_listener(&self) {
        self.supervisor.stop().await
    }

    pub fn listener_state(&self) -> ListenerState {
        self.supervisor.state()
    }

    pub async fn wait_until_stopped(&self) {
        self.supervisor.wait_until_stopped().await
    }

    pub async fn timer_units(&self) -> usize {
        self.supervisor.timer_units().await
    }

    /// Send one discovery probe. Responses are only processed while the
    /// listener runs.
    pub async fn discover_devices(&self) {
        self.broadcaster.discover().await
    }

    /// All discovered devices in discovery order.
    pub async fn devices(&self) -> Vec<Arc<Device>> {
        self.registry.snapshot().await
    }

    pub async fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.registry.find(device_id).await
    }

    /// Broadcast a raw JSON payload to `devices`. No-op for an empty list.
    pub async fn send_command(&self, payload: &str, devices: &[Arc<Device>]) {
        self.broadcaster.send_ctrl(payload, devices).await
    }

    pub async fn turn_on(&self, devices: &[Arc<Device>]) {
        self.send(Command::TurnOn, devices).await
    }

    pub async fn turn_off(&self, devices: &[Arc<Device>]) {
        self.send(Command::TurnOff, devices).await
    }

    pub async fn change_color(&self, color: Color, smooth: bool, devices: &[Arc<Device>]) {
        self.send(
            Command::ChangeColor {
                color,
                smooth,
                duration_ms: None,
            },
            devices,
        )
        .await
    }

    /// Fade to `color` over `duration_ms`.
    pub async fn change_color_with_duration(
        &self,
        color: Color,
        duration_ms: u32,
        devices: &[Arc<Device>],
    ) {
        self.send(
            Command::ChangeColor {
                color,
                smooth: true,
                duration_ms: Some(duration_ms),
            },
            devices,
        )
        .await
    }

    /// Local endpoints of every bound socket: command, discovery, wildcard.
    pub fn local_endpoints(&self) -> Vec<SocketAddr> {
        self.broadcaster
            .all_sockets()
            .map(|socket| socket.local_addr())
            .collect()
    }

    async fn send(&self, command: Command, devices: &[Arc<Device>]) {
        self.broadcaster
            .send_ctrl(&command.to_payload(), devices)
            .await
    }
}

/// Every non-loopback IPv4 address on the host.
fn local_ipv4_addresses() -> Result<Vec<Ipv4Addr>> {
    let addresses = host_ipv4_addresses(false)?;
    debug!(?addresses, "Enumerated local interfaces");
    Ok(addresses)
}

fn host_ipv4_addresses(include_loopback: bool) -> Result<Vec<Ipv4Addr>> {
    Ok(if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|iface| include_loopback || !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .collect())
}

/// Source endpoints our own datagrams arrive from. A socket bound on the
/// wildcard address sends from whichever host address the route picks.
fn own_endpoints(bound: impl Iterator<Item = SocketAddr>) -> Result<Vec<SocketAddr>> {
    let bound: Vec<SocketAddr> = bound.collect();
    let host_addresses = if bound.iter().any(|e| e.ip().is_unspecified()) {
        host_ipv4_addresses(true)?
    } else {
        Vec::new()
    };

    let mut endpoints = Vec::new();
    for endpoint in bound {
        if endpoint.ip().is_unspecified() {
            endpoints.extend(
                host_addresses
                    .iter()
                    .map(|ip| SocketAddr::from(SocketAddrV4::new(*ip, endpoint.port()))),
            );
        } else {
            endpoints.push(endpoint);
        }
    }
    Ok(endpoints)
}
