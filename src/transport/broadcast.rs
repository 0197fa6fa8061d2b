// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::constants::DISCOVERY_PROBE;
use crate::devices::device::Device;
use crate::protocol::encode_ctrl;

/// A UDP socket with broadcast enabled, bound to one local interface address
/// or to the wildcard address.
///
/// Every socket sets `SO_REUSEADDR`, so an interface socket and a wildcard
/// socket can share a port. On Linux only the wildcard socket receives
/// broadcasts; unicast goes to the more specific interface socket.
#[derive(Debug)]
pub struct BroadcastSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
    broadcast_addr: Ipv4Addr,
}

impl BroadcastSocket {
    /// Bind to `local` and enable broadcast transmission.
    pub async fn bind(local: SocketAddrV4, broadcast_addr: Ipv4Addr) -> std::io::Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        raw.set_broadcast(true)?;
        raw.set_nonblocking(true)?;
        raw.bind(&SockAddr::from(local))?;
        let socket = UdpSocket::from_std(raw.into())?;
        let local_addr = socket.local_addr()?;
        debug!(%local_addr, "Bound broadcast socket");
        Ok(Self {
            socket,
            local_addr,
            broadcast_addr,
        })
    }

    /// The bound endpoint.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next datagram. Cancel-safe.
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Send to the broadcast address on `port`. No delivery confirmation.
    pub async fn send(&self, data: &[u8], port: u16) -> std::io::Result<usize> {
        self.socket
            .send_to(data, SocketAddrV4::new(self.broadcast_addr, port))
            .await
    }
}

/// Socket set of the client. Sends fan out over every command socket.
///
/// Sends are fire-and-forget. A failing interface is logged and skipped so the
/// remaining interfaces still get the datagram. Wildcard sockets only receive.
#[derive(Debug)]
pub struct Broadcaster {
    command_sockets: Vec<Arc<BroadcastSocket>>,
    discovery_sockets: Vec<Arc<BroadcastSocket>>,
    wildcard_sockets: Vec<Arc<BroadcastSocket>>,
    command_port: u16,
}

impl Broadcaster {
    pub fn new(
        command_sockets: Vec<Arc<BroadcastSocket>>,
        discovery_sockets: Vec<Arc<BroadcastSocket>>,
        command_port: u16,
    ) -> Self {
        Self {
            command_sockets,
            discovery_sockets,
            wildcard_sockets: Vec::new(),
            command_port,
        }
    }

    /// Add receive-only sockets bound on the wildcard address.
    pub fn with_wildcard_sockets(mut self, sockets: Vec<Arc<BroadcastSocket>>) -> Self {
        self.wildcard_sockets = sockets;
        self
    }

    pub fn command_sockets(&self) -> &[Arc<BroadcastSocket>] {
        &self.command_sockets
    }

    pub fn discovery_sockets(&self) -> &[Arc<BroadcastSocket>] {
        &self.discovery_sockets
    }

    pub fn wildcard_sockets(&self) -> &[Arc<BroadcastSocket>] {
        &self.wildcard_sockets
    }

    /// Every bound socket: command, then discovery, then wildcard.
    pub fn all_sockets(&self) -> impl Iterator<Item = &Arc<BroadcastSocket>> {
        self.command_sockets
            .iter()
            .chain(self.discovery_sockets.iter())
            .chain(self.wildcard_sockets.iter())
    }

    /// Bound endpoints of the per-interface sockets, the ones we send from.
    pub fn interface_endpoints(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.command_sockets
            .iter()
            .chain(self.discovery_sockets.iter())
            .map(|socket| socket.local_addr())
    }

    /// Broadcast a raw message on every command socket.
    pub async fn broadcast(&self, message: &str) {
        let data = message.as_bytes();
        for socket in &self.command_sockets {
            match socket.send(data, self.command_port).await {
                Ok(n) => trace!(local = %socket.local_addr(), bytes = n, "Broadcast sent"),
                Err(e) => warn!(local = %socket.local_addr(), error = %e, "Broadcast failed"),
            }
        }
    }

    /// Fire one discovery probe.
    pub async fn discover(&self) {
        debug!("Sending discovery probe");
        self.broadcast(DISCOVERY_PROBE).await;
    }

    /// Wrap `payload` in a `ctrl` envelope for `devices` and broadcast it.
    /// Nothing is sent when `devices` is empty.
    pub async fn send_ctrl(&self, payload: &str, devices: &[Arc<Device>]) {
        if devices.is_empty() {
            trace!("No target devices, command dropped");
            return;
        }
        let ids: Vec<&str> = devices.iter().map(|d| d.short_id()).collect();
        self.broadcast(&encode_ctrl(&ids, payload)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_bind_reports_local_endpoint() {
        let socket = BroadcastSocket::bind(
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            Ipv4Addr::LOCALHOST,
        )
        .await
        .unwrap();
        let local = socket.local_addr();
        assert_eq!(local.ip(), Ipv4Addr::LOCALHOST);
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_interface_and_wildcard_share_port() {
        let interface = BroadcastSocket::bind(
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            Ipv4Addr::LOCALHOST,
        )
        .await
        .unwrap();
        let port = interface.local_addr().port();
        let wildcard = BroadcastSocket::bind(
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port),
            Ipv4Addr::LOCALHOST,
        )
        .await
        .unwrap();
        assert_eq!(wildcard.local_addr().port(), port);
        assert!(wildcard.local_addr().ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_socket_roles() {
        let mut sockets = Vec::new();
        for ip in [Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, Ipv4Addr::UNSPECIFIED] {
            sockets.push(Arc::new(
                BroadcastSocket::bind(SocketAddrV4::new(ip, 0), Ipv4Addr::LOCALHOST)
                    .await
                    .unwrap(),
            ));
        }
        let wildcard = sockets.pop().unwrap();
        let discovery = sockets.pop().unwrap();
        let command = sockets.pop().unwrap();
        let broadcaster = Broadcaster::new(vec![command.clone()], vec![discovery.clone()], 9)
            .with_wildcard_sockets(vec![wildcard.clone()]);

        assert_eq!(broadcaster.command_sockets().len(), 1);
        assert_eq!(broadcaster.discovery_sockets().len(), 1);
        assert_eq!(broadcaster.wildcard_sockets().len(), 1);
        let all: Vec<SocketAddr> = broadcaster.all_sockets().map(|s| s.local_addr()).collect();
        assert_eq!(
            all,
            vec![command.local_addr(), discovery.local_addr(), wildcard.local_addr()]
        );
        let own: Vec<SocketAddr> = broadcaster.interface_endpoints().collect();
        assert_eq!(own, vec![command.local_addr(), discovery.local_addr()]);
    }

    #[tokio::test]
    async fn test_send_reaches_target_port() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_port = peer.local_addr().unwrap().port();

        // Loopback stands in for the broadcast address
        let socket = Arc::new(
            BroadcastSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), Ipv4Addr::LOCALHOST)
                .await
                .unwrap(),
        );
        let broadcaster = Broadcaster::new(vec![socket.clone()], Vec::new(), peer_port);
        broadcaster.discover().await;

        let mut buf = [0u8; 64];
        let (n, from) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"cmd=ping");
        assert_eq!(from, socket.local_addr());
    }

    #[tokio::test]
    async fn test_send_ctrl_without_devices_is_noop() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_port = peer.local_addr().unwrap().port();
        let socket = Arc::new(
            BroadcastSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), Ipv4Addr::LOCALHOST)
                .await
                .unwrap(),
        );
        let broadcaster = Broadcaster::new(vec![socket], Vec::new(), peer_port);
        broadcaster.send_ctrl(r#"{"cmd":25}"#, &[]).await;

        let mut buf = [0u8; 64];
        let received = timeout(Duration::from_millis(200), peer.recv_from(&mut buf)).await;
        assert!(received.is_err(), "nothing should have been sent");
    }
}
