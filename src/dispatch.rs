// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::constants::CommandCode;
use crate::devices::device::Device;
use crate::error::WireError;
use crate::event::{ClientEvent, EventSender};
use crate::protocol::{op_color, op_command_code, short_id, Announcement, WireMessage};
use crate::registry::DeviceRegistry;

/// What the dispatcher did with one datagram.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Sent from one of our own endpoints.
    SelfEcho,
    /// Failed to decode.
    Malformed(WireError),
    /// A `ctrl` envelope, i.e. a command reflected back.
    CommandEcho,
    /// A `pong` from an unsupported vendor or device family.
    ForeignDevice,
    /// A first announcement; the device is now registered.
    Discovered(Arc<Device>),
    /// An announcement for a device already in the registry.
    AlreadyKnown,
    /// An `echo` for a device that has not been discovered.
    UnknownDevice,
    /// A color status echo, stored on the device.
    ColorUpdated(Arc<Device>),
    /// An `echo` carrying some other command code.
    EchoIgnored(i64),
    /// Any other `cmd`.
    Unhandled(String),
}

/// Routes decoded datagrams into the registry and device state.
///
/// Errors never propagate out of [`dispatch`](Self::dispatch): a receive loop
/// keeps running whatever arrives on the wire.
///
/// A broadcast can come back on any of our sockets, including wildcard ones
/// whose bound address says nothing about the sender. Self-echo is therefore
/// checked against the full set of endpoints we send from.
#[derive(Debug, Clone)]
pub struct ProtocolDispatcher {
    registry: Arc<DeviceRegistry>,
    event_tx: EventSender,
    device_port: u16,
    command_timeout: Duration,
    own_endpoints: Arc<HashSet<SocketAddr>>,
}

impl ProtocolDispatcher {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        event_tx: EventSender,
        device_port: u16,
        command_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            event_tx,
            device_port,
            command_timeout,
            own_endpoints: Arc::new(HashSet::new()),
        }
    }

    /// Treat datagrams from any of `endpoints` as our own.
    pub fn with_own_endpoints(mut self, endpoints: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.own_endpoints = Arc::new(endpoints.into_iter().collect());
        self
    }

    /// Whether `source` is one of the endpoints we send from.
    pub fn is_own_endpoint(&self, source: &SocketAddr) -> bool {
        self.own_endpoints.contains(source)
    }

    /// Handle one datagram received on the socket bound to `local` from `source`.
    pub async fn dispatch(&self, local: SocketAddr, source: SocketAddr, data: &[u8]) -> Dispatch {
        if source == local || self.is_own_endpoint(&source) {
            trace!(%local, %source, "Ignoring own broadcast");
            return Dispatch::SelfEcho;
        }

        let message = match WireMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                debug!(%source, error = %e, "Dropping malformed datagram");
                return Dispatch::Malformed(e);
            }
        };

        match message {
            WireMessage::Ctrl { .. } => Dispatch::CommandEcho,
            WireMessage::Pong(announcement) => self.on_announcement(announcement).await,
            WireMessage::Echo { device_id, op } => self.on_echo(&device_id, &op).await,
            WireMessage::Other { cmd } => {
                debug!(%source, cmd = %cmd, "Unhandled message");
                Dispatch::Unhandled(cmd)
            }
        }
    }

    async fn on_announcement(&self, announcement: Announcement) -> Dispatch {
        if !announcement.is_supported() {
            debug!(
                company_id = %announcement.company_id,
                device_type = %announcement.device_type,
                "Ignoring unsupported device"
            );
            return Dispatch::ForeignDevice;
        }
        if self.registry.find(&announcement.device_id).await.is_some() {
            return Dispatch::AlreadyKnown;
        }

        let short = match short_id(&announcement.device_id) {
            Ok(short) => short,
            Err(e) => {
                debug!(error = %e, "Dropping announcement");
                return Dispatch::Malformed(e);
            }
        };
        let candidate = Device::from_announcement(
            announcement,
            short,
            self.device_port,
            self.command_timeout,
        );
        let (device, was_new) = self.registry.register_if_absent(candidate).await;
        if !was_new {
            return Dispatch::AlreadyKnown;
        }

        info!(
            device_id = %device.device_id(),
            name = %device.device_name(),
            ip = %device.sta_ip(),
            "Discovered device"
        );
        let _ = self.event_tx.send(ClientEvent::DeviceDiscovered(device.clone()));
        Dispatch::Discovered(device)
    }

    async fn on_echo(&self, device_id: &str, op: &str) -> Dispatch {
        let Some(device) = self.registry.find(device_id).await else {
            debug!(device_id, "Echo from unknown device");
            return Dispatch::UnknownDevice;
        };

        let code = match op_command_code(op) {
            Ok(code) => code,
            Err(e) => {
                debug!(device_id, error = %e, "Bad echo payload");
                return Dispatch::Malformed(e);
            }
        };
        if code != i64::from(CommandCode::GetLedStatus.code()) {
            debug!(device_id, code, "Echo ignored");
            return Dispatch::EchoIgnored(code);
        }

        let color = match op_color(op) {
            Ok(color) => color,
            Err(e) => {
                debug!(device_id, error = %e, "Bad color echo");
                return Dispatch::Malformed(e);
            }
        };
        let old = device.update_color(color).await;
        debug!(device_id, ?color, "Color updated");
        let _ = self.event_tx.send(ClientEvent::ColorChanged {
            device: device.clone(),
            old,
            new: color,
        });
        Dispatch::ColorUpdated(device)
    }
}
