// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::sync::Arc;

use crate::devices::{Color, Device};
use crate::listener::ListenerState;

/// All events that can be emitted by the client.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<ClientEvent>`.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A device announced itself for the first time
    DeviceDiscovered(Arc<Device>),
    /// A status echo reported a device's color
    ColorChanged {
        device: Arc<Device>,
        old: Option<Color>,
        new: Color,
    },
    /// The listener moved to a new lifecycle state
    ListenerStateChanged(ListenerState),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<ClientEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<ClientEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
