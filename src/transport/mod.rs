// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

//! Network transports: UDP broadcast sockets for discovery and control, and
//! the per-device TCP command channel.

pub mod broadcast;
pub mod command;

pub use broadcast::{BroadcastSocket, Broadcaster};
pub use command::DeviceSession;
