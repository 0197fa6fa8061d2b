// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client
//
//! # dohome-lan
//!
//! Local-network client for DoHome LED controllers (`_DT-WYRGB` family).
//!
//! Devices are found by broadcasting a discovery probe and listening for
//! their announcements. Colors are controlled with broadcast `ctrl`
//! envelopes, and devices push their status back as `echo` datagrams.
//! Each discovered [`Device`] also exposes the direct TCP command set
//! (timers, clock, firmware queries, network setup).
//!
//! ## Quick Start
//!
//! ```no_run
//! use dohome_lan::{ClientConfig, ClientEvent, Color, DoHomeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DoHomeClient::bind(ClientConfig::default()).await?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let ClientEvent::DeviceDiscovered(device) = event {
//!                 println!("Found {}", device.device_name());
//!             }
//!         }
//!     });
//!
//!     // Poll colors every 30s, re-probe every minute
//!     client.start_listener(30_000, 60_000).await?;
//!
//!     let devices = client.devices().await;
//!     client.change_color(Color::from_rgb8(255, 120, 0), true, &devices).await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.stop_listener().await;
//!     client.wait_until_stopped().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod transport;

// Re-exports for convenience
pub use client::DoHomeClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use constants::CommandCode;
pub use devices::{Color, ColorPattern, Device, Timer, TimerType};
pub use dispatch::{Dispatch, ProtocolDispatcher};
pub use error::{DeviceErrorCode, DoHomeError, Result, WireError};
pub use event::{ClientEvent, EventReceiver};
pub use listener::{ListenerState, ListenerSupervisor};
pub use protocol::{Command, WireMessage};
pub use registry::DeviceRegistry;
