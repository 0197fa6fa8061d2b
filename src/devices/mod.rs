// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

pub mod color;
pub mod device;
pub mod pattern;
pub mod timer;

pub use color::Color;
pub use device::Device;
pub use pattern::ColorPattern;
pub use timer::{Timer, TimerType};
