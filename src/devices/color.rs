// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use serde::{Deserialize, Serialize};

use crate::constants::MAX_CHANNEL_VALUE;
use crate::error::{DoHomeError, Result};

/// A 5-channel LED color as the firmware understands it.
///
/// Every channel runs from 0 to 5000. On the wire the channels are the JSON
/// keys `r`, `g`, `b`, `w` (white) and `m` (warmth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawColor")]
pub struct Color {
    #[serde(rename = "r")]
    red: u16,
    #[serde(rename = "g")]
    green: u16,
    #[serde(rename = "b")]
    blue: u16,
    #[serde(rename = "w")]
    white: u16,
    #[serde(rename = "m")]
    warmth: u16,
}

impl Color {
    /// All channels dark.
    pub const OFF: Color = Color {
        red: 0,
        green: 0,
        blue: 0,
        white: 0,
        warmth: 0,
    };

    /// The firmware's "on" preset: full white, warm tint.
    pub const WARM_WHITE: Color = Color {
        red: 0,
        green: 0,
        blue: 0,
        white: 5000,
        warmth: 4000,
    };

    pub fn new(red: u16, green: u16, blue: u16, white: u16, warmth: u16) -> Result<Self> {
        Self::from_channels([
            ("red", i64::from(red)),
            ("green", i64::from(green)),
            ("blue", i64::from(blue)),
            ("white", i64::from(white)),
            ("warmth", i64::from(warmth)),
        ])
    }

    /// Scale an 8-bit RGB triple into device units, weighted by HSL lightness.
    ///
    /// White and warmth are left at zero.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let lightness = (f32::from(max) + f32::from(min)) / 510.0;
        // 50 steps per 8-bit channel, times lightness percent
        let scale = |c: u8| {
            let steps = 50 * u32::from(c) / 255;
            (steps as f32 * lightness * 100.0).round() as u16
        };
        Self {
            red: scale(r),
            green: scale(g),
            blue: scale(b),
            white: 0,
            warmth: 0,
        }
    }

    fn from_channels(channels: [(&'static str, i64); 5]) -> Result<Self> {
        let mut values = [0u16; 5];
        for (slot, (channel, value)) in values.iter_mut().zip(channels) {
            *slot = u16::try_from(value)
                .ok()
                .filter(|v| *v <= MAX_CHANNEL_VALUE)
                .ok_or(DoHomeError::ColorOutOfRange {
                    channel,
                    value,
                    max: MAX_CHANNEL_VALUE,
                })?;
        }
        let [red, green, blue, white, warmth] = values;
        Ok(Self {
            red,
            green,
            blue,
            white,
            warmth,
        })
    }

    pub fn red(&self) -> u16 {
        self.red
    }

    pub fn green(&self) -> u16 {
        self.green
    }

    pub fn blue(&self) -> u16 {
        self.blue
    }

    pub fn white(&self) -> u16 {
        self.white
    }

    pub fn warmth(&self) -> u16 {
        self.warmth
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

/// Unvalidated channel values as they arrive in device JSON.
///
/// Extra keys (`cmd`, `res`, `type`, ...) are ignored.
#[derive(Deserialize)]
struct RawColor {
    r: i64,
    g: i64,
    b: i64,
    w: i64,
    m: i64,
}

impl TryFrom<RawColor> for Color {
    type Error = DoHomeError;

    fn try_from(raw: RawColor) -> Result<Self> {
        Color::from_channels([
            ("red", raw.r),
            ("green", raw.g),
            ("blue", raw.b),
            ("white", raw.w),
            ("warmth", raw.m),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_range() {
        assert!(Color::new(0, 0, 0, 0, 0).is_ok());
        assert!(Color::new(5000, 5000, 5000, 5000, 5000).is_ok());

        let err = Color::new(0, 5001, 0, 0, 0).unwrap_err();
        assert!(matches!(
            err,
            DoHomeError::ColorOutOfRange { channel: "green", value: 5001, .. }
        ));
    }

    #[test]
    fn test_deserialize_led_status_reply() {
        let json = r#"{"res":0,"cmd":25,"r":10,"g":20,"b":30,"w":40,"m":50,"type":1}"#;
        let color: Color = serde_json::from_str(json).unwrap();
        assert_eq!(color, Color::new(10, 20, 30, 40, 50).unwrap());
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Color>(r#"{"r":-1,"g":0,"b":0,"w":0,"m":0}"#).is_err());
        assert!(serde_json::from_str::<Color>(r#"{"r":0,"g":0,"b":0,"w":0,"m":9000}"#).is_err());
        assert!(serde_json::from_str::<Color>(r#"{"r":0,"g":0,"b":0,"w":0}"#).is_err());
    }

    #[test]
    fn test_serialize_uses_wire_keys() {
        let color = Color::new(1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            serde_json::to_string(&color).unwrap(),
            r#"{"r":1,"g":2,"b":3,"w":4,"m":5}"#
        );
    }

    #[test]
    fn test_from_rgb8() {
        assert_eq!(Color::from_rgb8(0, 0, 0), Color::OFF);
        assert!(Color::from_rgb8(0, 0, 0).is_off());
        assert!(!Color::WARM_WHITE.is_off());

        // Pure red has 50% lightness: 50 steps * 50
        let red = Color::from_rgb8(255, 0, 0);
        assert_eq!(red.red(), 2500);
        assert_eq!(red.green(), 0);

        // White has full lightness
        let white = Color::from_rgb8(255, 255, 255);
        assert_eq!(white.red(), 5000);
        assert_eq!(white.blue(), 5000);
        assert_eq!(white.white(), 0);
    }
}
