// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::{DoHomeError, Result};

/// What a device timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerType {
    Shutdown = 0,
    Constant = 1,
    PresetMode = 2,
    CustomMode = 3,
    DelayShutdown = 4,
}

impl TimerType {
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Shutdown),
            1 => Some(Self::Constant),
            2 => Some(Self::PresetMode),
            3 => Some(Self::CustomMode),
            4 => Some(Self::DelayShutdown),
            _ => None,
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }
}

/// A timer stored on the device, as listed by the timer and delay queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTimer")]
pub struct Timer {
    /// Slot index on the device, used by the modify command.
    pub index: i32,
    /// Token returned when the timer was created, used to cancel it.
    pub ts: u32,
    pub timer_type: TimerType,
    pub repeat: bool,
    pub date_time: NaiveDateTime,
}

#[derive(Deserialize)]
struct RawTimer {
    index: i32,
    ts: u32,
    #[serde(rename = "type")]
    timer_type: i64,
    repeat: i64,
    year: i32,
    mon: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
}

impl TryFrom<RawTimer> for Timer {
    type Error = DoHomeError;

    fn try_from(raw: RawTimer) -> Result<Self> {
        let timer_type = TimerType::from_value(raw.timer_type).ok_or_else(|| {
            DoHomeError::InvalidResponse {
                details: format!("unknown timer type {}", raw.timer_type),
            }
        })?;
        let date_time = NaiveDate::from_ymd_opt(raw.year, raw.mon, raw.day)
            .and_then(|d| d.and_hms_opt(raw.hour, raw.min, raw.sec))
            .ok_or_else(|| DoHomeError::InvalidResponse {
                details: format!(
                    "invalid timer date {}-{}-{} {}:{}:{}",
                    raw.year, raw.mon, raw.day, raw.hour, raw.min, raw.sec
                ),
            })?;
        Ok(Self {
            index: raw.index,
            ts: raw.ts,
            timer_type,
            repeat: raw.repeat == 1,
            date_time,
        })
    }
}

/// Decode the `timers` array of a timer or delay listing reply.
pub fn parse_timer_list(reply: &serde_json::Value) -> Result<Vec<Timer>> {
    let timers = reply
        .get("timers")
        .cloned()
        .ok_or_else(|| DoHomeError::InvalidResponse {
            details: "reply has no timers array".to_string(),
        })?;
    Ok(serde_json::from_value(timers)?)
}
