// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::devices::color::Color;
use crate::devices::pattern::ColorPattern;
use crate::devices::timer::{parse_timer_list, Timer};
use crate::error::{DoHomeError, Result};
use crate::protocol::{Announcement, Command};
use crate::transport::command::DeviceSession;

/// Generate a timer token: 30 random high bits over 2 random low bits.
pub fn generate_ts() -> u32 {
    let high: u32 = rand::random::<u32>() >> 2;
    let low: u32 = rand::random::<u32>() & 0b11;
    (high << 2) | low
}

/// One DoHome controller seen on the network.
///
/// Identity and network fields are fixed at discovery. The only mutable state
/// is the last color reported by a status echo.
pub struct Device {
    device_id: String,
    short_id: String,
    device_key: String,
    device_name: String,
    device_type: String,
    company_id: String,
    chip: String,
    host_ip: Ipv4Addr,
    sta_ip: Ipv4Addr,
    color: RwLock<Option<Color>>,
    session: DeviceSession,
}

impl Device {
    /// Build a device from its announcement. TCP commands go to
    /// `sta_ip:device_port`.
    pub fn from_announcement(
        announcement: Announcement,
        short_id: String,
        device_port: u16,
        command_timeout: Duration,
    ) -> Self {
        let addr = SocketAddr::V4(SocketAddrV4::new(announcement.sta_ip, device_port));
        Self {
            device_id: announcement.device_id,
            short_id,
            device_key: announcement.device_key,
            device_name: announcement.device_name,
            device_type: announcement.device_type,
            company_id: announcement.company_id,
            chip: announcement.chip,
            host_ip: announcement.host_ip,
            sta_ip: announcement.sta_ip,
            color: RwLock::new(None),
            session: DeviceSession::new(addr, command_timeout),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The 4-character wire address used in `ctrl` envelopes.
    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    /// Address in the device's own access-point network.
    pub fn host_ip(&self) -> Ipv4Addr {
        self.host_ip
    }

    /// Address on the router network.
    pub fn sta_ip(&self) -> Ipv4Addr {
        self.sta_ip
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Color from the most recent status echo, if one has arrived.
    pub async fn last_known_color(&self) -> Option<Color> {
        *self.color.read().await
    }

    /// Store a reported color and return the previous one.
    pub(crate) async fn update_color(&self, color: Color) -> Option<Color> {
        self.color.write().await.replace(color)
    }

    async fn request(&self, command: Command) -> Result<Value> {
        debug!(device = %self.device_id, code = command.code().code(), "Device command");
        self.session.send_command(&command.to_payload()).await
    }

    // ----- TCP commands -----

    pub async fn reboot(&self) -> Result<()> {
        self.request(Command::Reboot).await.map(drop)
    }

    /// Raw device info reply (firmware, timezone, connection flags, chip).
    pub async fn device_info(&self) -> Result<Value> {
        self.request(Command::GetDeviceInfo).await
    }

    /// Set the color. A `duration_ms` fades over that time and implies smooth.
    pub async fn change_color(
        &self,
        color: Color,
        smooth: bool,
        duration_ms: Option<u32>,
    ) -> Result<()> {
        self.request(Command::ChangeColor {
            color,
            smooth,
            duration_ms,
        })
        .await
        .map(drop)
    }

    pub async fn off(&self) -> Result<()> {
        self.request(Command::TurnOff).await.map(drop)
    }

    pub async fn set_preset_mode(&self, pattern: ColorPattern) -> Result<()> {
        self.request(Command::SetPresetMode { pattern }).await.map(drop)
    }

    /// Current device clock.
    pub async fn device_time(&self) -> Result<DateTime<Utc>> {
        let reply = self.request(Command::GetDeviceTime).await?;
        let stamps = reply
            .get("stamps")
            .and_then(Value::as_i64)
            .ok_or_else(|| invalid("reply has no stamps"))?;
        DateTime::from_timestamp(stamps, 0)
            .ok_or_else(|| invalid(&format!("timestamp out of range: {stamps}")))
    }

    pub async fn set_device_time(&self, at: NaiveDateTime) -> Result<()> {
        self.request(Command::SetDeviceTime { at }).await.map(drop)
    }

    /// Schedule a shutdown. Returns the token needed to cancel it.
    pub async fn set_shutdown_timer(&self, at: NaiveDateTime, repeat: bool) -> Result<u32> {
        let ts = generate_ts();
        self.request(Command::SetShutdownTimer { ts, at, repeat })
            .await?;
        Ok(ts)
    }

    /// Schedule a power-up. Returns the token needed to cancel it.
    pub async fn set_powerup_timer(&self, at: NaiveDateTime, repeat: bool) -> Result<u32> {
        let ts = generate_ts();
        self.request(Command::SetPowerupTimer { ts, at, repeat })
            .await?;
        Ok(ts)
    }

    pub async fn router_config(&self, ssid: &str, password: &str, bssid: &str) -> Result<()> {
        self.request(Command::RouterConfig {
            ssid: ssid.to_string(),
            password: password.to_string(),
            bssid: bssid.to_string(),
        })
        .await
        .map(drop)
    }

    /// Switch off after `minutes`. Returns the timer token.
    pub async fn delay_shutdown(&self, minutes: u32) -> Result<u32> {
        let ts = generate_ts();
        self.request(Command::DelayShutdown { minutes, ts }).await?;
        Ok(ts)
    }

    /// Address the device holds on the router network, per the device itself.
    pub async fn router_ip(&self) -> Result<Ipv4Addr> {
        let reply = self.request(Command::IsConnectedToRouter).await?;
        let ip = reply
            .get("ip")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("reply has no ip"))?;
        ip.parse()
            .map_err(|_| invalid(&format!("bad router ip: {ip}")))
    }

    pub async fn version(&self) -> Result<String> {
        let reply = self.request(Command::GetVersion).await?;
        reply
            .get("ver")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| invalid("reply has no ver"))
    }

    pub async fn timers(&self) -> Result<Vec<Timer>> {
        let reply = self.request(Command::GetDeviceTimers).await?;
        parse_timer_list(&reply)
    }

    pub async fn delay_info(&self) -> Result<Vec<Timer>> {
        let reply = self.request(Command::GetDelayInfo).await?;
        parse_timer_list(&reply)
    }

    pub async fn cancel_timer(&self, ts: u32) -> Result<()> {
        self.request(Command::CancelTimer { ts }).await.map(drop)
    }

    /// Query the current color directly.
    pub async fn led_status(&self) -> Result<Color> {
        let reply = self.request(Command::GetLedStatus).await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn modify_timer(&self, index: i32, at: NaiveDateTime, repeat: bool) -> Result<()> {
        self.request(Command::ModifyTimer { index, at, repeat })
            .await
            .map(drop)
    }

    pub async fn reset_access_point(&self) -> Result<()> {
        self.request(Command::ResetAccessPoint).await.map(drop)
    }

    /// Timezone offset in hours, 0 to 23.
    pub async fn set_timezone_offset(&self, offset: u8) -> Result<()> {
        if offset > 23 {
            return Err(DoHomeError::InvalidArgument {
                name: "offset",
                reason: format!("{offset} is outside 0..=23"),
            });
        }
        self.request(Command::SetTimezoneOffset { offset })
            .await
            .map(drop)
    }

    pub async fn factory_reset(&self) -> Result<()> {
        self.request(Command::FactoryReset).await.map(drop)
    }
}

fn invalid(details: &str) -> DoHomeError {
    DoHomeError::InvalidResponse {
        details: details.to_string(),
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device_id", &self.device_id)
            .field("short_id", &self.short_id)
            .field("device_name", &self.device_name)
            .field("sta_ip", &self.sta_ip)
            .field("chip", &self.chip)
            .finish_non_exhaustive()
    }
}
