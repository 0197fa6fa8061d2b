// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::collections::HashMap;
use std::net::Ipv4Addr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::{json, Value};

use crate::constants::{CommandCode, COMPANY_ID, DEVICE_TYPE};
use crate::devices::color::Color;
use crate::devices::pattern::ColorPattern;
use crate::devices::timer::TimerType;
use crate::error::WireError;

/// JSON commands carried in the `op` field of a broadcast, or sent as a line
/// over the per-device TCP channel.
///
/// # Broadcast control
///
/// Broadcast commands are wrapped in a `ctrl` envelope addressing one or more
/// devices by short id (see [`encode_ctrl`]). Devices do not reply to the
/// sender; a status change is pushed back as an `echo` datagram on the command
/// port.
///
/// # TCP request/response
///
/// Over TCP each command is one JSON object followed by `\r\n`. The device
/// answers with a single JSON object carrying `res` (0 on success, otherwise a
/// [`DeviceErrorCode`](crate::error::DeviceErrorCode)) and `cmd`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `{"cmd":3}`: Reboot the controller.
    Reboot,
    /// `{"cmd":4}`: Firmware, timezone, connection flags and chip.
    GetDeviceInfo,
    /// `{"cmd":6,...,"on":1}`: The firmware's default "on" preset.
    TurnOn,
    /// `{"cmd":6,...,"on":0}`: All channels dark, output off.
    TurnOff,
    /// `{"cmd":6,"r":..,"g":..,"b":..,"w":..,"m":..,"smooth":0|1[,"t":ms]}`.
    /// A duration implies smoothing.
    ChangeColor {
        color: Color,
        smooth: bool,
        duration_ms: Option<u32>,
    },
    /// `{"cmd":7,"index":N}`: Start a built-in animation.
    SetPresetMode { pattern: ColorPattern },
    /// `{"cmd":9}`: Device clock; the reply carries `stamps` (unix seconds).
    GetDeviceTime,
    /// `{"cmd":10,...}`: Set the device clock.
    SetDeviceTime { at: NaiveDateTime },
    /// `{"cmd":13,...}`: Switch off at a point in time.
    SetShutdownTimer {
        ts: u32,
        at: NaiveDateTime,
        repeat: bool,
    },
    /// `{"cmd":14,...}`: Switch on at a point in time.
    SetPowerupTimer {
        ts: u32,
        at: NaiveDateTime,
        repeat: bool,
    },
    /// `{"cmd":16,...}`: Join a WiFi network.
    RouterConfig {
        ssid: String,
        password: String,
        bssid: String,
    },
    /// `{"cmd":17,"time":M,"ts":T}`: Switch off after `minutes`.
    DelayShutdown { minutes: u32, ts: u32 },
    /// `{"cmd":19}`: Router connection check; reply carries `ip`.
    IsConnectedToRouter,
    /// `{"cmd":20}`: Firmware version; reply carries `ver`.
    GetVersion,
    /// `{"cmd":21}`: List scheduled timers.
    GetDeviceTimers,
    /// `{"cmd":22}`: List pending delayed shutdowns.
    GetDelayInfo,
    /// `{"cmd":23,"ts":T}`: Remove a timer by its creation token.
    CancelTimer { ts: u32 },
    /// `{"cmd":25}`: Query the current color. Also the periodic status poll.
    GetLedStatus,
    /// `{"cmd":26,...}`: Reschedule the timer in slot `index`.
    ModifyTimer {
        index: i32,
        at: NaiveDateTime,
        repeat: bool,
    },
    /// `{"cmd":28}`: Drop router credentials and return to AP mode.
    ResetAccessPoint,
    /// `{"cmd":29,"offset":N}`: Timezone offset, 0-23.
    SetTimezoneOffset { offset: u8 },
    /// `{"cmd":201,"en":1}`: Factory reset.
    FactoryReset,
}

impl Command {
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Reboot => CommandCode::Reboot,
            Command::GetDeviceInfo => CommandCode::GetDeviceInfo,
            Command::TurnOn | Command::TurnOff | Command::ChangeColor { .. } => {
                CommandCode::ChangeColor
            }
            Command::SetPresetMode { .. } => CommandCode::SetPresetMode,
            Command::GetDeviceTime => CommandCode::GetDeviceTime,
            Command::SetDeviceTime { .. } => CommandCode::SyncDeviceTime,
            Command::SetShutdownTimer { .. } => CommandCode::SetShutdownTimer,
            Command::SetPowerupTimer { .. } => CommandCode::SetPowerupTimer,
            Command::RouterConfig { .. } => CommandCode::RouterConfig,
            Command::DelayShutdown { .. } => CommandCode::DelayShutdown,
            Command::IsConnectedToRouter => CommandCode::IsConnectedToRouter,
            Command::GetVersion => CommandCode::GetVersion,
            Command::GetDeviceTimers => CommandCode::GetDeviceTimers,
            Command::GetDelayInfo => CommandCode::GetDelayInfo,
            Command::CancelTimer { .. } => CommandCode::CancelTimer,
            Command::GetLedStatus => CommandCode::GetLedStatus,
            Command::ModifyTimer { .. } => CommandCode::ModifyTimer,
            Command::ResetAccessPoint => CommandCode::ResetAccessPoint,
            Command::SetTimezoneOffset { .. } => CommandCode::SetTimezone,
            Command::FactoryReset => CommandCode::FactoryReset,
        }
    }

    /// Build the JSON object for this command. Key order matches the firmware's
    /// own examples, with `cmd` first.
    pub fn to_json(&self) -> Value {
        let cmd = self.code().code();
        match self {
            Command::TurnOn => color_json(cmd, &Color::WARM_WHITE, Some(true), None, None),
            Command::TurnOff => color_json(cmd, &Color::OFF, Some(false), None, None),
            Command::ChangeColor {
                color,
                smooth,
                duration_ms,
            } => {
                let smooth = *smooth || duration_ms.is_some();
                color_json(cmd, color, None, Some(smooth), *duration_ms)
            }
            Command::SetPresetMode { pattern } => json!({"cmd": cmd, "index": pattern.index()}),
            Command::SetDeviceTime { at } => json!({
                "cmd": cmd,
                "year": at.year(),
                "month": at.month(),
                "day": at.day(),
                "hour": at.hour(),
                "minute": at.minute(),
                "second": at.second(),
            }),
            Command::SetShutdownTimer { ts, at, repeat } => json!({
                "cmd": cmd,
                "ts": ts,
                "year": at.year(),
                "month": at.month(),
                "day": at.day(),
                "hour": at.hour(),
                "minute": at.minute(),
                "second": at.second(),
                "repeat": u8::from(*repeat),
            }),
            Command::SetPowerupTimer { ts, at, repeat } => json!({
                "cmd": cmd,
                "ts": ts,
                "year": at.year(),
                "month": at.month(),
                "day": at.day(),
                "hour": at.hour(),
                "minute": at.minute(),
                "second": at.second(),
                "type": TimerType::Constant.value(),
                "repeat": u8::from(*repeat),
            }),
            Command::RouterConfig {
                ssid,
                password,
                bssid,
            } => json!({"cmd": cmd, "ssid": ssid, "pass": password, "bssid": bssid}),
            Command::DelayShutdown { minutes, ts } => {
                json!({"cmd": cmd, "time": minutes, "ts": ts})
            }
            Command::CancelTimer { ts } => json!({"cmd": cmd, "ts": ts}),
            Command::ModifyTimer { index, at, repeat } => json!({
                "cmd": cmd,
                "index": index,
                "year": at.year(),
                "month": at.month(),
                "day": at.day(),
                "hour": at.hour(),
                "minute": at.minute(),
                "second": at.second(),
                "repeat": u8::from(*repeat),
            }),
            Command::SetTimezoneOffset { offset } => json!({"cmd": cmd, "offset": offset}),
            Command::FactoryReset => json!({"cmd": cmd, "en": 1}),
            Command::Reboot
            | Command::GetDeviceInfo
            | Command::GetDeviceTime
            | Command::IsConnectedToRouter
            | Command::GetVersion
            | Command::GetDeviceTimers
            | Command::GetDelayInfo
            | Command::GetLedStatus
            | Command::ResetAccessPoint => json!({"cmd": cmd}),
        }
    }

    /// Serialized payload, ready for a `ctrl` envelope or a TCP line.
    pub fn to_payload(&self) -> String {
        self.to_json().to_string()
    }
}

fn color_json(
    cmd: u8,
    color: &Color,
    on: Option<bool>,
    smooth: Option<bool>,
    duration_ms: Option<u32>,
) -> Value {
    let mut value = json!({
        "cmd": cmd,
        "r": color.red(),
        "g": color.green(),
        "b": color.blue(),
        "w": color.white(),
        "m": color.warmth(),
    });
    if let Value::Object(map) = &mut value {
        if let Some(on) = on {
            map.insert("on".to_string(), json!(u8::from(on)));
        }
        if let Some(smooth) = smooth {
            map.insert("smooth".to_string(), json!(u8::from(smooth)));
        }
        if let Some(t) = duration_ms {
            map.insert("t".to_string(), json!(t));
        }
    }
    value
}

/// Wrap a command payload in a broadcast `ctrl` envelope addressed to the
/// given short ids: `cmd=ctrl&devices={[id1,id2]}&op=<payload>`.
pub fn encode_ctrl<S: AsRef<str>>(short_ids: &[S], payload: &str) -> String {
    let ids: Vec<&str> = short_ids.iter().map(AsRef::as_ref).collect();
    format!("cmd=ctrl&devices={{[{}]}}&op={}", ids.join(","), payload)
}

/// Split a datagram into its `key=value` fields.
///
/// All-or-nothing: a single segment that does not split into exactly one key
/// and one value rejects the whole message, as does a repeated key.
pub fn parse_fields(text: &str) -> Result<HashMap<&str, &str>, WireError> {
    if text.is_empty() {
        return Err(WireError::Empty);
    }
    let segments: Vec<&str> = text.split('&').collect();
    if segments.len() < 2 {
        return Err(WireError::TooShort {
            fields: segments.len(),
        });
    }

    let mut fields = HashMap::with_capacity(segments.len());
    for segment in segments {
        let mut parts = segment.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(WireError::BadField {
                segment: segment.to_string(),
            });
        };
        if fields.insert(key, value).is_some() {
            return Err(WireError::DuplicateField {
                key: key.to_string(),
            });
        }
    }
    Ok(fields)
}

/// A device's `pong` announcement, sent in reply to a discovery probe and
/// periodically after power-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub company_id: String,
    pub device_type: String,
    pub device_id: String,
    pub device_key: String,
    pub device_name: String,
    pub host_ip: Ipv4Addr,
    pub sta_ip: Ipv4Addr,
    pub chip: String,
}

impl Announcement {
    /// Whether the vendor and device family signatures are the supported ones.
    pub fn is_supported(&self) -> bool {
        self.company_id == COMPANY_ID && self.device_type == DEVICE_TYPE
    }
}

/// A decoded broadcast datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A control envelope, normally our own command reflected back.
    Ctrl { devices: Vec<String>, op: String },
    /// A discovery announcement.
    Pong(Announcement),
    /// An asynchronous status push. `op` is raw JSON.
    Echo { device_id: String, op: String },
    /// Any other `cmd` value.
    Other { cmd: String },
}

impl WireMessage {
    /// Decode a raw datagram. Fails closed on anything that is not a
    /// well-formed message of a known shape.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(data).map_err(|_| WireError::NotText)?;
        let fields = parse_fields(text)?;
        let cmd = required(&fields, "cmd")?;

        match cmd {
            "ctrl" => {
                let devices = parse_device_list(required(&fields, "devices")?)?;
                let op = required(&fields, "op")?.to_string();
                Ok(WireMessage::Ctrl { devices, op })
            }
            "pong" => Ok(WireMessage::Pong(Announcement {
                company_id: required(&fields, "compandy_id")?.to_string(),
                device_type: required(&fields, "device_type")?.to_string(),
                device_id: required(&fields, "device_id")?.to_string(),
                device_key: required(&fields, "device_key")?.to_string(),
                device_name: required(&fields, "device_name")?.to_string(),
                host_ip: parse_ip(&fields, "host_ip")?,
                sta_ip: parse_ip(&fields, "sta_ip")?,
                chip: required(&fields, "chip")?.trim().to_string(),
            })),
            "echo" => Ok(WireMessage::Echo {
                device_id: required(&fields, "dev")?.to_string(),
                op: required(&fields, "op")?.to_string(),
            }),
            other => Ok(WireMessage::Other {
                cmd: other.to_string(),
            }),
        }
    }
}

fn required<'a>(fields: &HashMap<&str, &'a str>, key: &'static str) -> Result<&'a str, WireError> {
    fields.get(key).copied().ok_or(WireError::MissingField(key))
}

fn parse_ip(fields: &HashMap<&str, &str>, key: &'static str) -> Result<Ipv4Addr, WireError> {
    let value = required(fields, key)?;
    value.parse().map_err(|_| WireError::InvalidValue {
        field: key,
        value: value.to_string(),
    })
}

/// Parse the `{[id1,id2]}` device list of a `ctrl` envelope.
fn parse_device_list(value: &str) -> Result<Vec<String>, WireError> {
    let inner = value
        .strip_prefix("{[")
        .and_then(|v| v.strip_suffix("]}"))
        .ok_or_else(|| WireError::InvalidValue {
            field: "devices",
            value: value.to_string(),
        })?;
    Ok(inner
        .split(',')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect())
}

/// Derive the 4-character wire address from a full device id: the last four
/// characters of the first `_`-delimited segment.
///
/// e.g. "286dcd00fb6c_DT-WYRGB_W600" → "fb6c"
pub fn short_id(device_id: &str) -> Result<String, WireError> {
    let head = device_id.split('_').next().unwrap_or_default();
    let chars: Vec<char> = head.chars().collect();
    if chars.len() < 4 {
        return Err(WireError::InvalidValue {
            field: "device_id",
            value: device_id.to_string(),
        });
    }
    Ok(chars[chars.len() - 4..].iter().collect())
}

/// Read the embedded command code of an `op` JSON payload.
pub fn op_command_code(op: &str) -> Result<i64, WireError> {
    let value: Value = serde_json::from_str(op).map_err(|e| WireError::BadOp(e.to_string()))?;
    value
        .get("cmd")
        .and_then(Value::as_i64)
        .ok_or_else(|| WireError::BadOp("no integer cmd".to_string()))
}

/// Decode a color carried in an `op` JSON payload.
pub fn op_color(op: &str) -> Result<Color, WireError> {
    serde_json::from_str(op).map_err(|e| WireError::BadOp(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PONG: &str = "cmd=pong&compandy_id=_DOIT&device_type=_DT-WYRGB\
        &device_id=286dcd00fb6c_DT-WYRGB_W600&device_key=abc123&device_name=Desk\
        &host_ip=192.168.4.1&sta_ip=192.168.1.42&chip=W600 ";

    #[test]
    fn test_encode_ctrl() {
        assert_eq!(
            encode_ctrl(&["A1B2", "C3D4"], r#"{"cmd":25}"#),
            r#"cmd=ctrl&devices={[A1B2,C3D4]}&op={"cmd":25}"#
        );
        let none: [&str; 0] = [];
        assert_eq!(encode_ctrl(&none, "{}"), "cmd=ctrl&devices={[]}&op={}");
    }

    #[test]
    fn test_ctrl_envelope_decodes_back() {
        let payload = Command::ChangeColor {
            color: Color::new(5000, 0, 0, 0, 0).unwrap(),
            smooth: false,
            duration_ms: None,
        }
        .to_payload();
        let wire = encode_ctrl(&["A1B2", "C3D4"], &payload);

        match WireMessage::decode(wire.as_bytes()).unwrap() {
            WireMessage::Ctrl { devices, op } => {
                assert_eq!(devices, vec!["A1B2".to_string(), "C3D4".to_string()]);
                assert_eq!(op, payload);
            }
            other => panic!("expected ctrl, got {other:?}"),
        }
    }

    #[test]
    fn test_too_short_rejected() {
        assert_eq!(
            WireMessage::decode(b"cmd=ping"),
            Err(WireError::TooShort { fields: 1 })
        );
        assert_eq!(WireMessage::decode(b""), Err(WireError::Empty));
    }

    #[test]
    fn test_bad_segment_rejects_whole_message() {
        assert!(matches!(
            parse_fields("cmd=echo&dev&op={}"),
            Err(WireError::BadField { .. })
        ));
        assert!(matches!(
            parse_fields("cmd=echo&dev=a=b&op={}"),
            Err(WireError::BadField { .. })
        ));
        assert!(matches!(
            parse_fields("cmd=echo&cmd=pong"),
            Err(WireError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_missing_cmd() {
        assert_eq!(
            WireMessage::decode(b"dev=x&op={}"),
            Err(WireError::MissingField("cmd"))
        );
    }

    #[test]
    fn test_non_text_rejected() {
        assert_eq!(
            WireMessage::decode(&[0x63, 0xff, 0x26, 0x3d]),
            Err(WireError::NotText)
        );
    }

    #[test]
    fn test_decode_pong() {
        let WireMessage::Pong(ann) = WireMessage::decode(PONG.as_bytes()).unwrap() else {
            panic!("expected pong");
        };
        assert!(ann.is_supported());
        assert_eq!(ann.device_id, "286dcd00fb6c_DT-WYRGB_W600");
        assert_eq!(ann.device_name, "Desk");
        assert_eq!(ann.host_ip, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(ann.sta_ip, Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(ann.chip, "W600");
    }

    #[test]
    fn test_decode_pong_missing_or_bad_field() {
        let missing = PONG.replace("&device_key=abc123", "");
        assert_eq!(
            WireMessage::decode(missing.as_bytes()),
            Err(WireError::MissingField("device_key"))
        );

        let bad_ip = PONG.replace("192.168.1.42", "not-an-ip");
        assert!(matches!(
            WireMessage::decode(bad_ip.as_bytes()),
            Err(WireError::InvalidValue { field: "sta_ip", .. })
        ));
    }

    #[test]
    fn test_decode_echo_and_other() {
        let echo = WireMessage::decode(br#"cmd=echo&dev=abc_DT&op={"cmd":25}"#).unwrap();
        assert_eq!(
            echo,
            WireMessage::Echo {
                device_id: "abc_DT".to_string(),
                op: r#"{"cmd":25}"#.to_string(),
            }
        );

        let other = WireMessage::decode(b"cmd=hello&x=1").unwrap();
        assert_eq!(other, WireMessage::Other { cmd: "hello".to_string() });
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("286dcd00fb6c_DT-WYRGB_W600").unwrap(), "fb6c");
        assert_eq!(short_id("abcd").unwrap(), "abcd");
        assert!(short_id("abc_DT-WYRGB").is_err());
        assert!(short_id("").is_err());
    }

    #[test]
    fn test_op_command_code() {
        assert_eq!(op_command_code(r#"{"cmd":25,"r":0}"#), Ok(25));
        assert!(op_command_code(r#"{"r":0}"#).is_err());
        assert!(op_command_code("not json").is_err());
    }

    #[test]
    fn test_color_command_payloads() {
        assert_eq!(
            Command::TurnOn.to_payload(),
            r#"{"cmd":6,"r":0,"g":0,"b":0,"w":5000,"m":4000,"on":1}"#
        );
        assert_eq!(
            Command::TurnOff.to_payload(),
            r#"{"cmd":6,"r":0,"g":0,"b":0,"w":0,"m":0,"on":0}"#
        );

        let color = Color::new(100, 200, 300, 0, 0).unwrap();
        assert_eq!(
            Command::ChangeColor { color, smooth: true, duration_ms: None }.to_payload(),
            r#"{"cmd":6,"r":100,"g":200,"b":300,"w":0,"m":0,"smooth":1}"#
        );
        assert_eq!(
            Command::ChangeColor { color, smooth: false, duration_ms: Some(1500) }.to_payload(),
            r#"{"cmd":6,"r":100,"g":200,"b":300,"w":0,"m":0,"smooth":1,"t":1500}"#
        );
    }

    #[test]
    fn test_timer_command_payloads() {
        let at = NaiveDate::from_ymd_opt(2021, 6, 16)
            .unwrap()
            .and_hms_opt(20, 21, 18)
            .unwrap();
        assert_eq!(
            Command::SetPowerupTimer { ts: 7, at, repeat: true }.to_payload(),
            r#"{"cmd":14,"ts":7,"year":2021,"month":6,"day":16,"hour":20,"minute":21,"second":18,"type":1,"repeat":1}"#
        );
        assert_eq!(
            Command::DelayShutdown { minutes: 30, ts: 9 }.to_payload(),
            r#"{"cmd":17,"time":30,"ts":9}"#
        );
        assert_eq!(Command::GetLedStatus.to_payload(), r#"{"cmd":25}"#);
        assert_eq!(Command::FactoryReset.to_payload(), r#"{"cmd":201,"en":1}"#);
    }
}
