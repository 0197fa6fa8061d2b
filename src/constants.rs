// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

/// UDP port devices listen on for broadcast control and reply on with echoes.
pub const COMMAND_PORT: u16 = 6091;

/// UDP port devices announce themselves on.
///
/// A device joined to a router broadcasts its `pong` announcement to this
/// port every two seconds, ten times, after power-on.
pub const DISCOVERY_PORT: u16 = 6095;

/// TCP port for direct per-device request/response commands.
pub const DEVICE_TCP_PORT: u16 = 5555;

/// Company signature carried in every genuine `pong` announcement.
/// The key name is misspelled on the wire (`compandy_id`).
pub const COMPANY_ID: &str = "_DOIT";

/// Device family signature of the supported RGBW controllers.
pub const DEVICE_TYPE: &str = "_DT-WYRGB";

/// The discovery probe, broadcast verbatim.
pub const DISCOVERY_PROBE: &str = "cmd=ping";

/// Smallest non-zero periodic interval accepted by the listener.
pub const MIN_INTERVAL_MS: u64 = 500;

/// Pause after the startup probe so immediate replies can land.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 250;

/// Upper bound for a single channel of a [`Color`](crate::devices::color::Color).
pub const MAX_CHANNEL_VALUE: u16 = 5000;

/// Receive buffer for one datagram.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Single-read TCP reply buffer.
pub const MAX_REPLY_SIZE: usize = 1024;

/// Command codes understood by the device firmware (the `cmd` field of a JSON op).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    Invalid = 0,
    GetWifiScanResult = 1,
    ModifySsid = 2,
    Reboot = 3,
    GetDeviceInfo = 4,
    LedOperate = 5,
    ChangeColor = 6,
    SetPresetMode = 7,
    SetCustomMode = 8,
    GetDeviceTime = 9,
    SyncDeviceTime = 10,
    SetPowerupLedStatus = 11,
    RememberShutdownLedStatus = 12,
    SetShutdownTimer = 13,
    SetPowerupTimer = 14,
    RemoteControlEnable = 15,
    RouterConfig = 16,
    DelayShutdown = 17,
    StartOta = 18,
    IsConnectedToRouter = 19,
    GetVersion = 20,
    GetDeviceTimers = 21,
    GetDelayInfo = 22,
    CancelTimer = 23,
    GetPowerupStatus = 24,
    GetLedStatus = 25,
    ModifyTimer = 26,
    PresetModeCombo = 27,
    ResetAccessPoint = 28,
    SetTimezone = 29,
    EnableRepeater = 30,
    EnablePortal = 31,
    SetPortalText = 32,
    SetLightPercent = 33,
    SetToPercent = 34,
    SetIrGpio = 35,
    FactoryReset = 201,
}

impl CommandCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Look up a command code from its numeric wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        let code = u8::try_from(code).ok()?;
        Some(match code {
            0 => Self::Invalid,
            1 => Self::GetWifiScanResult,
            2 => Self::ModifySsid,
            3 => Self::Reboot,
            4 => Self::GetDeviceInfo,
            5 => Self::LedOperate,
            6 => Self::ChangeColor,
            7 => Self::SetPresetMode,
            8 => Self::SetCustomMode,
            9 => Self::GetDeviceTime,
            10 => Self::SyncDeviceTime,
            11 => Self::SetPowerupLedStatus,
            12 => Self::RememberShutdownLedStatus,
            13 => Self::SetShutdownTimer,
            14 => Self::SetPowerupTimer,
            15 => Self::RemoteControlEnable,
            16 => Self::RouterConfig,
            17 => Self::DelayShutdown,
            18 => Self::StartOta,
            19 => Self::IsConnectedToRouter,
            20 => Self::GetVersion,
            21 => Self::GetDeviceTimers,
            22 => Self::GetDelayInfo,
            23 => Self::CancelTimer,
            24 => Self::GetPowerupStatus,
            25 => Self::GetLedStatus,
            26 => Self::ModifyTimer,
            27 => Self::PresetModeCombo,
            28 => Self::ResetAccessPoint,
            29 => Self::SetTimezone,
            30 => Self::EnableRepeater,
            31 => Self::EnablePortal,
            32 => Self::SetPortalText,
            33 => Self::SetLightPercent,
            34 => Self::SetToPercent,
            35 => Self::SetIrGpio,
            201 => Self::FactoryReset,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_lookup() {
        assert_eq!(CommandCode::from_code(25), Some(CommandCode::GetLedStatus));
        assert_eq!(CommandCode::from_code(6), Some(CommandCode::ChangeColor));
        assert_eq!(CommandCode::from_code(201), Some(CommandCode::FactoryReset));
        assert_eq!(CommandCode::from_code(36), None);
        assert_eq!(CommandCode::from_code(-3), None);
        assert_eq!(CommandCode::from_code(1000), None);
    }

    #[test]
    fn test_command_code_roundtrip() {
        for code in [0i64, 3, 13, 19, 25, 29, 35, 201] {
            let cmd = CommandCode::from_code(code).expect("known code");
            assert_eq!(i64::from(cmd.code()), code);
        }
    }
}
