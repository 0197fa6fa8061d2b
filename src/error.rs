// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::fmt;

/// Error codes returned by the device firmware in the `res` field of a TCP reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceErrorCode {
    None = 0,
    ScanFailed = 1,
    ScanTimeout = 2,
    InvalidPassword = 3,
    GetCmdFailed = 4,
    GetStatusFailed = 5,
    ScanResultNull = 6,
    GetPasswordFailed = 7,
    GetLedOpFailed = 8,
    GetSsidFailed = 9,
    GetRedFailed = 10,
    GetBlueFailed = 11,
    GetGreenFailed = 12,
    GetWhiteFailed = 13,
    GetWarmthFailed = 14,
    GetModeIndexFailed = 15,
    GetFreqFailed = 16,
    GetTimeJsonFailed = 17,
    GetYearFailed = 18,
    GetMonthFailed = 19,
    GetDayFailed = 20,
    GetHourFailed = 21,
    GetMinuteFailed = 22,
    GetSecondFailed = 23,
    MallocFailed = 24,
    SetShutdownTimerFailed = 25,
    UnknownCmd = 26,
    GetTimerIndexFailed = 27,
    GetDelayTimeFailed = 28,
    GetTypeFailed = 29,
    SetTimerFailed = 30,
    GetColorArrFailed = 31,
    TooManyCustomColor = 32,
    GetOpFailed = 33,
    ChangeRemoteCtrlFailed = 34,
    GetPowerupInfoFailed = 35,
    ModifyTimerFailed = 36,
    GetModeListFailed = 37,
    GetModeItemFailed = 38,
    GetLoopFailed = 39,
    TooManyMode = 40,
    GetRepeatFailed = 41,
    GetTimerInfoFailed = 42,
    GetTimezoneOffsetFailed = 43,
    NotConnectedToRouter = 44,
    GetTimestampFailed = 45,
    GetRepeaterEnableFailed = 46,
    GetPortFailed = 47,
    GetValueFailed = 48,
    GetIsOnFailed = 49,
    GetWeekdayFailed = 50,
    WrongWeekday = 51,
    GetWeekdayItemFailed = 52,
    WrongTimerType = 53,
}

impl DeviceErrorCode {
    const ALL: [Self; 54] = [
        Self::None,
        Self::ScanFailed,
        Self::ScanTimeout,
        Self::InvalidPassword,
        Self::GetCmdFailed,
        Self::GetStatusFailed,
        Self::ScanResultNull,
        Self::GetPasswordFailed,
        Self::GetLedOpFailed,
        Self::GetSsidFailed,
        Self::GetRedFailed,
        Self::GetBlueFailed,
        Self::GetGreenFailed,
        Self::GetWhiteFailed,
        Self::GetWarmthFailed,
        Self::GetModeIndexFailed,
        Self::GetFreqFailed,
        Self::GetTimeJsonFailed,
        Self::GetYearFailed,
        Self::GetMonthFailed,
        Self::GetDayFailed,
        Self::GetHourFailed,
        Self::GetMinuteFailed,
        Self::GetSecondFailed,
        Self::MallocFailed,
        Self::SetShutdownTimerFailed,
        Self::UnknownCmd,
        Self::GetTimerIndexFailed,
        Self::GetDelayTimeFailed,
        Self::GetTypeFailed,
        Self::SetTimerFailed,
        Self::GetColorArrFailed,
        Self::TooManyCustomColor,
        Self::GetOpFailed,
        Self::ChangeRemoteCtrlFailed,
        Self::GetPowerupInfoFailed,
        Self::ModifyTimerFailed,
        Self::GetModeListFailed,
        Self::GetModeItemFailed,
        Self::GetLoopFailed,
        Self::TooManyMode,
        Self::GetRepeatFailed,
        Self::GetTimerInfoFailed,
        Self::GetTimezoneOffsetFailed,
        Self::NotConnectedToRouter,
        Self::GetTimestampFailed,
        Self::GetRepeaterEnableFailed,
        Self::GetPortFailed,
        Self::GetValueFailed,
        Self::GetIsOnFailed,
        Self::GetWeekdayFailed,
        Self::WrongWeekday,
        Self::GetWeekdayItemFailed,
        Self::WrongTimerType,
    ];

    /// Map a numeric `res` value from the device onto a known code.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "No error",
            Self::ScanFailed => "WiFi scan failed",
            Self::ScanTimeout => "WiFi scan timed out",
            Self::InvalidPassword => "Invalid WiFi password",
            Self::GetCmdFailed => "Missing cmd field",
            Self::GetStatusFailed => "Failed to read status",
            Self::ScanResultNull => "WiFi scan returned nothing",
            Self::GetPasswordFailed => "Missing password field",
            Self::GetLedOpFailed => "Missing LED operation field",
            Self::GetSsidFailed => "Missing SSID field",
            Self::GetRedFailed => "Missing red channel",
            Self::GetBlueFailed => "Missing blue channel",
            Self::GetGreenFailed => "Missing green channel",
            Self::GetWhiteFailed => "Missing white channel",
            Self::GetWarmthFailed => "Missing warmth channel",
            Self::GetModeIndexFailed => "Missing mode index",
            Self::GetFreqFailed => "Missing frequency",
            Self::GetTimeJsonFailed => "Malformed time object",
            Self::GetYearFailed => "Missing year",
            Self::GetMonthFailed => "Missing month",
            Self::GetDayFailed => "Missing day",
            Self::GetHourFailed => "Missing hour",
            Self::GetMinuteFailed => "Missing minute",
            Self::GetSecondFailed => "Missing second",
            Self::MallocFailed => "Device out of memory",
            Self::SetShutdownTimerFailed => "Failed to set shutdown timer",
            Self::UnknownCmd => "Unknown command",
            Self::GetTimerIndexFailed => "Missing timer index",
            Self::GetDelayTimeFailed => "Missing delay time",
            Self::GetTypeFailed => "Missing type",
            Self::SetTimerFailed => "Failed to set timer",
            Self::GetColorArrFailed => "Missing color array",
            Self::TooManyCustomColor => "Too many custom colors",
            Self::GetOpFailed => "Missing op field",
            Self::ChangeRemoteCtrlFailed => "Failed to change remote control",
            Self::GetPowerupInfoFailed => "Failed to read power-up info",
            Self::ModifyTimerFailed => "Failed to modify timer",
            Self::GetModeListFailed => "Missing mode list",
            Self::GetModeItemFailed => "Missing mode item",
            Self::GetLoopFailed => "Missing loop field",
            Self::TooManyMode => "Too many modes",
            Self::GetRepeatFailed => "Missing repeat field",
            Self::GetTimerInfoFailed => "Failed to read timer info",
            Self::GetTimezoneOffsetFailed => "Missing timezone offset",
            Self::NotConnectedToRouter => "Not connected to router",
            Self::GetTimestampFailed => "Missing timestamp",
            Self::GetRepeaterEnableFailed => "Missing repeater flag",
            Self::GetPortFailed => "Missing port",
            Self::GetValueFailed => "Missing value",
            Self::GetIsOnFailed => "Missing on flag",
            Self::GetWeekdayFailed => "Missing weekday",
            Self::WrongWeekday => "Invalid weekday",
            Self::GetWeekdayItemFailed => "Missing weekday item",
            Self::WrongTimerType => "Invalid timer type",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// All errors that can occur in the dohome-lan library.
#[derive(Debug, thiserror::Error)]
pub enum DoHomeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {name}: {value} ms (must be 0 or at least {min} ms)")]
    InvalidInterval {
        name: &'static str,
        value: u64,
        min: u64,
    },

    #[error("Color channel {channel} out of range: {value} (max {max})")]
    ColorOutOfRange {
        channel: &'static str,
        value: i64,
        max: u16,
    },

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("No local IPv4 interface to bind")]
    NoInterfaces,

    #[error("Command timeout: {command}")]
    CommandTimeout { command: String },

    #[error("Device error: {0}")]
    DeviceError(DeviceErrorCode),

    #[error("Unknown device error code: {0}")]
    UnknownDeviceError(i64),

    #[error("Invalid response: {details}")]
    InvalidResponse { details: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Device closed the connection")]
    Disconnected,
}

impl DoHomeError {
    /// Whether this error is transient and the command could be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DoHomeError::Io(_) | DoHomeError::CommandTimeout { .. } | DoHomeError::Disconnected
        )
    }
}

pub type Result<T> = std::result::Result<T, DoHomeError>;

/// Reasons a broadcast datagram is rejected by the wire decoder.
///
/// These never leave the dispatcher: a rejected datagram is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram is not valid text")]
    NotText,

    #[error("empty datagram")]
    Empty,

    #[error("too short: {fields} field(s)")]
    TooShort { fields: usize },

    #[error("malformed field {segment:?}")]
    BadField { segment: String },

    #[error("duplicate field {key:?}")]
    DuplicateField { key: String },

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid op payload: {0}")]
    BadOp(String),
}
