// Alarm catalog for the thruster drivers

use std::borrow::Cow;

/// Alarm codes reported through the alarm code register
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    None = 0,
    DriverOverTemperature = 16,
    OverVoltage = 18,
    UnderVoltage = 19,
    OverSpeed = 20,
    PayloadOverCurrent = 21,
    OverCurrent = 26, // 0x1A
}

impl Alarm {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            16 => Some(Self::DriverOverTemperature),
            18 => Some(Self::OverVoltage),
            19 => Some(Self::UnderVoltage),
            20 => Some(Self::OverSpeed),
            21 => Some(Self::PayloadOverCurrent),
            26 => Some(Self::OverCurrent),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::None => "No alarm",
            Self::DriverOverTemperature => "Driver temperature too high",
            Self::OverVoltage => "Input voltage too high",
            Self::UnderVoltage => "Input voltage too low",
            Self::OverSpeed => "Motor speed/acceleration too high",
            Self::PayloadOverCurrent => "Over current, payload is too high",
            Self::OverCurrent => "Alarm 0x1A, overcurrent",
        }
    }
}

/// Human readable description for any alarm code. Never fails: unknown
/// codes are rendered with the raw value.
pub fn describe(code: i32) -> Cow<'static, str> {
    match Alarm::from_code(code) {
        Some(alarm) => Cow::Borrowed(alarm.description()),
        None => Cow::Owned(format!("Unknown alarm code {}", code)),
    }
}
