// Register command codec
//
// Command layout: [index_lsb, flags | index_hi, value...]
//   flags bit 7 = 32-bit value (6-byte command), else 16-bit (4-byte command)
//   flags bit 6 = write
//   flags bits 0-3 = index bits 8..11
// Values are little-endian two's complement.

use tracing::debug;

use super::error::ProtocolError;

const FLAG_32BIT: u8 = 0x80;
const FLAG_WRITE: u8 = 0x40;
const INDEX_HI_MASK: u8 = 0x0F;

/// Highest addressable register index (12 bits)
pub const MAX_INDEX: u16 = 0x0FFF;

/// Size of an encoded command carrying a 32-bit value
pub const COMMAND_LEN_32: usize = 6;
/// Size of an encoded command carrying a 16-bit value
pub const COMMAND_LEN_16: usize = 4;

/// Registers used by the driver
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    // Telemetry (read)
    MeasuredSpeed = 1107,
    Current = 1116,     // raw / 100 = A
    Temperature = 1123, // raw / 10 = degC
    Voltage = 1124,     // raw / 10 = V
    AlarmCode = 1700,

    // Control (write)
    Enable = 2000,
    Direction = 2001,
    SpeedMagnitude = 2002,
    AlarmReset = 2032, // write 1
}

impl Register {
    pub fn index(self) -> u16 {
        self as u16
    }
}

/// Registers requested in every telemetry read, in wire order
pub const TELEMETRY_REGISTERS: [Register; 5] = [
    Register::AlarmCode,
    Register::MeasuredSpeed,
    Register::Current,
    Register::Temperature,
    Register::Voltage,
];

/// Motor state fields fed by telemetry registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryField {
    AlarmCode,
    MeasuredSpeed,
    Current,
    Temperature,
    Voltage,
}

/// Register -> field routing, with the raw value divisor
const TELEMETRY_TABLE: [(Register, TelemetryField, f32); 5] = [
    (Register::AlarmCode, TelemetryField::AlarmCode, 1.0),
    (Register::MeasuredSpeed, TelemetryField::MeasuredSpeed, 1.0),
    (Register::Current, TelemetryField::Current, 100.0),
    (Register::Temperature, TelemetryField::Temperature, 10.0),
    (Register::Voltage, TelemetryField::Voltage, 10.0),
];

impl TelemetryField {
    /// Look up the field a register index feeds, `None` for anything else
    pub fn from_index(index: u16) -> Option<Self> {
        TELEMETRY_TABLE
            .iter()
            .find(|(reg, _, _)| reg.index() == index)
            .map(|&(_, field, _)| field)
    }

    /// Convert a raw register value to physical units
    pub fn scale(self, raw: i32) -> f32 {
        let divisor = TELEMETRY_TABLE
            .iter()
            .find(|(_, field, _)| *field == self)
            .map_or(1.0, |&(_, _, divisor)| divisor);
        raw as f32 / divisor
    }
}

/// A single decoded register command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterCommand {
    pub index: u16,
    pub write: bool,
    pub is_32bit: bool,
    pub value: i32,
}

/// Encode a command. Always uses the 32-bit value form; `index` is
/// truncated to 12 bits.
pub fn encode(index: u16, write: bool, value: i32) -> [u8; COMMAND_LEN_32] {
    let [lsb, msb] = (index & MAX_INDEX).to_le_bytes();
    let mut flags = (msb & INDEX_HI_MASK) | FLAG_32BIT;
    if write {
        flags |= FLAG_WRITE;
    }
    let [v0, v1, v2, v3] = value.to_le_bytes();
    [lsb, flags, v0, v1, v2, v3]
}

/// Encode a read request; the value field is ignored by the drivers
pub fn read(register: Register) -> [u8; COMMAND_LEN_32] {
    encode(register.index(), false, 0)
}

/// Encode a register write
pub fn write(register: Register, value: i32) -> [u8; COMMAND_LEN_32] {
    encode(register.index(), true, value)
}

/// Decode one command from the front of `bytes`, returning it with the
/// unconsumed tail
pub fn decode(bytes: &[u8]) -> Result<(RegisterCommand, &[u8]), ProtocolError> {
    if bytes.len() < 2 {
        return Err(ProtocolError::TruncatedCommand {
            needed: COMMAND_LEN_16,
            available: bytes.len(),
        });
    }

    let flags = bytes[1];
    let is_32bit = flags & FLAG_32BIT != 0;
    let needed = if is_32bit {
        COMMAND_LEN_32
    } else {
        COMMAND_LEN_16
    };
    if bytes.len() < needed {
        return Err(ProtocolError::TruncatedCommand {
            needed,
            available: bytes.len(),
        });
    }

    let index = u16::from_le_bytes([bytes[0], flags & INDEX_HI_MASK]);
    let value = if is_32bit {
        i32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]])
    } else {
        debug!("Register {} carries a 16-bit value", index);
        i32::from(i16::from_le_bytes([bytes[2], bytes[3]]))
    };

    let command = RegisterCommand {
        index,
        write: flags & FLAG_WRITE != 0,
        is_32bit,
        value,
    };
    Ok((command, &bytes[needed..]))
}

/// Decode a whole payload of back-to-back commands
pub fn decode_payload(mut bytes: &[u8]) -> Result<Vec<RegisterCommand>, ProtocolError> {
    let mut commands = Vec::with_capacity(bytes.len() / COMMAND_LEN_32);
    while !bytes.is_empty() {
        let (command, rest) = decode(bytes)?;
        commands.push(command);
        bytes = rest;
    }
    Ok(commands)
}
