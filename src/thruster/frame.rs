// Frame codec
//
// Frame format: [ID, Header, Payload..., Checksum LSB, Checksum MSB]
//   Header bits 0-4 = payload length in 16-bit words
//   Outbound: header bit 7 = write-only (no reply expected)
//   Inbound:  header bit 7 = alarm active, bit 6 = driver enabled
// The checksum covers every byte before it (see `checksum`).

use super::checksum::{checksum, verify};
use super::command::{self, Register, RegisterCommand};
use super::error::ProtocolError;

const HEADER_WRITE_ONLY: u8 = 0x80;
const HEADER_ALARM: u8 = 0x80;
const HEADER_ENABLED: u8 = 0x40;
const HEADER_WORDS_MASK: u8 = 0x1F;

/// ID + header + checksum
pub const MIN_FRAME_LEN: usize = 4;
/// Largest payload the header length field can describe
pub const MAX_PAYLOAD_WORDS: usize = HEADER_WORDS_MASK as usize;

/// Assemble a frame from pre-encoded commands
pub fn build_frame(
    id: u8,
    commands: &[&[u8]],
    expects_reply: bool,
) -> Result<Vec<u8>, ProtocolError> {
    let data_len: usize = commands.iter().map(|c| c.len()).sum();
    let words = data_len / 2;
    if words > MAX_PAYLOAD_WORDS {
        return Err(ProtocolError::PayloadTooLarge { words });
    }

    let mut header = words as u8;
    if !expects_reply {
        header |= HEADER_WRITE_ONLY;
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + data_len);
    frame.push(id);
    frame.push(header);
    for cmd in commands {
        frame.extend_from_slice(cmd);
    }
    frame.extend_from_slice(&checksum(&frame));
    Ok(frame)
}

/// A frame that passed length, checksum and size validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    pub id: u8,
    pub header: u8,
    pub payload: &'a [u8],
}

/// Validate framing and split off the payload
pub fn split_frame(raw: &[u8]) -> Result<RawFrame<'_>, ProtocolError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::SizeMismatch {
            expected: MIN_FRAME_LEN,
            actual: raw.len(),
        });
    }

    let (body, received) = raw.split_at(raw.len() - 2);
    let received = [received[0], received[1]];
    if !verify(body, received) {
        return Err(ProtocolError::ChecksumMismatch {
            id: raw[0],
            expected: checksum(body),
            actual: received,
        });
    }

    let header = raw[1];
    let declared_words = (header & HEADER_WORDS_MASK) as usize;
    let expected = MIN_FRAME_LEN + declared_words * 2;
    if expected != raw.len() {
        return Err(ProtocolError::SizeMismatch {
            expected,
            actual: raw.len(),
        });
    }

    Ok(RawFrame {
        id: raw[0],
        header,
        payload: &body[2..],
    })
}

/// Host -> driver frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub id: u8,
    pub expects_reply: bool,
    pub commands: Vec<RegisterCommand>,
}

impl OutboundFrame {
    /// Register writes, no reply expected
    pub fn write_only(id: u8, writes: &[(Register, i32)]) -> Self {
        let commands = writes
            .iter()
            .map(|&(register, value)| RegisterCommand {
                index: register.index(),
                write: true,
                is_32bit: true,
                value,
            })
            .collect();
        Self {
            id,
            expects_reply: false,
            commands,
        }
    }

    /// Register reads, the driver answers with their values
    pub fn read_request(id: u8, registers: &[Register]) -> Self {
        let commands = registers
            .iter()
            .map(|register| RegisterCommand {
                index: register.index(),
                write: false,
                is_32bit: true,
                value: 0,
            })
            .collect();
        Self {
            id,
            expects_reply: true,
            commands,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let encoded: Vec<[u8; command::COMMAND_LEN_32]> = self
            .commands
            .iter()
            .map(|c| command::encode(c.index, c.write, c.value))
            .collect();
        let slices: Vec<&[u8]> = encoded.iter().map(|c| c.as_slice()).collect();
        build_frame(self.id, &slices, self.expects_reply)
    }

    /// Decode a frame as sent by the host (useful for bus sniffing and tests)
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let frame = split_frame(raw)?;
        Ok(Self {
            id: frame.id,
            expects_reply: frame.header & HEADER_WRITE_ONLY == 0,
            commands: command::decode_payload(frame.payload)?,
        })
    }
}

/// Driver -> host reply carrying status bits and register values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame {
    pub id: u8,
    pub has_alarm: bool,
    pub is_enabled: bool,
    pub commands: Vec<RegisterCommand>,
}

impl TelemetryFrame {
    /// Parse a reply. The whole payload is decoded up front so a bad command
    /// rejects the frame before anything is applied.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let frame = split_frame(raw)?;
        Ok(Self {
            id: frame.id,
            has_alarm: frame.header & HEADER_ALARM != 0,
            is_enabled: frame.header & HEADER_ENABLED != 0,
            commands: command::decode_payload(frame.payload)?,
        })
    }

    /// Encode a reply the way a driver would (simulation and tests)
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let encoded: Vec<[u8; command::COMMAND_LEN_32]> = self
            .commands
            .iter()
            .map(|c| command::encode(c.index, c.write, c.value))
            .collect();
        let slices: Vec<&[u8]> = encoded.iter().map(|c| c.as_slice()).collect();
        let mut frame = build_frame(self.id, &slices, true)?;

        frame[1] &= HEADER_WORDS_MASK;
        if self.has_alarm {
            frame[1] |= HEADER_ALARM;
        }
        if self.is_enabled {
            frame[1] |= HEADER_ENABLED;
        }
        let len = frame.len();
        let sum = checksum(&frame[..len - 2]);
        frame[len - 2..].copy_from_slice(&sum);
        Ok(frame)
    }
}
