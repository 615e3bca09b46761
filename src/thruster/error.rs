// Error types for the thruster bus

/// Frame-level decode/encode errors. Inside the polling loop these only
/// ever discard the offending frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Checksum mismatch for frame from motor {id}: expected {expected:02X?}, got {actual:02X?}")]
    ChecksumMismatch {
        id: u8,
        expected: [u8; 2],
        actual: [u8; 2],
    },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Truncated register command: need {needed} bytes, {available} available")]
    TruncatedCommand { needed: usize, available: usize },

    #[error("Payload of {words} words does not fit the frame header")]
    PayloadTooLarge { words: usize },
}

/// Errors surfaced by the driver and the serial transport
#[derive(Debug, thiserror::Error)]
pub enum ThrusterError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },

    #[error("Unknown motor id {id}")]
    UnknownMotor { id: u8 },

    #[error("Invalid motor count {count}: expected 1..={max}", max = crate::config::MAX_MOTORS)]
    InvalidMotorCount { count: u8 },

    #[error("Polling thread panicked")]
    PollerPanicked,
}

pub type Result<T> = std::result::Result<T, ThrusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ThrusterError::from(ProtocolError::SizeMismatch {
            expected: 34,
            actual: 12,
        });
        let msg = err.to_string();
        assert!(msg.contains("34"), "{}", msg);
        assert!(msg.contains("12"), "{}", msg);

        let msg = ThrusterError::InvalidMotorCount { count: 16 }.to_string();
        assert!(msg.contains("16") && msg.contains("15"), "{}", msg);
    }
}
