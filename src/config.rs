// Timing, bus settings and motor limits
use std::time::Duration;

// Serial bus settings expected by the thruster drivers (8N2)
pub const DEFAULT_BAUDRATE: u32 = 921_600;

// Read timeout per reply: long enough to capture a full telemetry frame
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1);

// Default serial port for the breakout board
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

// Rest between polling rounds, only to bound CPU usage
pub const ROUND_INTERVAL: Duration = Duration::from_millis(10);

// Upper bound on a single reply read
pub const MAX_RESPONSE_LEN: usize = 100;

// Commanded speed limits (RPM)
pub const MAX_SPEED: u32 = 5500;
pub const MIN_SPEED: u32 = 300; // below this the magnitude collapses to zero

// Drivers addressable on one port
pub const MAX_MOTORS: u8 = 15;

// Telemetry report rate for the runtime binary
pub const REPORT_HZ: u64 = 10;

/// Tunables for the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep after every full round
    pub round_interval: Duration,
    /// Maximum number of bytes requested from the transport per reply
    pub max_response_len: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            round_interval: ROUND_INTERVAL,
            max_response_len: MAX_RESPONSE_LEN,
        }
    }
}
