// Smart thruster bus driver
//
// Provides:
// - XOR lane checksum, register command and frame codecs
// - Lock-free per-motor state mirror
// - Background polling loop and the high-level driver API

pub mod alarm;
pub mod checksum;
pub mod command;
mod driver;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod poller;
pub mod setpoint;
pub mod state;
pub mod transport;

pub use alarm::Alarm;
pub use command::{Register, RegisterCommand, TelemetryField};
pub use driver::ThrusterDriver;
pub use error::{ProtocolError, ThrusterError};
pub use frame::{OutboundFrame, TelemetryFrame};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use poller::{Poller, PollerState};
pub use setpoint::{clamp_speed, SpeedSetpoint};
pub use state::{MotorState, MotorStore};
pub use transport::{SerialTransport, Transport};
