// Polling loop
//
// Runs on a dedicated thread. Each round visits every motor in ascending id
// order and, per motor, strictly in this order:
//   1. pending alarm reset   (write-only frame)
//   2. direction/speed/enable (write-only frame)
//   3. telemetry read request, then read + parse + apply the reply
// The loop is an explicit state machine:
//   Idle -> RunningRound -> Idle -> ... -> ShuttingDown -> Stopped

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use super::command::{Register, TELEMETRY_REGISTERS};
use super::error::{Result, ThrusterError};
use super::frame::{OutboundFrame, TelemetryFrame};
use super::metrics::BusMetrics;
use super::setpoint::SpeedSetpoint;
use super::state::{MotorState, MotorStore};
use super::transport::Transport;
use crate::config::PollConfig;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    /// Between rounds
    #[default]
    Idle = 0,
    RunningRound = 1,
    /// Sending the final zero-speed/disable pass
    ShuttingDown = 2,
    /// Terminal
    Stopped = 3,
}

impl PollerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::RunningRound,
            2 => Self::ShuttingDown,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Poller state shared with the control surface
#[derive(Debug, Default)]
pub struct AtomicPollerState {
    inner: AtomicU8,
}

impl AtomicPollerState {
    pub fn new(state: PollerState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> PollerState {
        PollerState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: PollerState) {
        self.inner.store(state as u8, Ordering::Release);
    }
}

pub struct Poller<T: Transport> {
    transport: T,
    store: Arc<MotorStore>,
    metrics: Arc<BusMetrics>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicPollerState>,
    config: PollConfig,
}

impl<T: Transport> Poller<T> {
    pub fn new(
        transport: T,
        store: Arc<MotorStore>,
        metrics: Arc<BusMetrics>,
        running: Arc<AtomicBool>,
        config: PollConfig,
    ) -> Self {
        Self {
            transport,
            store,
            metrics,
            running,
            state: Arc::new(AtomicPollerState::new(PollerState::Idle)),
            config,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state.get()
    }

    pub fn shared_state(&self) -> Arc<AtomicPollerState> {
        self.state.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Write one frame and flush it onto the bus
    fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        let bytes = frame.encode()?;
        debug!("Motor {} <- {:02X?}", frame.id, bytes);
        self.transport.write(&bytes)?;
        self.transport.flush()?;
        BusMetrics::bump(&self.metrics.frames_sent);
        Ok(())
    }

    pub fn send_alarm_reset(&mut self, id: u8) -> Result<()> {
        self.send(&OutboundFrame::write_only(id, &[(Register::AlarmReset, 1)]))
    }

    pub fn send_setpoint(&mut self, id: u8, setpoint: SpeedSetpoint) -> Result<()> {
        let frame = OutboundFrame::write_only(
            id,
            &[
                (Register::Direction, setpoint.direction),
                // bounded by MAX_SPEED
                (Register::SpeedMagnitude, setpoint.magnitude as i32),
                (Register::Enable, i32::from(setpoint.enable)),
            ],
        );
        self.send(&frame)
    }

    /// Request telemetry and apply the reply, if any
    pub fn request_telemetry(&mut self, id: u8) -> Result<()> {
        self.send(&OutboundFrame::read_request(id, &TELEMETRY_REGISTERS))?;

        let raw = self.transport.read(self.config.max_response_len)?;
        if raw.is_empty() {
            return Err(ThrusterError::Timeout { id });
        }
        debug!("Motor {} -> {:02X?}", id, raw);

        let frame = TelemetryFrame::parse(&raw)?;
        if frame.id != id {
            debug!("Requested motor {}, reply came from {}", id, frame.id);
        }
        if self.store.apply_frame(&frame) {
            BusMetrics::bump(&self.metrics.replies_applied);
        } else {
            BusMetrics::bump(&self.metrics.unknown_ids);
        }
        Ok(())
    }

    /// One motor's share of a round. Never fails: every error is logged,
    /// counted and left for the next round to retry.
    fn poll_motor(&mut self, motor: &MotorState) {
        let id = motor.id();

        if motor.take_alarm_reset() {
            info!("Resetting alarm on motor {}", id);
            if let Err(e) = self.send_alarm_reset(id) {
                motor.request_alarm_reset();
                self.record_error(id, &e);
            }
        }

        let setpoint = SpeedSetpoint::from_target(motor.target_speed(), motor.keep_enabled());
        if let Err(e) = self.send_setpoint(id, setpoint) {
            self.record_error(id, &e);
        }

        if let Err(e) = self.request_telemetry(id) {
            self.record_error(id, &e);
        }
    }

    fn record_error(&self, id: u8, err: &ThrusterError) {
        match err {
            ThrusterError::Timeout { .. } => {
                // No reply this cycle, nothing to update
                debug!("Motor {}: {}", id, err);
                BusMetrics::bump(&self.metrics.timeouts);
            }
            ThrusterError::Protocol(protocol) => {
                warn!("Motor {}: discarding frame: {}", id, protocol);
                self.metrics.record_protocol_error(protocol);
            }
            _ => {
                warn!("Motor {}: transport error: {}", id, err);
                BusMetrics::bump(&self.metrics.transport_errors);
            }
        }
    }

    /// One full pass over the motors. Stops early once the running flag
    /// drops, so shutdown waits for at most one motor.
    pub fn run_round(&mut self) {
        let store = self.store.clone();
        for motor in store.iter() {
            if !self.running.load(Ordering::Acquire) {
                debug!("Stop requested, ending round early");
                return;
            }
            self.poll_motor(motor);
        }
        BusMetrics::bump(&self.metrics.rounds);
    }

    /// Command every motor to zero speed with the driver disabled
    pub fn shutdown_pass(&mut self) {
        info!("Shutting down {} motors", self.store.len());
        let store = self.store.clone();
        for motor in store.iter() {
            if let Err(e) = self.send_setpoint(motor.id(), SpeedSetpoint::stopped()) {
                self.record_error(motor.id(), &e);
            }
        }
    }

    /// Advance the state machine by one transition and return the new state
    pub fn step(&mut self) -> PollerState {
        let next = match self.state.get() {
            PollerState::Idle => {
                if self.running.load(Ordering::Acquire) {
                    PollerState::RunningRound
                } else {
                    PollerState::ShuttingDown
                }
            }
            PollerState::RunningRound => {
                self.run_round();
                thread::sleep(self.config.round_interval);
                PollerState::Idle
            }
            PollerState::ShuttingDown => {
                self.shutdown_pass();
                PollerState::Stopped
            }
            PollerState::Stopped => PollerState::Stopped,
        };
        self.state.set(next);
        next
    }

    /// Run until stopped. Hands the transport back once the shutdown pass
    /// is done.
    pub fn run(mut self) -> T {
        info!("Polling {} motors", self.store.len());
        while self.step() != PollerState::Stopped {}
        info!("Polling loop stopped");
        self.transport
    }
}
