// High-level thruster driver
//
// Owns the shared motor store and the polling thread. Every control call is
// a plain atomic store; the polling thread picks changes up on its next
// round.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::error::{Result, ThrusterError};
use super::metrics::{BusMetrics, MetricsSnapshot};
use super::poller::{AtomicPollerState, Poller, PollerState};
use super::setpoint::SpeedSetpoint;
use super::state::{MotorState, MotorStore};
use super::transport::Transport;
use crate::config::{MAX_MOTORS, PollConfig};
use crate::messages::MotorTelemetry;

/// Driver for up to `MAX_MOTORS` thrusters sharing one serial bus
pub struct ThrusterDriver {
    store: Arc<MotorStore>,
    metrics: Arc<BusMetrics>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicPollerState>,
    poller: Option<JoinHandle<()>>,
}

impl ThrusterDriver {
    /// Start driving motors `1..=count` with the default polling config
    pub fn start<T: Transport + 'static>(count: u8, transport: T) -> Result<Self> {
        Self::start_with_config(count, transport, PollConfig::default())
    }

    /// Zero and reset every motor, then hand the bus to the polling thread
    pub fn start_with_config<T: Transport + 'static>(
        count: u8,
        transport: T,
        config: PollConfig,
    ) -> Result<Self> {
        if count == 0 || count > MAX_MOTORS {
            return Err(ThrusterError::InvalidMotorCount { count });
        }

        info!("Starting thruster driver for {} motors", count);
        let store = Arc::new(MotorStore::new(count));
        let metrics = Arc::new(BusMetrics::new());
        let running = Arc::new(AtomicBool::new(true));

        let mut poller = Poller::new(
            transport,
            store.clone(),
            metrics.clone(),
            running.clone(),
            config,
        );

        for id in store.ids() {
            poller.send_setpoint(id, SpeedSetpoint::from_target(0, false))?;
            poller.send_alarm_reset(id)?;
        }

        let state = poller.shared_state();
        let handle = thread::Builder::new()
            .name("thruster-poller".into())
            .spawn(move || {
                poller.run();
            })?;

        Ok(Self {
            store,
            metrics,
            running,
            state,
            poller: Some(handle),
        })
    }

    /// Signal the polling thread, wait for its shutdown pass and exit.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.poller.take() else {
            return Ok(());
        };

        info!("Stopping thruster driver");
        self.running.store(false, Ordering::Release);
        handle.join().map_err(|_| ThrusterError::PollerPanicked)
    }

    /// False once stopped or if the polling thread has exited on its own
    pub fn is_running(&self) -> bool {
        self.poller.as_ref().is_some_and(|handle| !handle.is_finished())
            && self.running.load(Ordering::Acquire)
    }

    pub fn poller_state(&self) -> PollerState {
        self.state.get()
    }

    pub fn motor(&self, id: u8) -> Option<&MotorState> {
        self.store.get(id)
    }

    fn motor_or_err(&self, id: u8) -> Result<&MotorState> {
        self.store.get(id).ok_or(ThrusterError::UnknownMotor { id })
    }

    pub fn motor_ids(&self) -> Vec<u8> {
        self.store.ids()
    }

    /// Store a new setpoint (RPM, sign = direction). No I/O happens here.
    pub fn set_target_speed(&self, id: u8, rpm: i32) -> Result<()> {
        self.motor_or_err(id)?.set_target_speed(rpm);
        Ok(())
    }

    pub fn target_speed(&self, id: u8) -> Result<i32> {
        Ok(self.motor_or_err(id)?.target_speed())
    }

    /// Keep the driver powered even when the setpoint is zero
    pub fn set_keep_enabled(&self, id: u8, keep: bool) -> Result<()> {
        self.motor_or_err(id)?.set_keep_enabled(keep);
        Ok(())
    }

    /// Queue an alarm reset for the next round. Idempotent.
    pub fn request_alarm_reset(&self, id: u8) -> Result<()> {
        self.motor_or_err(id)?.request_alarm_reset();
        Ok(())
    }

    /// Description of the motor's last reported alarm code. Only fails for
    /// ids this driver does not own.
    pub fn describe_alarm(&self, id: u8) -> Result<Cow<'static, str>> {
        Ok(self.motor_or_err(id)?.alarm_description())
    }

    pub fn telemetry(&self, id: u8) -> Result<MotorTelemetry> {
        Ok(self.motor_or_err(id)?.snapshot())
    }

    pub fn telemetry_all(&self) -> Vec<MotorTelemetry> {
        self.store.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for ThrusterDriver {
    fn drop(&mut self) {
        // Leave the motors stopped and disabled
        if let Err(e) = self.stop() {
            warn!("Failed to stop thruster driver on drop: {}", e);
        }
    }
}

impl std::fmt::Debug for ThrusterDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrusterDriver")
            .field("motors", &self.store.len())
            .field("state", &self.poller_state())
            .finish()
    }
}
