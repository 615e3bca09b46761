// Shared motor state mirror
//
// Every field is an independent atomic: callers write targets and flags,
// the polling thread writes telemetry. Reading several fields is NOT a
// consistent snapshot; telemetry fields are only eventually consistent with
// each other.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use tracing::{debug, warn};

use super::alarm;
use super::command::TelemetryField;
use super::frame::TelemetryFrame;
use crate::messages::MotorTelemetry;

/// f32 stored as its IEEE bits
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Live state of one motor driver
#[derive(Debug)]
pub struct MotorState {
    id: u8,
    target_speed: AtomicI32,
    measured_speed: AtomicI32,
    current: AtomicF32,
    voltage: AtomicF32,
    temperature: AtomicF32,
    is_enabled: AtomicBool,
    keep_enabled: AtomicBool,
    has_alarm: AtomicBool,
    alarm_code: AtomicI32,
    alarm_reset_requested: AtomicBool,
}

impl MotorState {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            target_speed: AtomicI32::new(0),
            measured_speed: AtomicI32::new(0),
            current: AtomicF32::new(0.0),
            voltage: AtomicF32::new(0.0),
            temperature: AtomicF32::new(0.0),
            is_enabled: AtomicBool::new(false),
            keep_enabled: AtomicBool::new(false),
            has_alarm: AtomicBool::new(false),
            alarm_code: AtomicI32::new(0),
            alarm_reset_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    // === Caller-owned fields ===

    pub fn target_speed(&self) -> i32 {
        self.target_speed.load(Ordering::Relaxed)
    }

    pub fn set_target_speed(&self, rpm: i32) {
        self.target_speed.store(rpm, Ordering::Relaxed);
    }

    pub fn keep_enabled(&self) -> bool {
        self.keep_enabled.load(Ordering::Relaxed)
    }

    pub fn set_keep_enabled(&self, keep: bool) {
        self.keep_enabled.store(keep, Ordering::Relaxed);
    }

    pub fn alarm_reset_requested(&self) -> bool {
        self.alarm_reset_requested.load(Ordering::Acquire)
    }

    /// Ask the poller to send an alarm reset. Idempotent.
    pub fn request_alarm_reset(&self) {
        self.alarm_reset_requested.store(true, Ordering::Release);
    }

    /// Consume a pending reset request
    pub(crate) fn take_alarm_reset(&self) -> bool {
        self.alarm_reset_requested.swap(false, Ordering::AcqRel)
    }

    // === Telemetry fields ===

    pub fn measured_speed(&self) -> i32 {
        self.measured_speed.load(Ordering::Relaxed)
    }

    pub fn set_measured_speed(&self, rpm: i32) {
        self.measured_speed.store(rpm, Ordering::Relaxed);
    }

    /// Amps
    pub fn current(&self) -> f32 {
        self.current.load()
    }

    pub fn set_current(&self, amps: f32) {
        self.current.store(amps);
    }

    /// Volts
    pub fn voltage(&self) -> f32 {
        self.voltage.load()
    }

    pub fn set_voltage(&self, volts: f32) {
        self.voltage.store(volts);
    }

    /// Driver temperature in degrees Celsius
    pub fn temperature(&self) -> f32 {
        self.temperature.load()
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.temperature.store(celsius);
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.is_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn has_alarm(&self) -> bool {
        self.has_alarm.load(Ordering::Relaxed)
    }

    pub fn set_has_alarm(&self, alarm: bool) {
        self.has_alarm.store(alarm, Ordering::Relaxed);
    }

    pub fn alarm_code(&self) -> i32 {
        self.alarm_code.load(Ordering::Relaxed)
    }

    pub fn set_alarm_code(&self, code: i32) {
        self.alarm_code.store(code, Ordering::Relaxed);
    }

    /// Description of the last reported alarm code
    pub fn alarm_description(&self) -> Cow<'static, str> {
        alarm::describe(self.alarm_code())
    }

    /// Route one telemetry register value into its field
    pub fn apply_telemetry(&self, field: TelemetryField, raw: i32) {
        match field {
            TelemetryField::AlarmCode => self.set_alarm_code(raw),
            TelemetryField::MeasuredSpeed => self.set_measured_speed(raw),
            TelemetryField::Current => self.set_current(field.scale(raw)),
            TelemetryField::Temperature => self.set_temperature(field.scale(raw)),
            TelemetryField::Voltage => self.set_voltage(field.scale(raw)),
        }
    }

    /// Field-by-field copy; see the module note on consistency
    pub fn snapshot(&self) -> MotorTelemetry {
        MotorTelemetry {
            id: self.id,
            target_speed: self.target_speed(),
            measured_speed: self.measured_speed(),
            current: self.current(),
            voltage: self.voltage(),
            temperature: self.temperature(),
            is_enabled: self.is_enabled(),
            keep_enabled: self.keep_enabled(),
            has_alarm: self.has_alarm(),
            alarm_code: self.alarm_code(),
            alarm: self.alarm_description().into_owned(),
        }
    }
}

/// Motors `1..=N`, indexed by id
#[derive(Debug)]
pub struct MotorStore {
    motors: Vec<MotorState>,
}

impl MotorStore {
    pub fn new(count: u8) -> Self {
        Self {
            motors: (1..=count).map(MotorState::new).collect(),
        }
    }

    pub fn get(&self, id: u8) -> Option<&MotorState> {
        let index = usize::from(id).checked_sub(1)?;
        self.motors.get(index)
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    /// Motors in round-robin (ascending id) order
    pub fn iter(&self) -> impl Iterator<Item = &MotorState> {
        self.motors.iter()
    }

    pub fn ids(&self) -> Vec<u8> {
        self.motors.iter().map(MotorState::id).collect()
    }

    pub fn snapshot(&self) -> Vec<MotorTelemetry> {
        self.motors.iter().map(MotorState::snapshot).collect()
    }

    /// Apply a parsed reply. Returns false when the id is not ours.
    pub fn apply_frame(&self, frame: &TelemetryFrame) -> bool {
        let Some(motor) = self.get(frame.id) else {
            warn!("Reply from unknown motor {}, ignoring", frame.id);
            return false;
        };

        motor.set_enabled(frame.is_enabled);
        motor.set_has_alarm(frame.has_alarm);

        for cmd in &frame.commands {
            match TelemetryField::from_index(cmd.index) {
                Some(field) => motor.apply_telemetry(field, cmd.value),
                None => debug!(
                    "Motor {}: ignoring register {} = {}",
                    frame.id, cmd.index, cmd.value
                ),
            }
        }
        true
    }
}
