//! End-to-end polling scenarios against a scripted bus

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use smart_thruster::config::PollConfig;
use smart_thruster::thruster::{
    BusMetrics, MotorStore, OutboundFrame, Poller, PollerState, Register, RegisterCommand,
    TelemetryFrame, ThrusterDriver, Transport,
};

/// Records every written frame and answers reads from a queue of replies.
/// Clones share the same bus so tests can inspect it while a driver owns it.
#[derive(Clone, Default)]
struct ScriptedTransport {
    bus: Arc<Mutex<ScriptedBus>>,
}

#[derive(Default)]
struct ScriptedBus {
    written: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
}

impl ScriptedTransport {
    fn queue_reply(&self, raw: Vec<u8>) {
        self.bus.lock().unwrap().replies.push_back(raw);
    }

    fn frames(&self) -> Vec<OutboundFrame> {
        self.bus
            .lock()
            .unwrap()
            .written
            .iter()
            .map(|raw| OutboundFrame::parse(raw).expect("host sent a malformed frame"))
            .collect()
    }

    fn clear(&self) {
        self.bus.lock().unwrap().written.clear();
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.bus.lock().unwrap().written.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut reply = self
            .bus
            .lock()
            .unwrap()
            .replies
            .pop_front()
            .unwrap_or_default();
        reply.truncate(max_bytes);
        Ok(reply)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    transport: ScriptedTransport,
    store: Arc<MotorStore>,
    metrics: Arc<BusMetrics>,
    poller: Poller<ScriptedTransport>,
}

fn harness(motors: u8) -> Harness {
    let transport = ScriptedTransport::default();
    let store = Arc::new(MotorStore::new(motors));
    let metrics = Arc::new(BusMetrics::new());
    let poller = Poller::new(
        transport.clone(),
        store.clone(),
        metrics.clone(),
        Arc::new(AtomicBool::new(true)),
        PollConfig {
            round_interval: Duration::ZERO,
            ..PollConfig::default()
        },
    );
    Harness {
        transport,
        store,
        metrics,
        poller,
    }
}

fn reading(register: Register, value: i32) -> RegisterCommand {
    RegisterCommand {
        index: register.index(),
        write: false,
        is_32bit: true,
        value,
    }
}

fn telemetry_reply(id: u8, has_alarm: bool, alarm_code: i32, rpm: i32) -> Vec<u8> {
    TelemetryFrame {
        id,
        has_alarm,
        is_enabled: true,
        commands: vec![
            reading(Register::AlarmCode, alarm_code),
            reading(Register::MeasuredSpeed, rpm),
            reading(Register::Current, 150),
            reading(Register::Temperature, 325),
            reading(Register::Voltage, 148),
        ],
    }
    .encode()
    .unwrap()
}

/// (register, value) pairs of every write the host sent to `id`
fn writes_to(frames: &[OutboundFrame], id: u8) -> Vec<(u16, i32)> {
    frames
        .iter()
        .filter(|f| f.id == id && !f.expects_reply)
        .flat_map(|f| f.commands.iter().map(|c| (c.index, c.value)))
        .collect()
}

#[test]
fn setpoints_are_shaped_per_motor() {
    let mut h = harness(2);
    h.store.get(1).unwrap().set_target_speed(400);
    h.store.get(2).unwrap().set_target_speed(-1000);

    h.poller.run_round();

    let frames = h.transport.frames();
    assert_eq!(
        writes_to(&frames, 1),
        vec![(2001, 1), (2002, 400), (2000, 1)]
    );
    assert_eq!(
        writes_to(&frames, 2),
        vec![(2001, -1), (2002, 1000), (2000, 1)]
    );

    // Each motor also gets the five-register telemetry request
    let reads: Vec<&OutboundFrame> = frames.iter().filter(|f| f.expects_reply).collect();
    assert_eq!(reads.len(), 2);
    let indices: Vec<u16> = reads[0].commands.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1700, 1107, 1116, 1123, 1124]);
}

#[test]
fn deadband_and_keep_enabled() {
    let mut h = harness(2);
    h.store.get(1).unwrap().set_target_speed(250);
    h.store.get(2).unwrap().set_target_speed(0);
    h.store.get(2).unwrap().set_keep_enabled(true);

    h.poller.run_round();

    let frames = h.transport.frames();
    assert_eq!(writes_to(&frames, 1), vec![(2001, 1), (2002, 0), (2000, 0)]);
    assert_eq!(writes_to(&frames, 2), vec![(2001, 1), (2002, 0), (2000, 1)]);
}

#[test]
fn alarm_reply_updates_state() {
    let mut h = harness(1);
    h.transport.queue_reply(telemetry_reply(1, true, 21, 1520));

    h.poller.run_round();

    let motor = h.store.get(1).unwrap();
    assert!(motor.has_alarm());
    assert!(motor.is_enabled());
    assert_eq!(motor.alarm_code(), 21);
    assert_eq!(motor.measured_speed(), 1520);
    assert_eq!(motor.current(), 1.5);
    assert_eq!(motor.temperature(), 32.5);
    assert_eq!(motor.voltage(), 14.8);
    assert!(
        motor.alarm_description().contains("Over current"),
        "{}",
        motor.alarm_description()
    );
    assert_eq!(h.metrics.snapshot().replies_applied, 1);
}

#[test]
fn alarm_reset_is_first_command_of_round() {
    let mut h = harness(2);
    h.store.get(1).unwrap().request_alarm_reset();
    h.store.get(1).unwrap().request_alarm_reset();

    h.poller.run_round();

    let frames = h.transport.frames();
    let first = &frames[0];
    assert_eq!(first.id, 1);
    assert!(!first.expects_reply);
    assert_eq!(first.commands.len(), 1);
    assert_eq!((first.commands[0].index, first.commands[0].value), (2032, 1));
    assert!(!h.store.get(1).unwrap().alarm_reset_requested());

    // Only one reset was sent, and none the next round
    h.transport.clear();
    h.poller.run_round();
    let resets = h
        .transport
        .frames()
        .iter()
        .flat_map(|f| f.commands.clone())
        .filter(|c| c.index == 2032)
        .count();
    assert_eq!(resets, 0);
}

#[test]
fn malformed_replies_leave_state_untouched() {
    let mut h = harness(1);
    h.transport.queue_reply(telemetry_reply(1, false, 0, 900));
    h.poller.run_round();
    assert_eq!(h.store.get(1).unwrap().measured_speed(), 900);

    // Corrupted checksum
    let mut bad = telemetry_reply(1, true, 21, 3000);
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    h.transport.queue_reply(bad);
    h.poller.run_round();

    // Truncated on the wire
    let short = telemetry_reply(1, true, 21, 3000);
    h.transport.queue_reply(short[..short.len() - 4].to_vec());
    h.poller.run_round();

    // Garbage
    h.transport.queue_reply(vec![0xFF]);
    h.poller.run_round();

    let motor = h.store.get(1).unwrap();
    assert_eq!(motor.measured_speed(), 900);
    assert!(!motor.has_alarm());
    assert_eq!(motor.alarm_code(), 0);

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.discarded_replies(), 3);
    assert_eq!(metrics.replies_applied, 1);
    assert_eq!(metrics.rounds, 4);
}

#[test]
fn silent_bus_counts_timeouts() {
    let mut h = harness(3);
    h.poller.run_round();
    h.poller.run_round();

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.timeouts, 6);
    assert_eq!(metrics.rounds, 2);
    assert_eq!(h.poller.state(), PollerState::Idle);
}

#[test]
fn unknown_registers_are_ignored() {
    let mut h = harness(1);
    let reply = TelemetryFrame {
        id: 1,
        has_alarm: false,
        is_enabled: true,
        commands: vec![
            reading(Register::MeasuredSpeed, 700),
            RegisterCommand {
                index: 4000,
                write: false,
                is_32bit: true,
                value: 12345,
            },
        ],
    }
    .encode()
    .unwrap();
    h.transport.queue_reply(reply);

    h.poller.run_round();

    assert_eq!(h.store.get(1).unwrap().measured_speed(), 700);
    assert_eq!(h.metrics.snapshot().replies_applied, 1);
}

#[test]
fn driver_start_and_shutdown_pass() {
    let transport = ScriptedTransport::default();
    let config = PollConfig {
        round_interval: Duration::from_millis(1),
        ..PollConfig::default()
    };
    let mut driver = ThrusterDriver::start_with_config(2, transport.clone(), config).unwrap();

    // Startup: zero speed then alarm reset, per motor
    let startup: Vec<(u8, Vec<u16>)> = transport.frames()[..4]
        .iter()
        .map(|f| (f.id, f.commands.iter().map(|c| c.index).collect()))
        .collect();
    assert_eq!(
        startup,
        vec![
            (1, vec![2001, 2002, 2000]),
            (1, vec![2032]),
            (2, vec![2001, 2002, 2000]),
            (2, vec![2032]),
        ]
    );

    driver.set_target_speed(1, 2000).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !writes_to(&transport.frames(), 1).contains(&(2002, 2000)) {
        assert!(Instant::now() < deadline, "setpoint never reached the bus");
        std::thread::sleep(Duration::from_millis(1));
    }

    driver.stop().unwrap();
    assert_eq!(driver.poller_state(), PollerState::Stopped);
    assert!(driver.metrics().rounds >= 1);

    // The last frame for each motor disables it at zero speed
    let frames = transport.frames();
    let tail: Vec<(u8, Vec<(u16, i32)>)> = frames[frames.len() - 2..]
        .iter()
        .map(|f| (f.id, f.commands.iter().map(|c| (c.index, c.value)).collect()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (1, vec![(2001, 1), (2002, 0), (2000, 0)]),
            (2, vec![(2001, 1), (2002, 0), (2000, 0)]),
        ]
    );
}
