// Thruster runtime: drives the bus in the background and reports telemetry
// as JSON log lines until Ctrl-C

use std::time::Duration;

use clap::Parser;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{DEFAULT_BAUDRATE, DEFAULT_PORT, REPORT_HZ};
use crate::messages::TelemetryReport;
use crate::thruster::{SerialTransport, ThrusterDriver};

#[derive(Debug, Clone, Parser)]
#[command(about = "Drive smart thrusters on a shared serial bus")]
pub struct RuntimeArgs {
    /// Serial port of the breakout board
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// Number of motors (ids 1..=N)
    #[arg(long, short = 'n', default_value_t = 4)]
    pub motors: u8,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baudrate: u32,

    /// Reply read timeout in milliseconds
    #[arg(long, default_value_t = 1)]
    pub timeout_ms: u64,

    /// Initial setpoints as ID=RPM, repeatable
    #[arg(long = "target", value_parser = parse_target)]
    pub targets: Vec<(u8, i32)>,

    /// Motor ids kept powered at zero speed
    #[arg(long = "keep-enabled")]
    pub keep_enabled: Vec<u8>,

    /// Telemetry reports per second (1..=1000)
    #[arg(long, default_value_t = REPORT_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub report_hz: u64,

    /// Request an alarm reset whenever a motor reports an alarm
    #[arg(long)]
    pub auto_reset_alarms: bool,
}

fn parse_target(s: &str) -> Result<(u8, i32), String> {
    let (id, rpm) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=RPM, got '{}'", s))?;
    let id = id
        .trim()
        .parse()
        .map_err(|e| format!("bad motor id '{}': {}", id, e))?;
    let rpm = rpm
        .trim()
        .parse()
        .map_err(|e| format!("bad rpm '{}': {}", rpm, e))?;
    Ok((id, rpm))
}

// Period between reports; the argument parser keeps `hz` within 1..=1000
fn report_period(hz: u64) -> Duration {
    Duration::from_millis(1000 / hz.clamp(1, 1000))
}

pub async fn run(args: RuntimeArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let transport = SerialTransport::open_with(
        &args.port,
        args.baudrate,
        Duration::from_millis(args.timeout_ms),
    )?;
    let mut driver = ThrusterDriver::start(args.motors, transport)?;

    for &(id, rpm) in &args.targets {
        info!("Motor {} target {} rpm", id, rpm);
        driver.set_target_speed(id, rpm)?;
    }
    for &id in &args.keep_enabled {
        driver.set_keep_enabled(id, true)?;
    }

    let mut tick = interval(report_period(args.report_hz));
    info!(
        "Runtime started: {} motors on {}, reporting at {}Hz",
        args.motors, args.port, args.report_hz
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let report = TelemetryReport {
                    motors: driver.telemetry_all(),
                    bus: driver.metrics(),
                };

                if args.auto_reset_alarms {
                    for motor in report.motors.iter().filter(|m| m.has_alarm) {
                        warn!("Motor {} alarm: {}, resetting", motor.id, motor.alarm);
                        driver.request_alarm_reset(motor.id)?;
                    }
                }

                info!("{}", serde_json::to_string(&report)?);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    // Joining the poller blocks until the shutdown pass is on the wire
    tokio::task::spawn_blocking(move || driver.stop()).await??;
    Ok(())
}
