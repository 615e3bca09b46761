// Message types emitted by the runtime

use serde::{Deserialize, Serialize};

use crate::thruster::MetricsSnapshot;

// Point-in-time copy of one motor's state
// Fields are read one by one, so they are not guaranteed to come from the same reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorTelemetry {
    pub id: u8,
    pub target_speed: i32,
    pub measured_speed: i32,
    pub current: f32,     // A
    pub voltage: f32,     // V
    pub temperature: f32, // degC
    pub is_enabled: bool,
    pub keep_enabled: bool,
    pub has_alarm: bool,
    pub alarm_code: i32,
    pub alarm: String,
}

/// Periodic report published by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub motors: Vec<MotorTelemetry>,
    pub bus: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json() {
        let report = TelemetryReport {
            motors: vec![MotorTelemetry {
                id: 1,
                target_speed: 400,
                measured_speed: 398,
                current: 1.25,
                voltage: 16.0,
                temperature: 30.5,
                is_enabled: true,
                keep_enabled: false,
                has_alarm: false,
                alarm_code: 0,
                alarm: "No alarm".to_string(),
            }],
            bus: MetricsSnapshot::default(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"measured_speed\":398"), "{}", json);
        let back: TelemetryReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
