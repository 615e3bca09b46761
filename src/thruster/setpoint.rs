// Speed setpoint shaping: direction, clamp, deadband and enable

use crate::config::{MAX_SPEED, MIN_SPEED};

/// The three control register values sent to a driver each round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSetpoint {
    /// +1 or -1
    pub direction: i32,
    /// 0 or within `MIN_SPEED..=MAX_SPEED`
    pub magnitude: u32,
    pub enable: bool,
}

impl SpeedSetpoint {
    /// Shape a caller target. Zero targets keep the positive direction.
    pub fn from_target(target: i32, keep_enabled: bool) -> Self {
        let direction = if target < 0 { -1 } else { 1 };
        let mut magnitude = target.unsigned_abs().min(MAX_SPEED);
        if magnitude < MIN_SPEED {
            magnitude = 0;
        }

        Self {
            direction,
            magnitude,
            enable: magnitude != 0 || keep_enabled,
        }
    }

    /// Zero speed, driver disabled
    pub fn stopped() -> Self {
        Self {
            direction: 1,
            magnitude: 0,
            enable: false,
        }
    }

    /// Signed effective speed
    pub fn signed(&self) -> i32 {
        // magnitude <= MAX_SPEED, always fits
        self.direction * self.magnitude as i32
    }
}

/// Effective signed speed the driver will be commanded for `target`
pub fn clamp_speed(target: i32) -> i32 {
    SpeedSetpoint::from_target(target, false).signed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_limits() {
        assert_eq!(clamp_speed(250), 0);
        assert_eq!(clamp_speed(-250), 0);
        assert_eq!(clamp_speed(300), 300);
        assert_eq!(clamp_speed(5600), 5500);
        assert_eq!(clamp_speed(-6000), -5500);
        assert_eq!(clamp_speed(i32::MIN), -5500);
    }

    #[test]
    fn test_enable_rules() {
        let sp = SpeedSetpoint::from_target(0, false);
        assert_eq!(sp.direction, 1);
        assert!(!sp.enable);

        let sp = SpeedSetpoint::from_target(100, true);
        assert_eq!(sp.magnitude, 0);
        assert!(sp.enable);

        let sp = SpeedSetpoint::from_target(-1000, false);
        assert_eq!((sp.direction, sp.magnitude, sp.enable), (-1, 1000, true));

        assert_eq!(SpeedSetpoint::stopped().signed(), 0);
    }

    proptest! {
        #[test]
        fn clamp_is_idempotent(v in any::<i32>()) {
            let once = clamp_speed(v);
            prop_assert_eq!(clamp_speed(once), once);
            prop_assert!(once.unsigned_abs() <= MAX_SPEED);
        }
    }
}
