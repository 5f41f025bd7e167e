// src/control/mod.rs - Heater power control
pub mod pid;
pub mod predictive;

use serde::{Deserialize, Serialize};

pub use pid::{PidControl, PidGains};
pub use predictive::PredictivePower;

/// Minimum virtual time between power recomputations. Calls inside the
/// window are no-ops returning the previous power unchanged; this also
/// keeps every controller division away from near-zero time deltas.
pub const POWER_UPDATE_INTERVAL_MINUTES: f64 = 2.0 / 60.0;

/// Highest value ever written to the power controller. 100% is unreliable
/// on the hardware, so transmitted values are capped one percent short;
/// the internally tracked level is not.
pub const TRANSMIT_CAP_PERCENT: u8 = 99;

/// Heater power as an integer percentage, clamped to 0..=100 at every
/// observable boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PowerLevel(u8);

impl PowerLevel {
    pub fn from_f64(power: f64) -> Self {
        Self(power.clamp(0.0, 100.0) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// The value actually written to the hardware.
    pub fn for_transmit(self) -> u8 {
        self.0.min(TRANSMIT_CAP_PERCENT)
    }
}

impl std::fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Everything a controller sees on one tick. Explicit context instead of
/// ambient shared state.
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs {
    /// Smoothed current temperature, degrees C (0 when unknown).
    pub current_temp: f64,
    /// Resolved target temperature, degrees C.
    pub target: f64,
    /// Estimated temperature trend, degrees C per minute.
    pub rate_of_change: f64,
    /// Virtual elapsed session time, minutes.
    pub elapsed_minutes: f64,
    /// Operator power level, used when `auto_enabled` is false.
    pub manual_power: u8,
    /// Automatic control flag; false hands power to the operator.
    pub auto_enabled: bool,
}

/// Controller algorithm selection, fixed at session configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Predictive,
    Pid,
}

/// The active control algorithm and its state. Exactly one variant is
/// live per session; their internal state is never shared.
#[derive(Debug, Clone)]
pub enum Controller {
    Predictive(PredictivePower),
    Pid(PidControl),
}

impl Controller {
    pub fn new(algorithm: Algorithm, gains: PidGains) -> Self {
        match algorithm {
            Algorithm::Predictive => Self::Predictive(PredictivePower::new()),
            Algorithm::Pid => Self::Pid(PidControl::new(gains)),
        }
    }

    /// Compute the heater power for this tick. Rate-limited internally;
    /// inside the limit window the previous power is returned unchanged.
    pub fn tick(&mut self, inputs: &ControlInputs) -> PowerLevel {
        match self {
            Self::Predictive(c) => c.tick(inputs),
            Self::Pid(c) => c.tick(inputs),
        }
    }

    /// The most recently computed power level.
    pub fn power(&self) -> PowerLevel {
        match self {
            Self::Predictive(c) => c.power(),
            Self::Pid(c) => c.power(),
        }
    }

    /// Clear all controller state for a session reset.
    pub fn reset(&mut self) {
        match self {
            Self::Predictive(c) => c.reset(),
            Self::Pid(c) => c.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(elapsed_minutes: f64) -> ControlInputs {
        ControlInputs {
            current_temp: 100.0,
            target: 150.0,
            rate_of_change: 0.0,
            elapsed_minutes,
            manual_power: 0,
            auto_enabled: true,
        }
    }

    #[test]
    fn test_power_level_clamps() {
        assert_eq!(PowerLevel::from_f64(-10.0).percent(), 0);
        assert_eq!(PowerLevel::from_f64(0.0).percent(), 0);
        assert_eq!(PowerLevel::from_f64(54.9).percent(), 54);
        assert_eq!(PowerLevel::from_f64(250.0).percent(), 100);
    }

    #[test]
    fn test_transmit_cap() {
        assert_eq!(PowerLevel::from_f64(100.0).for_transmit(), 99);
        assert_eq!(PowerLevel::from_f64(99.0).for_transmit(), 99);
        assert_eq!(PowerLevel::from_f64(42.0).for_transmit(), 42);
    }

    #[test]
    fn test_tick_idempotent_inside_rate_limit_window() {
        for algorithm in [Algorithm::Predictive, Algorithm::Pid] {
            let mut controller = Controller::new(algorithm, PidGains::default());
            let first = controller.tick(&inputs(5.0));
            // One second later: inside the 2 s window, a no-op.
            let second = controller.tick(&inputs(5.0 + 1.0 / 60.0));
            assert_eq!(first, second, "{algorithm:?}");
            assert_eq!(controller.power(), first, "{algorithm:?}");
        }
    }

    #[test]
    fn test_output_always_clamped() {
        for algorithm in [Algorithm::Predictive, Algorithm::Pid] {
            let mut controller = Controller::new(algorithm, PidGains::default());
            let mut elapsed = 1.0;
            for (target, current) in [(10_000.0, 0.0), (-10_000.0, 500.0), (150.0, 100.0)] {
                elapsed += 1.0;
                let power = controller.tick(&ControlInputs {
                    current_temp: current,
                    target,
                    rate_of_change: 0.0,
                    elapsed_minutes: elapsed,
                    manual_power: 0,
                    auto_enabled: true,
                });
                assert!(power.percent() <= 100, "{algorithm:?}");
            }
        }
    }

    #[test]
    fn test_manual_override_bypasses_algorithm() {
        for algorithm in [Algorithm::Predictive, Algorithm::Pid] {
            let mut controller = Controller::new(algorithm, PidGains::default());
            let power = controller.tick(&ControlInputs {
                manual_power: 37,
                auto_enabled: false,
                ..inputs(5.0)
            });
            assert_eq!(power.percent(), 37, "{algorithm:?}");
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut controller = Controller::new(Algorithm::Pid, PidGains::default());
        controller.tick(&inputs(5.0));
        assert!(controller.power().percent() > 0);
        controller.reset();
        assert_eq!(controller.power().percent(), 0);
        // After reset the clock restarts too; an early tick is rate-limited.
        let power = controller.tick(&inputs(1.0 / 60.0));
        assert_eq!(power.percent(), 0);
    }
}
