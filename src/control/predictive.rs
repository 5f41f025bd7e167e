// src/control/predictive.rs - Heuristic predictive power control
use super::{ControlInputs, POWER_UPDATE_INTERVAL_MINUTES, PowerLevel};

/// Look-ahead horizon, minutes. The error is discounted by the trend over
/// this horizon before it nudges the power level.
const LOOKAHEAD_MINUTES: f64 = 2.0;

/// Fraction of the predicted error applied to the power per update.
const ERROR_GAIN: f64 = 1.0 / 60.0;

/// Heuristic predictive controller: discount the temperature error by a
/// short linear extrapolation of the trend, then apply a fraction of it
/// as a power increment. The tracked power is continuous; only the
/// reported level is an integer percent.
#[derive(Debug, Clone, Default)]
pub struct PredictivePower {
    power: f64,
    last_update: f64,
}

impl PredictivePower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(&self) -> PowerLevel {
        PowerLevel::from_f64(self.power)
    }

    pub fn tick(&mut self, inputs: &ControlInputs) -> PowerLevel {
        let dt = inputs.elapsed_minutes - self.last_update;
        if dt < POWER_UPDATE_INTERVAL_MINUTES {
            return self.power();
        }

        let error = inputs.target - inputs.current_temp;
        let predicted_error = error - LOOKAHEAD_MINUTES * inputs.rate_of_change;
        let mut power = (self.power + predicted_error * ERROR_GAIN).clamp(0.0, 100.0);

        if !inputs.auto_enabled {
            power = f64::from(inputs.manual_power.min(100));
        }

        self.last_update = inputs.elapsed_minutes;
        self.power = power;
        self.power()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
