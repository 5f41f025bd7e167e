// src/control/pid.rs - PID power control with integral decay
use serde::{Deserialize, Serialize};

use super::{ControlInputs, POWER_UPDATE_INTERVAL_MINUTES, PowerLevel};

/// The integral term decays toward 10% of itself over one minute,
/// independent of the tick rate: factor = exp(dt * ln 0.1).
const INTEGRAL_DECAY_TARGET: f64 = 0.1;

/// PID gains, carried over unmodified from the empirically-tuned baseline.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 2.0,
            kd: 0.8,
        }
    }
}

/// Classic PID over the temperature error, with two twists: the output is
/// a power *increment* (50% output means "hold the current temperature"),
/// and the integral term decays on every update to bound windup.
#[derive(Debug, Clone)]
pub struct PidControl {
    gains: PidGains,
    integral: f64,
    previous_error: f64,
    last_update: f64,
    power: f64,
}

impl PidControl {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            previous_error: 0.0,
            last_update: 0.0,
            power: 0.0,
        }
    }

    pub fn power(&self) -> PowerLevel {
        PowerLevel::from_f64(self.power)
    }

    #[cfg(test)]
    pub(crate) fn integral(&self) -> f64 {
        self.integral
    }

    pub fn tick(&mut self, inputs: &ControlInputs) -> PowerLevel {
        let dt = inputs.elapsed_minutes - self.last_update;
        if dt < POWER_UPDATE_INTERVAL_MINUTES {
            return self.power();
        }

        let error = inputs.target - inputs.current_temp;
        self.integral += error * dt;
        let derivative = (error - self.previous_error) / dt;
        let output = self.gains.kp * error
            + self.gains.ki * self.integral
            + self.gains.kd * derivative;
        self.previous_error = error;
        self.last_update = inputs.elapsed_minutes;

        self.integral *= (dt * INTEGRAL_DECAY_TARGET.ln()).exp();

        // The baseline tuning tracks whole percent levels.
        let mut power = (output + self.power).trunc().clamp(0.0, 100.0);

        if inputs.auto_enabled {
            tracing::debug!(
                current = inputs.current_temp,
                target = inputs.target,
                output,
                power,
                "PID output"
            );
        } else {
            power = f64::from(inputs.manual_power.min(100));
        }

        self.power = power;
        self.power()
    }

    pub fn reset(&mut self) {
        let gains = self.gains;
        *self = Self::new(gains);
    }
}
