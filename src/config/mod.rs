// src/config/mod.rs - Roaster host configuration
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{Algorithm, PidGains};
use crate::sim::ThermalModel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration, loaded from TOML with every section optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub roaster: RoasterConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub power: PowerConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// General loop parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoasterConfig {
    /// Smoothing window size for the current-temperature estimate.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Heartbeat period, seconds of wall clock before speedup.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,

    /// Virtual-time multiplier; above 1 runs the session faster than
    /// wall clock for testing.
    #[serde(default = "default_time_speedup")]
    pub time_speedup: f64,

    /// Display bound, minutes. Not enforced on control logic.
    #[serde(default = "default_max_time")]
    pub max_time: f64,

    /// Display bound, degrees C. Not enforced on control logic.
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
}

/// Where temperature readings come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Replace all physical sources with the thermal simulator.
    #[serde(default)]
    pub simulate: bool,

    /// Run the external meter reader child.
    #[serde(default = "default_use_dmm")]
    pub use_dmm: bool,

    /// Command for the meter reader child process.
    #[serde(default = "default_dmm_reader")]
    pub dmm_reader: String,

    /// Serial device of the secondary dual-thermocouple probe.
    #[serde(default)]
    pub probe_port: Option<String>,
}

/// Heater power output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerConfig {
    /// Serial device of the power controller; absent means dry run.
    #[serde(default)]
    pub port: Option<String>,

    /// Automatic control. False hands power to `manual_level`.
    #[serde(default = "default_auto")]
    pub auto: bool,

    /// Operator power level, percent, used when `auto` is false.
    #[serde(default)]
    pub manual_level: u8,
}

/// Controller selection and tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Manual target temperature; 0 follows the loaded profile.
    #[serde(default)]
    pub setpoint: f64,

    /// Profile CSV to follow when no setpoint is given.
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default = "default_kp")]
    pub kp: f64,

    #[serde(default = "default_ki")]
    pub ki: f64,

    #[serde(default = "default_kd")]
    pub kd: f64,
}

impl ControlConfig {
    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }
}

/// Thermal model preset selection. Two calibration sets exist with
/// undocumented provenance; the choice is always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPreset {
    #[default]
    Calibrated,
    Legacy,
}

/// Simulator parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_cells")]
    pub cells: usize,

    #[serde(default = "default_base_temp")]
    pub base_temp: f64,

    #[serde(default)]
    pub model: ModelPreset,

    /// Explicit coefficient overrides on top of the preset.
    #[serde(default)]
    pub heater_coupling: Option<f64>,

    #[serde(default)]
    pub ambient_loss: Option<f64>,
}

impl SimulatorConfig {
    pub fn thermal_model(&self) -> ThermalModel {
        let mut model = match self.model {
            ModelPreset::Calibrated => ThermalModel::CALIBRATED,
            ModelPreset::Legacy => ThermalModel::LEGACY,
        };
        if let Some(r) = self.heater_coupling {
            model.heater_coupling = r;
        }
        if let Some(k) = self.ambient_loss {
            model.ambient_loss = k;
        }
        model
    }
}

// Default value functions
fn default_smoothing_window() -> usize {
    crate::history::DEFAULT_WINDOW
}
fn default_tick_interval() -> f64 {
    0.25
}
fn default_time_speedup() -> f64 {
    1.0
}
fn default_max_time() -> f64 {
    30.0
}
fn default_max_temp() -> f64 {
    300.0
}
fn default_use_dmm() -> bool {
    true
}
fn default_dmm_reader() -> String {
    "./RawMeterReader".to_string()
}
fn default_auto() -> bool {
    true
}
fn default_kp() -> f64 {
    0.5
}
fn default_ki() -> f64 {
    2.0
}
fn default_kd() -> f64 {
    0.8
}
fn default_cells() -> usize {
    crate::sim::DEFAULT_CELLS
}
fn default_base_temp() -> f64 {
    crate::sim::DEFAULT_BASE_TEMP
}

impl Default for RoasterConfig {
    fn default() -> Self {
        Self {
            smoothing_window: default_smoothing_window(),
            tick_interval: default_tick_interval(),
            time_speedup: default_time_speedup(),
            max_time: default_max_time(),
            max_temp: default_max_temp(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            use_dmm: default_use_dmm(),
            dmm_reader: default_dmm_reader(),
            probe_port: None,
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            port: None,
            auto: default_auto(),
            manual_level: 0,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            setpoint: 0.0,
            profile: None,
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            cells: default_cells(),
            base_temp: default_base_temp(),
            model: ModelPreset::default(),
            heater_coupling: None,
            ambient_loss: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!(path, "loaded configuration");
        Ok(config)
    }

    /// Heartbeat period after applying the time speedup.
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.roaster.tick_interval / self.roaster.time_speedup)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roaster.smoothing_window == 0 {
            return Err(ConfigError::Invalid(
                "smoothing_window must be at least 1".into(),
            ));
        }
        if self.roaster.tick_interval <= 0.0 {
            return Err(ConfigError::Invalid("tick_interval must be positive".into()));
        }
        if self.roaster.time_speedup <= 0.0 {
            return Err(ConfigError::Invalid("time_speedup must be positive".into()));
        }
        if self.power.manual_level > 100 {
            return Err(ConfigError::Invalid(
                "manual_level must be at most 100".into(),
            ));
        }
        if self.simulator.cells < 2 {
            return Err(ConfigError::Invalid(
                "simulator needs at least 2 cells".into(),
            ));
        }
        for (name, gain) in [
            ("kp", self.control.kp),
            ("ki", self.control.ki),
            ("kd", self.control.kd),
        ] {
            if !gain.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite")));
            }
        }
        let model = self.simulator.thermal_model();
        if model.heater_coupling <= 0.0 || model.ambient_loss <= 0.0 {
            return Err(ConfigError::Invalid(
                "thermal model coefficients must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.roaster.smoothing_window, 5);
        assert_eq!(config.roaster.tick_interval, 0.25);
        assert_eq!(config.roaster.max_time, 30.0);
        assert_eq!(config.roaster.max_temp, 300.0);
        assert!(config.power.auto);
        assert_eq!(config.control.algorithm, Algorithm::Predictive);
        assert_eq!(config.simulator.cells, 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_config = r#"
[roaster]
smoothing_window = 8
time_speedup = 10.0

[source]
simulate = true

[control]
algorithm = "pid"
setpoint = 225.0
kp = 0.6

[simulator]
model = "legacy"
cells = 20
"#;
        let config: Config = toml::from_str(toml_config).unwrap();
        assert_eq!(config.roaster.smoothing_window, 8);
        assert!(config.source.simulate);
        assert_eq!(config.control.algorithm, Algorithm::Pid);
        assert_eq!(config.control.setpoint, 225.0);
        assert_eq!(config.control.kp, 0.6);
        // Unspecified gains keep the tuned defaults.
        assert_eq!(config.control.ki, 2.0);
        assert_eq!(config.simulator.model, ModelPreset::Legacy);
        assert_eq!(config.simulator.thermal_model(), ThermalModel::LEGACY);
    }

    #[test]
    fn test_model_overrides_apply_on_top_of_preset() {
        let config: Config = toml::from_str(
            r#"
[simulator]
model = "calibrated"
ambient_loss = 0.008
"#,
        )
        .unwrap();
        let model = config.simulator.thermal_model();
        assert_eq!(model.heater_coupling, ThermalModel::CALIBRATED.heater_coupling);
        assert_eq!(model.ambient_loss, 0.008);
    }

    #[test]
    fn test_tick_period_respects_speedup() {
        let mut config = Config::default();
        config.roaster.tick_interval = 0.25;
        config.roaster.time_speedup = 5.0;
        assert_eq!(config.tick_period(), std::time::Duration::from_millis(50));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.roaster.smoothing_window = 0;
        assert!(config.validate().is_err());
        config.roaster.smoothing_window = 5;

        config.power.manual_level = 101;
        assert!(config.validate().is_err());
        config.power.manual_level = 50;

        config.simulator.ambient_loss = Some(0.0);
        assert!(config.validate().is_err());
    }
}
