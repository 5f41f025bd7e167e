// src/session.rs - Roast session orchestration
use thiserror::Error;
use uuid::Uuid;

use crate::clock::SessionClock;
use crate::config::Config;
use crate::control::{ControlInputs, Controller, PowerLevel};
use crate::dmm;
use crate::hardware::{HardwareError, MeterReader, PowerPort, ProbePort};
use crate::history::{TemperatureHistory, TemperatureLog};
use crate::probe;
use crate::profile::{ProfileCurve, resolve_target};
use crate::sim::ThermalSimulator;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("profile error: {0}")]
    Profile(#[from] crate::profile::ProfileError),
    #[error("invalid session state: {0}")]
    State(&'static str),
}

/// Session lifecycle. Stopped is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Resetting,
    Stopped,
}

/// One reading drained from a source this tick.
enum Reading {
    Single(f64),
    Pair(f64, f64),
}

/// Point-in-time view of the session for external collaborators.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub id: Uuid,
    pub state: SessionState,
    pub elapsed_minutes: f64,
    pub current_temp: Option<f64>,
    pub max_temp: f64,
    pub rate_of_change: f64,
    pub target: f64,
    pub power: PowerLevel,
}

/// Owner of everything one roast touches: clock, smoothing window, time
/// series, controller state, simulator and hardware handles. All of it
/// resets atomically and none of it is shared — the tick handler is the
/// only writer.
pub struct RoastSession {
    id: Uuid,
    config: Config,
    clock: SessionClock,
    state: SessionState,
    history: TemperatureHistory,
    log: TemperatureLog,
    controller: Controller,
    profile: Option<ProfileCurve>,
    simulator: Option<ThermalSimulator>,
    meter: Option<MeterReader>,
    probe_port: Option<ProbePort>,
    power_port: Option<PowerPort>,
    max_temperature: f64,
}

impl RoastSession {
    pub fn new(config: Config, profile: Option<ProfileCurve>) -> Self {
        let simulator = config.source.simulate.then(|| {
            ThermalSimulator::new(
                config.simulator.thermal_model(),
                config.simulator.cells,
                config.simulator.base_temp,
            )
        });
        let controller = Controller::new(config.control.algorithm, config.control.gains());
        let history = TemperatureHistory::new(config.roaster.smoothing_window);
        let clock = SessionClock::new(config.roaster.time_speedup);
        Self {
            id: Uuid::new_v4(),
            config,
            clock,
            state: SessionState::Idle,
            history,
            log: TemperatureLog::new(),
            controller,
            profile,
            simulator,
            meter: None,
            probe_port: None,
            power_port: None,
            max_temperature: 0.0,
        }
    }

    /// Open the configured external collaborators. Skipped entirely in
    /// simulation mode.
    pub fn connect_hardware(&mut self) -> Result<(), SessionError> {
        if self.config.source.simulate {
            return Ok(());
        }
        if self.config.source.use_dmm {
            self.meter = Some(MeterReader::spawn(&self.config.source.dmm_reader)?);
        }
        if let Some(path) = self.config.source.probe_port.clone() {
            self.probe_port = Some(ProbePort::open(&path)?);
        }
        if let Some(path) = self.config.power.port.clone() {
            self.power_port = Some(PowerPort::open(&path)?);
        }
        Ok(())
    }

    /// Idle -> Running. The clock starts counting here.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::State("start requires an idle session"));
        }
        self.clock.restart();
        self.state = SessionState::Running;
        tracing::info!(id = %self.id, "roast session started");
        Ok(())
    }

    /// One heartbeat: drain readings, update the temperature pipeline,
    /// run the controller, transmit power. No-op unless Running.
    pub async fn tick(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Ok(());
        }
        let elapsed_minutes = self.clock.elapsed_minutes();
        let elapsed_seconds = self.clock.elapsed_seconds();
        let power = self.run_tick(elapsed_minutes, elapsed_seconds);
        if let Some(port) = &self.power_port {
            // A gone transport is a collaborator problem, not a loop
            // failure; readings must keep flowing.
            if let Err(e) = port.send(power).await {
                tracing::warn!("power transmit failed: {e}");
            }
        }
        Ok(())
    }

    /// The synchronous per-tick pipeline, time passed in explicitly so
    /// tests can drive it deterministically.
    fn run_tick(&mut self, elapsed_minutes: f64, elapsed_seconds: f64) -> PowerLevel {
        for reading in self.drain_readings(elapsed_seconds) {
            match reading {
                Reading::Single(sample) => self.history.observe(sample),
                Reading::Pair(first, second) => self.history.observe_pair(first, second),
            }
        }

        if let Some(current) = self.history.current() {
            if current != 0.0 {
                self.log.push(elapsed_minutes, current);
            }
            if current > self.max_temperature {
                self.max_temperature = current;
            }
        }

        let inputs = ControlInputs {
            current_temp: self.history.current().unwrap_or(0.0),
            target: resolve_target(
                elapsed_minutes,
                self.config.control.setpoint,
                self.profile.as_ref(),
            ),
            rate_of_change: self.log.rate_of_change(),
            elapsed_minutes,
            manual_power: self.config.power.manual_level,
            auto_enabled: self.config.power.auto,
        };
        let previous = self.controller.power();
        let power = self.controller.tick(&inputs);
        if power != previous {
            tracing::info!(at = %crate::clock::format_minutes(elapsed_minutes), "power => {power}");
        }
        power
    }

    /// Pull zero or more readings from whichever source is live, never
    /// blocking. Malformed inputs are logged and skipped.
    fn drain_readings(&mut self, elapsed_seconds: f64) -> Vec<Reading> {
        let mut readings = Vec::new();

        if let Some(sim) = &mut self.simulator {
            let power = f64::from(self.controller.power().percent());
            if let Some(sample) = sim.step(elapsed_seconds, power) {
                readings.push(Reading::Single(sample));
            }
            return readings;
        }

        if let Some(meter) = &mut self.meter {
            while let Some(line) = meter.try_next_line() {
                match dmm::decode_frame(&line) {
                    Ok(sample) => readings.push(Reading::Single(sample)),
                    Err(e) => tracing::warn!(%line, "discarded meter reading: {e}"),
                }
            }
        }

        if let Some(port) = &mut self.probe_port {
            while let Some(line) = port.try_next_line() {
                match probe::parse_line(&line) {
                    Ok(reading) => {
                        tracing::debug!(
                            ambient = reading.ambient,
                            first = reading.first,
                            second = reading.second,
                            "probe reading"
                        );
                        readings.push(Reading::Pair(reading.first, reading.second));
                    }
                    Err(e) => tracing::warn!(%line, "discarded probe line: {e}"),
                }
            }
        }

        readings
    }

    /// Running -> Resetting -> Running: clear the window, the time
    /// series, controller state and, when simulating, the simulator,
    /// then restart the clock. One atomic operation from the outside.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::State("reset requires a running session"));
        }
        self.state = SessionState::Resetting;
        self.clock.restart();
        self.history.clear();
        self.log.clear();
        self.controller.reset();
        if let Some(sim) = &mut self.simulator {
            sim.reset();
        }
        self.max_temperature = 0.0;
        self.state = SessionState::Running;
        tracing::info!(id = %self.id, "roast session reset");
        Ok(())
    }

    /// Graceful stop: drive power to zero, disarm the controller,
    /// terminate the meter reader. Terminal.
    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        self.state = SessionState::Stopped;
        if let Some(port) = &self.power_port {
            if let Err(e) = port.shutdown().await {
                tracing::warn!("power controller shutdown failed: {e}");
            }
        }
        if let Some(meter) = &mut self.meter {
            meter.terminate();
        }
        tracing::info!(id = %self.id, "roast session stopped");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        let elapsed_minutes = self.clock.elapsed_minutes();
        SessionStatus {
            id: self.id,
            state: self.state,
            elapsed_minutes,
            current_temp: self.history.current(),
            max_temp: self.max_temperature,
            rate_of_change: self.log.rate_of_change(),
            target: resolve_target(
                elapsed_minutes,
                self.config.control.setpoint,
                self.profile.as_ref(),
            ),
            power: self.controller.power(),
        }
    }
}
