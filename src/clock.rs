// src/clock.rs - Virtualized session time
use std::time::Instant;

/// Session clock with a speedup multiplier.
///
/// Elapsed time is scaled by the multiplier so controller and simulator
/// behavior can be exercised faster than wall clock. Components never read
/// the clock themselves; they take elapsed time as a parameter, and only
/// the session tick handler queries it.
#[derive(Debug, Clone)]
pub struct SessionClock {
    started: Instant,
    speedup: f64,
}

impl SessionClock {
    pub fn new(speedup: f64) -> Self {
        Self {
            started: Instant::now(),
            speedup,
        }
    }

    /// Virtual elapsed seconds since start/restart.
    pub fn elapsed_seconds(&self) -> f64 {
        self.speedup * self.started.elapsed().as_secs_f64()
    }

    /// Virtual elapsed minutes since start/restart.
    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed_seconds() / 60.0
    }

    /// Restart the clock. Called on session reset.
    pub fn restart(&mut self) {
        self.started = Instant::now();
    }

    pub fn speedup(&self) -> f64 {
        self.speedup
    }

    /// Render virtual elapsed time as mm:ss for log messages.
    pub fn timestring(&self) -> String {
        format_minutes(self.elapsed_minutes())
    }
}

/// mm:ss rendering of a minutes value.
pub fn format_minutes(minutes: f64) -> String {
    let whole = minutes.floor();
    let seconds = (minutes - whole) * 60.0;
    format!("{:02}:{:02.0}", whole as u64, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0.0), "00:00");
        assert_eq!(format_minutes(1.5), "01:30");
        assert_eq!(format_minutes(12.25), "12:15");
    }

    #[test]
    fn test_speedup_scales_elapsed() {
        let fast = SessionClock::new(60.0);
        let real = SessionClock::new(1.0);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(fast.elapsed_seconds() > real.elapsed_seconds());
        assert!(fast.elapsed_seconds() >= 60.0 * 0.02 * 0.9);
    }

    #[test]
    fn test_restart_rewinds() {
        let mut clock = SessionClock::new(1000.0);
        std::thread::sleep(std::time::Duration::from_millis(10));
        let before = clock.elapsed_seconds();
        clock.restart();
        assert!(clock.elapsed_seconds() < before);
    }
}
