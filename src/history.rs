// src/history.rs - Temperature smoothing window and trend estimation
use std::collections::VecDeque;

/// Default smoothing window size; operator-configurable via `--smooth`.
pub const DEFAULT_WINDOW: usize = 5;

/// Minimum series length before a rate of change is reported.
const MIN_TREND_POINTS: usize = 10;

/// Lookback threshold for the trend estimate: the comparison point must be
/// more than 5 seconds older than the latest point.
const TREND_LOOKBACK_MINUTES: f64 = 5.0 / 60.0;

/// Bounded recency window over valid temperature samples.
///
/// The smoothed "current temperature" is the arithmetic mean of the
/// window. Non-positive samples are the meter's "no reading" sentinel and
/// are ignored outright, never averaged in.
#[derive(Debug, Clone)]
pub struct TemperatureHistory {
    window: VecDeque<f64>,
    capacity: usize,
}

impl TemperatureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one sample. Samples at or below zero are discarded.
    pub fn observe(&mut self, sample: f64) {
        if sample <= 0.0 {
            return;
        }
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    /// Record a dual-probe reading: the two simultaneous probes are
    /// averaged into one sample, not windowed separately.
    pub fn observe_pair(&mut self, first: f64, second: f64) {
        self.observe((first + second) / 2.0);
    }

    /// Mean of the window, or `None` before the first valid sample.
    pub fn current(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

/// One recorded point of the session time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub minutes: f64,
    pub celsius: f64,
}

/// Append-only (elapsed-minutes, temperature) log for one session.
///
/// Unlike the smoothing window this is unbounded: the trend estimator
/// walks the full series, and a reset clears it.
#[derive(Debug, Clone, Default)]
pub struct TemperatureLog {
    points: Vec<TimeSeriesPoint>,
}

impl TemperatureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, minutes: f64, celsius: f64) {
        self.points.push(TimeSeriesPoint { minutes, celsius });
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Coarse discrete temperature derivative in degrees C per minute.
    ///
    /// Walks backward from the latest point to the first one more than
    /// 5 seconds older and takes the slope between the two. The scan is
    /// bounded two points away from either end of the series; with fewer
    /// than 10 points, or no qualifying point in range, the rate is 0.
    pub fn rate_of_change(&self) -> f64 {
        let n = self.points.len();
        if n < MIN_TREND_POINTS {
            return 0.0;
        }
        let latest = self.points[n - 1];
        for back in 2..(n - 2) {
            let older = self.points[n - back];
            if latest.minutes - older.minutes > TREND_LOOKBACK_MINUTES {
                return (latest.celsius - older.celsius) / (latest.minutes - older.minutes);
            }
        }
        0.0
    }
}
