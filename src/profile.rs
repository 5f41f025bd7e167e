// src/profile.rs - Target profile curve and target resolution
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad profile row {line}: {content:?}")]
    BadRow { line: usize, content: String },
}

/// One point of a pre-recorded roast profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub minutes: f64,
    pub celsius: f64,
}

/// A pre-recorded target-temperature-vs-time curve.
///
/// Loaded once before a roast and queried, never mutated, afterwards.
/// Rows arrive as `time-seconds,temperature,label`; the label is cosmetic
/// and discarded, times are converted to minutes at load.
#[derive(Debug, Clone, Default)]
pub struct ProfileCurve {
    points: Vec<ProfilePoint>,
}

impl ProfileCurve {
    pub fn new(points: Vec<ProfilePoint>) -> Self {
        Self { points }
    }

    /// Parse profile rows from CSV text. Rows whose first field is not
    /// numeric (headers) are skipped; a numeric row with an unparsable
    /// temperature is an error, not a silent zero.
    pub fn parse(contents: &str) -> Result<Self, ProfileError> {
        let mut points = Vec::new();
        for (index, row) in contents.lines().enumerate() {
            let mut fields = row.split(',').map(str::trim);
            let Some(first) = fields.next() else {
                continue;
            };
            let Ok(seconds) = first.parse::<f64>() else {
                // Header or annotation row.
                continue;
            };
            let celsius = fields
                .next()
                .and_then(|f| f.parse::<f64>().ok())
                .ok_or_else(|| ProfileError::BadRow {
                    line: index + 1,
                    content: row.to_string(),
                })?;
            points.push(ProfilePoint {
                minutes: seconds / 60.0,
                celsius,
            });
        }
        Ok(Self { points })
    }

    /// Load a profile curve from a CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn points(&self) -> &[ProfilePoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Profile temperature at the given elapsed time: the first point at
    /// or past the elapsed time wins (step function, no interpolation);
    /// past the last point the profile contributes nothing.
    pub fn temperature_at(&self, elapsed_minutes: f64) -> f64 {
        for point in &self.points {
            if point.minutes >= elapsed_minutes {
                return point.celsius;
            }
        }
        0.0
    }
}

/// Resolve the desired temperature for the current tick. A nonzero manual
/// setpoint always wins over the profile.
pub fn resolve_target(
    elapsed_minutes: f64,
    manual_setpoint: f64,
    profile: Option<&ProfileCurve>,
) -> f64 {
    if manual_setpoint != 0.0 {
        return manual_setpoint;
    }
    profile
        .map(|p| p.temperature_at(elapsed_minutes))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ramp() -> ProfileCurve {
        ProfileCurve::new(vec![
            ProfilePoint {
                minutes: 2.0,
                celsius: 120.0,
            },
            ProfilePoint {
                minutes: 6.0,
                celsius: 180.0,
            },
            ProfilePoint {
                minutes: 12.0,
                celsius: 225.0,
            },
        ])
    }

    #[test]
    fn test_step_lookup_without_interpolation() {
        let profile = ramp();
        assert_eq!(profile.temperature_at(0.0), 120.0);
        assert_eq!(profile.temperature_at(2.0), 120.0);
        assert_eq!(profile.temperature_at(2.1), 180.0);
        assert_eq!(profile.temperature_at(11.9), 225.0);
    }

    #[test]
    fn test_past_the_end_yields_zero() {
        assert_eq!(ramp().temperature_at(12.1), 0.0);
        assert_eq!(ProfileCurve::default().temperature_at(0.0), 0.0);
    }

    #[test]
    fn test_manual_setpoint_always_wins() {
        let profile = ramp();
        assert_eq!(resolve_target(3.0, 200.0, Some(&profile)), 200.0);
        assert_eq!(resolve_target(3.0, 0.0, Some(&profile)), 180.0);
        assert_eq!(resolve_target(3.0, 0.0, None), 0.0);
    }

    #[test]
    fn test_parse_skips_headers_and_converts_seconds() {
        let csv = "Time,Temperature,Event\n120,120.0,\n360,180.0,First crack\n720,225.0,\n";
        let profile = ProfileCurve::parse(csv).unwrap();
        assert_eq!(profile.points().len(), 3);
        assert_eq!(profile.points()[0].minutes, 2.0);
        assert_eq!(profile.points()[1].celsius, 180.0);
    }

    #[test]
    fn test_parse_rejects_numeric_row_with_bad_temperature() {
        let err = ProfileCurve::parse("120,not-a-number,\n").unwrap_err();
        match err {
            ProfileError::BadRow { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Time,Temperature,Event").unwrap();
        writeln!(file, "60,100.0,").unwrap();
        writeln!(file, "120,140.0,").unwrap();
        let profile = ProfileCurve::load(file.path()).unwrap();
        assert_eq!(profile.points().len(), 2);
        assert_eq!(profile.temperature_at(0.5), 100.0);
    }
}
