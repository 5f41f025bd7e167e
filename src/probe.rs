// src/probe.rs - Secondary temperature probe line parsing
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("short probe line: {0:?}")]
    ShortLine(String),
    #[error("non-numeric probe field {0:?}")]
    BadField(String),
}

/// One reading from the dual-thermocouple probe rig.
///
/// The ambient value is telemetry only; the two probe temperatures are
/// averaged into a single sample by the history window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReading {
    pub ambient: f64,
    pub first: f64,
    pub second: f64,
}

/// Parse a probe line: `"T <ambient> <t1> <t2>"` from the power
/// controller's shared port, or `"<ambient> <t1> <t2>"` from a dedicated
/// probe port. Short or non-numeric lines are errors for the caller to
/// log and skip.
pub fn parse_line(line: &str) -> Result<ProbeReading, ProbeError> {
    let mut fields: Vec<&str> = line.split_whitespace().collect();
    if fields.first() == Some(&"T") {
        fields.remove(0);
    }
    if fields.len() < 3 {
        return Err(ProbeError::ShortLine(line.to_string()));
    }
    Ok(ProbeReading {
        ambient: numeric(fields[0])?,
        first: numeric(fields[1])?,
        second: numeric(fields[2])?,
    })
}

fn numeric(field: &str) -> Result<f64, ProbeError> {
    field
        .parse::<f64>()
        .map_err(|_| ProbeError::BadField(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_line() {
        let reading = parse_line("T 24.1 182.4 184.0").unwrap();
        assert_eq!(reading.ambient, 24.1);
        assert_eq!(reading.first, 182.4);
        assert_eq!(reading.second, 184.0);
    }

    #[test]
    fn test_untagged_line() {
        let reading = parse_line("22.0 150.5 149.5").unwrap();
        assert_eq!(reading.ambient, 22.0);
        assert_eq!(reading.first, 150.5);
    }

    #[test]
    fn test_short_line_is_an_error() {
        assert!(matches!(
            parse_line("T 24.1 182.4"),
            Err(ProbeError::ShortLine(_))
        ));
        assert!(matches!(parse_line(""), Err(ProbeError::ShortLine(_))));
    }

    #[test]
    fn test_non_numeric_field_is_an_error() {
        assert!(matches!(
            parse_line("T 24.1 oops 184.0"),
            Err(ProbeError::BadField(_))
        ));
    }
}
