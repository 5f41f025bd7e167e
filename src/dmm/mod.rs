// src/dmm/mod.rs - Raw multimeter frame decoding
pub mod digits;

use thiserror::Error;

use digits::DecodedDigit;

/// Fields per raw meter line.
pub const FRAME_FIELDS: usize = 15;

/// Literal markers at fields 12..=14 when the meter is in temperature
/// measurement mode.
pub const MODE_MARKERS: [&str; 3] = ["BF", "6E", "6C"];

/// Field pairs whose first characters concatenate into the four digit
/// codes, in reading order: (high field, low field).
const DIGIT_FIELDS: [(usize, usize); 4] = [(11, 4), (10, 7), (8, 6), (1, 3)];

/// The third digit code arrives with its decimal point bit inverted.
const D3_SIGN_QUIRK: u8 = 0x10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid meter frame: expected {FRAME_FIELDS} fields, got {0}")]
    FieldCount(usize),
    #[error("meter is not in temperature mode")]
    WrongMode,
    #[error("frame field {0:?} is not hexadecimal")]
    BadField(String),
    #[error("bad meter digits {d1:02X} {d2:02X} {d3:02X} {d4:02X}")]
    BadDigits { d1: u8, d2: u8, d3: u8, d4: u8 },
    #[error("assembled reading {0:?} is not a number")]
    BadReading(String),
}

/// Decode one raw meter line into a temperature in degrees C.
///
/// The wire format is undocumented and must be reproduced bit-exactly:
/// 15 whitespace-separated fields, mode markers at 12..=14, and four
/// digit codes assembled from the first hex characters of fixed field
/// pairs. Any failure discards the whole reading; no partial temperature
/// is ever produced.
pub fn decode_frame(line: &str) -> Result<f64, FrameError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FRAME_FIELDS {
        return Err(FrameError::FieldCount(fields.len()));
    }
    if fields[12] != MODE_MARKERS[0]
        || fields[13] != MODE_MARKERS[1]
        || fields[14] != MODE_MARKERS[2]
    {
        return Err(FrameError::WrongMode);
    }

    let mut codes = [0u8; 4];
    for (slot, (hi, lo)) in DIGIT_FIELDS.iter().enumerate() {
        codes[slot] = digit_code(fields[*hi], fields[*lo])?;
    }
    codes[2] ^= D3_SIGN_QUIRK;

    let mut decoded = [DecodedDigit {
        decimal_point: false,
        digit: '0',
    }; 4];
    for (slot, &code) in codes.iter().enumerate() {
        decoded[slot] = digits::decode(code).map_err(|_| FrameError::BadDigits {
            d1: codes[0],
            d2: codes[1],
            d3: codes[2],
            d4: codes[3],
        })?;
    }

    let mut literal = String::with_capacity(8);
    for digit in &decoded {
        digit.write_to(&mut literal);
    }
    literal
        .parse::<f64>()
        .map_err(|_| FrameError::BadReading(literal))
}

/// Concatenate the first characters of two fields into one hex byte.
fn digit_code(hi: &str, lo: &str) -> Result<u8, FrameError> {
    Ok((hex_nibble(hi)? << 4) | hex_nibble(lo)?)
}

fn hex_nibble(field: &str) -> Result<u8, FrameError> {
    field
        .chars()
        .next()
        .and_then(|c| c.to_digit(16))
        .map(|v| v as u8)
        .ok_or_else(|| FrameError::BadField(field.to_string()))
}
