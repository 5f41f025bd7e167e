// src/dmm/digits.rs - Victor 86B seven-segment digit codec
use thiserror::Error;

/// Decimal point flag bit. Independent of the digit mapping and must be
/// checked before masking the code for lookup.
pub const DECIMAL_POINT_FLAG: u8 = 0x10;

/// Mask that clears the decimal point flag for the digit lookup.
pub const DIGIT_MASK: u8 = 0xEF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized digit code {code:#04X}")]
pub struct UnknownCode {
    pub code: u8,
}

/// One decoded meter digit: the decimal digit plus whether the decimal
/// point segment precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedDigit {
    pub decimal_point: bool,
    pub digit: char,
}

impl DecodedDigit {
    /// Append this digit's textual form to a reading literal.
    pub fn write_to(&self, out: &mut String) {
        if self.decimal_point {
            out.push('.');
        }
        out.push(self.digit);
    }
}

/// Decode one raw meter digit code.
///
/// The meter emits three adjacent codes per digit as segments decay, so
/// the mapping is many-to-one. Anything outside the closed set is an
/// error carrying the raw code; a bad code never decodes to a default
/// digit.
pub fn decode(code: u8) -> Result<DecodedDigit, UnknownCode> {
    let decimal_point = code & DECIMAL_POINT_FLAG != 0;
    let digit = match code & DIGIT_MASK {
        0x41 | 0x42 | 0x43 => '0',
        0x60 | 0x61 | 0x62 => '1',
        0x03 | 0x04 | 0x05 => '2',
        0xE5 | 0xE6 | 0xE7 => '3',
        0xA4 | 0xA5 | 0xA6 => '4',
        0x2D | 0x2E | 0x2F => '5',
        0x4D | 0x4E | 0x4F => '6',
        0xE0 | 0xE1 | 0xE2 => '7',
        0x45 | 0x46 | 0x47 => '8',
        0x25 | 0x26 | 0x27 => '9',
        _ => return Err(UnknownCode { code }),
    };
    Ok(DecodedDigit {
        decimal_point,
        digit,
    })
}
