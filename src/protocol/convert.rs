//! Current ↔ DAC/ADC code conversions and ADC word realignment.
//!
//! The coil drivers use a 12-bit DAC (MCP4921) for the commanded level and
//! a 12-bit ADC (MCP3201) for the sensed level. Both share one linear
//! scale: code 4096 would be `full_scale_milliamp`.

use serde::{Deserialize, Serialize};

use crate::error::SampleError;

use super::commands::Direction;

/// DAC/ADC resolution in codes.
pub const LEVEL_RESOLUTION: u16 = 4096;

/// Largest representable 12-bit level.
pub const MAX_LEVEL: u16 = LEVEL_RESOLUTION - 1;

/// Default full-scale coil current.
pub const DEFAULT_FULL_SCALE_MILLIAMP: f64 = 320.0;

/// Maximum number of undefined bits ahead of the ADC null marker.
pub const MAX_MARKER_SHIFT: u32 = 3;

/// Split sensed word sent in place of a reading when the ADC marker bit
/// was not found. Bit 6 of the high byte is never set by a real sample.
pub const NO_SAMPLE_WORD: u16 = 0x4000;

/// Linear mapping between milliamps and 12-bit codes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentScale {
    full_scale_milliamp: f64,
}

impl Default for CurrentScale {
    fn default() -> Self {
        Self {
            full_scale_milliamp: DEFAULT_FULL_SCALE_MILLIAMP,
        }
    }
}

impl CurrentScale {
    /// Build a scale; `full_scale_milliamp` must be finite and positive
    /// (checked by [`LinkConfig::validate`](crate::config::LinkConfig::validate)).
    pub fn new(full_scale_milliamp: f64) -> Self {
        Self {
            full_scale_milliamp,
        }
    }

    pub fn full_scale_milliamp(&self) -> f64 {
        self.full_scale_milliamp
    }

    /// Current represented by one code step.
    pub fn step_milliamp(&self) -> f64 {
        self.full_scale_milliamp / f64::from(LEVEL_RESOLUTION)
    }

    /// Direction implied by a signed current: positive only above zero.
    pub fn direction_of(milliamp: f64) -> Direction {
        if milliamp > 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    /// Magnitude of `milliamp` as a DAC code, rounded and clamped.
    pub fn milliamp_to_level(&self, milliamp: f64) -> u16 {
        if !milliamp.is_finite() {
            return if milliamp.is_nan() { 0 } else { MAX_LEVEL };
        }
        let code = (milliamp.abs() / self.step_milliamp()).round();
        code.clamp(0.0, f64::from(MAX_LEVEL)) as u16
    }

    /// Signed current for a DAC code driven in `direction`.
    pub fn level_to_milliamp(&self, level: u16, direction: Direction) -> f64 {
        let magnitude = f64::from(level.min(MAX_LEVEL)) * self.step_milliamp();
        match direction {
            Direction::Positive => magnitude,
            Direction::Negative => -magnitude,
        }
    }

    /// Unsigned current for a realigned ADC code.
    pub fn sensed_to_milliamp(&self, level: u16) -> f64 {
        f64::from(level.min(MAX_LEVEL)) * self.step_milliamp()
    }
}

/// Right-justify the 12 data bits of a raw MCP3201 word.
///
/// The word starts with up to [`MAX_MARKER_SHIFT`] undefined (high) bits,
/// then the null marker (low), then 12 data bits MSB first.
pub fn realign_adc(raw: u16) -> Result<u16, SampleError> {
    let shift = raw.leading_ones();
    if shift > MAX_MARKER_SHIFT {
        return Err(SampleError::NoValidSample);
    }
    // Marker now sits in bit 15; data occupies bits 14..3.
    let aligned = raw << shift;
    Ok((aligned >> 3) & MAX_LEVEL)
}

/// Pack a realigned reading (or its failure) into the 6/8 split word sent
/// on the wire: high byte = bits 11..6, low byte = bits 5..0.
pub fn split_sensed(reading: Result<u16, SampleError>) -> u16 {
    match reading {
        Ok(level) => ((level >> 6) << 8) | (level & 0x3F),
        Err(SampleError::NoValidSample) => NO_SAMPLE_WORD,
    }
}

/// Inverse of [`split_sensed`] from the two wire bytes.
pub fn join_sensed(high: u8, low: u8) -> Result<u16, SampleError> {
    if high & (NO_SAMPLE_WORD >> 8) as u8 != 0 {
        return Err(SampleError::NoValidSample);
    }
    Ok((u16::from(high & 0x3F) << 6) | u16::from(low & 0x3F))
}
