/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/config.rs

    Configuration for decoding and multi-pass recovery. Configuration is
    validated when handed to an engine; out-of-range values are rejected
    rather than clamped.
*/
use crate::{
    copy_protection::SpeedlockParams,
    types::{DiskRpm, TrackDataEncoding, TrackDataRate},
    SiftError,
    DEFAULT_EVIDENCE_CAPACITY,
    DEFAULT_PEAK_CAPACITY,
    DEFAULT_SECTOR_CAPACITY,
};

/// The fewest passes the recovery engine will vote over.
pub const MIN_PASS_COUNT: u8 = 2;
/// The most passes the recovery engine will vote over.
pub const MAX_PASS_COUNT: u8 = 64;

/// Parameters of the flux decoding PLL.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllConfig {
    /// Fraction of the residual phase error applied to the clock period on each transition.
    pub clock_gain: f64,
    /// Fraction of the residual phase error removed on each transition.
    pub phase_gain: f64,
    /// Maximum deviation of the clock from its center, as a fraction of the center period.
    pub max_adjust: f64,
}

impl Default for PllConfig {
    fn default() -> Self {
        PllConfig {
            clock_gain: 0.05,
            phase_gain: 0.65,
            max_adjust: 0.10,
        }
    }
}

impl PllConfig {
    pub fn validate(&self) -> Result<(), SiftError> {
        check_f64("clock_gain", self.clock_gain, 0.0, 1.0, "0.0 < clock_gain <= 1.0")?;
        check_f64("phase_gain", self.phase_gain, 0.0, 1.0, "0.0 < phase_gain <= 1.0")?;
        check_f64("max_adjust", self.max_adjust, 0.0, 0.5, "0.0 < max_adjust <= 0.5")?;
        Ok(())
    }
}

/// Configuration of a [crate::recovery::RecoveryEngine] and the decoders it drives.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecoveryConfig {
    /// Passes required before voting may stop early. 2-64.
    pub min_passes: u8,
    /// Passes after which the engine gives up. min_passes-64.
    pub max_passes: u8,
    /// CRC-confirmed passes required, in addition to `min_passes`, to stop early.
    pub required_crc_passes: u8,
    /// Confidence (0-100) a vote must reach to be reported as recovered.
    pub confidence_threshold: u8,
    /// Encoding to decode with. When `None`, the encoding is classified from flux timings.
    pub encoding_hint: Option<TrackDataEncoding>,
    /// Nominal data rate of the captured tracks.
    pub data_rate: TrackDataRate,
    /// Rotation rate of the capturing drive.
    pub rpm: DiskRpm,
    /// Attempt to repair sectors whose voted data fails CRC.
    pub crc_correction: bool,
    /// Keep per-byte weak masks on recovered sectors.
    pub preserve_weak_bits: bool,
    pub pll: PllConfig,
    /// Maximum sectors accepted per track.
    pub sector_capacity: usize,
    /// Maximum histogram peaks considered during encoding classification.
    pub peak_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            min_passes: 3,
            max_passes: 5,
            required_crc_passes: 1,
            confidence_threshold: 75,
            encoding_hint: None,
            data_rate: TrackDataRate::default(),
            rpm: DiskRpm::default(),
            crc_correction: true,
            preserve_weak_bits: true,
            pll: PllConfig::default(),
            sector_capacity: DEFAULT_SECTOR_CAPACITY,
            peak_capacity: DEFAULT_PEAK_CAPACITY,
        }
    }
}

impl RecoveryConfig {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), SiftError> {
        check_range("min_passes", self.min_passes as usize, MIN_PASS_COUNT as usize, MAX_PASS_COUNT as usize, "2-64")?;
        check_range(
            "max_passes",
            self.max_passes as usize,
            self.min_passes as usize,
            MAX_PASS_COUNT as usize,
            "min_passes-64",
        )?;
        check_range(
            "required_crc_passes",
            self.required_crc_passes as usize,
            0,
            self.max_passes as usize,
            "0-max_passes",
        )?;
        check_range("confidence_threshold", self.confidence_threshold as usize, 0, 100, "0-100")?;

        if let Some(encoding) = self.encoding_hint {
            if !encoding.is_decodable() {
                return Err(SiftError::ConfigError {
                    field: "encoding_hint",
                    value: encoding.to_string(),
                    expected: "MFM or FM",
                });
            }
        }

        let rate = u32::from(self.data_rate);
        check_range("data_rate", rate as usize, 50_000, 2_000_000, "50000-2000000 bits per second")?;

        self.pll.validate()?;

        check_range("sector_capacity", self.sector_capacity, 1, 1024, "1-1024")?;
        check_range("peak_capacity", self.peak_capacity, 3, 256, "3-256")?;
        Ok(())
    }

    /// Return the nominal bitcell period for the configured data rate, in nanoseconds.
    /// The data rate is the controller's MFM rate; FM cells at the same setting are twice as long.
    pub fn bitcell_ns(&self, encoding: TrackDataEncoding) -> f64 {
        match encoding {
            TrackDataEncoding::Fm => self.data_rate.bitcell_ns() * 2.0,
            _ => self.data_rate.bitcell_ns(),
        }
    }
}

/// Configuration of a [crate::copy_protection::ProtectionAnalyzer] and its built-in sources.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalyzerConfig {
    /// Deviation from the nominal track length tolerated before a track is reported long or
    /// short, as a fraction.
    pub track_length_tolerance: f64,
    /// Fraction of differing bytes above which revolutions are considered misaligned rather
    /// than weak.
    pub weak_max_fraction: f64,
    /// Shortest acceptable MFM sync run, in bytes.
    pub min_sync_mfm: usize,
    /// Shortest acceptable FM sync run, in bytes.
    pub min_sync_fm: usize,
    pub speedlock: SpeedlockParams,
    /// Tolerance of CopyLock sector timing, in percent of the nominal bitcell period.
    pub copylock_timing_tolerance: f64,
    /// Maximum protection evidence entries accepted per track.
    pub evidence_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            track_length_tolerance: 0.05,
            weak_max_fraction: 0.25,
            min_sync_mfm: 4,
            min_sync_fm: 3,
            speedlock: SpeedlockParams::default(),
            copylock_timing_tolerance: 3.0,
            evidence_capacity: DEFAULT_EVIDENCE_CAPACITY,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), SiftError> {
        check_f64(
            "track_length_tolerance",
            self.track_length_tolerance,
            0.0,
            0.5,
            "0.0 < track_length_tolerance <= 0.5",
        )?;
        check_f64("weak_max_fraction", self.weak_max_fraction, 0.0, 1.0, "0.0 < weak_max_fraction <= 1.0")?;
        check_range("min_sync_mfm", self.min_sync_mfm, 1, 64, "1-64")?;
        check_range("min_sync_fm", self.min_sync_fm, 1, 64, "1-64")?;
        check_f64(
            "copylock_timing_tolerance",
            self.copylock_timing_tolerance,
            0.0,
            50.0,
            "0.0 < copylock_timing_tolerance <= 50.0",
        )?;
        check_range("evidence_capacity", self.evidence_capacity, 1, 256, "1-256")?;
        self.speedlock.validate()
    }
}

pub(crate) fn check_range(field: &'static str, value: usize, min: usize, max: usize, expected: &'static str) -> Result<(), SiftError> {
    if value < min || value > max {
        log::error!("config::check_range(): {} = {} out of range ({})", field, value, expected);
        return Err(SiftError::ConfigError {
            field,
            value: value.to_string(),
            expected,
        });
    }
    Ok(())
}

pub(crate) fn check_f64(field: &'static str, value: f64, min_exclusive: f64, max: f64, expected: &'static str) -> Result<(), SiftError> {
    if !value.is_finite() || value <= min_exclusive || value > max {
        log::error!("config::check_f64(): {} = {} out of range ({})", field, value, expected);
        return Err(SiftError::ConfigError {
            field,
            value: value.to_string(),
            expected,
        });
    }
    Ok(())
}
