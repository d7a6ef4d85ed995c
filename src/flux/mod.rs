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

    src/flux/mod.rs

    Flux-level processing: revolutions of flux intervals, interval statistics,
    histograms, encoding classification and the clock-recovery PLL.
*/
use crate::types::TrackDataEncoding;
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// Format a value in nanoseconds as microseconds.
#[doc(hidden)]
#[macro_export]
macro_rules! format_us {
    ($value:expr) => {
        format!("{:.4}μs", $value / 1_000.0)
    };
}

/// Format a value in nanoseconds as milliseconds.
#[doc(hidden)]
#[macro_export]
macro_rules! format_ms {
    ($value:expr) => {
        format!("{:.4}ms", $value / 1_000_000.0)
    };
}

mod classifier;
pub mod flux_revolution;
mod histogram;
pub mod pll;

pub use classifier::{EncodingClassification, EncodingClassifier};
pub use flux_revolution::FluxRevolution;
pub use histogram::{FluxHistogram, HistogramPeak};
pub use pll::{ClockState, DecodedRevolution, FluxDecoder};

/// A flux interval classified by the number of bitcells it spans.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FluxTransition {
    Short,
    Medium,
    Long,
    Other,
}

impl Display for FluxTransition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FluxTransition::Short => write!(f, "S"),
            FluxTransition::Medium => write!(f, "M"),
            FluxTransition::Long => write!(f, "L"),
            FluxTransition::Other => write!(f, "X"),
        }
    }
}

impl FluxTransition {
    /// Classify an interval against a nominal bitcell period. Short, medium and long correspond
    /// to the 2, 3 and 4 cell intervals of MFM.
    pub fn classify(interval_ns: f64, bitcell_ns: f64) -> FluxTransition {
        if bitcell_ns <= 0.0 {
            return FluxTransition::Other;
        }
        let cells = interval_ns / bitcell_ns;
        match cells {
            c if (1.5..2.5).contains(&c) => FluxTransition::Short,
            c if (2.5..3.5).contains(&c) => FluxTransition::Medium,
            c if (3.5..4.5).contains(&c) => FluxTransition::Long,
            _ => FluxTransition::Other,
        }
    }
}

/// Summary statistics over the intervals of a single revolution.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxStats {
    pub total: u32,
    pub short: u32,
    pub medium: u32,
    pub long: u32,
    pub too_short: u32,
    pub too_long: u32,

    pub shortest_flux: f64,
    pub longest_flux:  f64,
    pub total_time: f64,
}

impl Display for FluxStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Total: {} S: {} M: {} L: {} Shortest: {} Longest: {} Too Short: {} Too Long: {}",
            self.total,
            self.short,
            self.medium,
            self.long,
            format_us!(self.shortest_flux),
            format_us!(self.longest_flux),
            self.too_short,
            self.too_long
        )
    }
}

impl FluxStats {
    /// Gather statistics for a slice of intervals against a nominal bitcell period.
    pub fn from_intervals(intervals: &[f64], bitcell_ns: f64) -> Self {
        let mut stats = FluxStats {
            shortest_flux: f64::MAX,
            ..Default::default()
        };

        for &interval in intervals {
            stats.total += 1;
            stats.total_time += interval;
            stats.shortest_flux = stats.shortest_flux.min(interval);
            stats.longest_flux = stats.longest_flux.max(interval);
            match FluxTransition::classify(interval, bitcell_ns) {
                FluxTransition::Short => stats.short += 1,
                FluxTransition::Medium => stats.medium += 1,
                FluxTransition::Long => stats.long += 1,
                FluxTransition::Other => {
                    if interval < bitcell_ns * 1.5 {
                        stats.too_short += 1;
                    }
                    else {
                        stats.too_long += 1;
                    }
                }
            }
        }

        if stats.total == 0 {
            stats.shortest_flux = 0.0;
        }
        stats
    }

    /// A coarse encoding guess from transition counts alone. MFM tracks show plenty of
    /// three-cell transitions, FM tracks almost none.
    pub fn detect_encoding(&self) -> Option<TrackDataEncoding> {
        if self.total == 0 {
            return None;
        }
        let medium_freq = self.medium as f64 / self.total as f64;

        // If we have fewer than 5% medium transitions, it is likely an FM track
        if medium_freq > 0.05 {
            Some(TrackDataEncoding::Mfm)
        }
        else {
            Some(TrackDataEncoding::Fm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_classify_mfm_intervals() {
        let intervals = [4000.0, 6000.0, 8000.0, 4000.0, 1000.0, 20000.0];
        let stats = FluxStats::from_intervals(&intervals, 2000.0);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.short, 2);
        assert_eq!(stats.medium, 1);
        assert_eq!(stats.long, 1);
        assert_eq!(stats.too_short, 1);
        assert_eq!(stats.too_long, 1);
        assert_eq!(stats.detect_encoding(), Some(TrackDataEncoding::Mfm));
    }
}
