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

    src/flux/flux_revolution.rs

    A single revolution of captured flux intervals.
*/
use crate::{
    flux::{FluxHistogram, FluxStats},
    types::DiskCh,
    SiftError,
};

/// One revolution of a track as captured by flux hardware: an ordered sequence of intervals
/// between flux transitions, in nanoseconds, starting at the index pulse.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxRevolution {
    pub ch: DiskCh,
    pub index: usize,
    flux_deltas: Vec<f64>,
}

impl FluxRevolution {
    /// Create a revolution from intervals already expressed in nanoseconds.
    pub fn from_ns(ch: DiskCh, index: usize, deltas: Vec<f64>) -> Result<Self, SiftError> {
        if deltas.is_empty() {
            return Err(SiftError::EmptyInput("flux revolution"));
        }
        Ok(FluxRevolution {
            ch,
            index,
            flux_deltas: deltas,
        })
    }

    /// Create a revolution from raw tick counts of a capture device sampling at `sample_freq`
    /// Hz. Zero-length ticks (no-flux-area markers in some capture formats) are skipped.
    pub fn from_ticks(ch: DiskCh, index: usize, ticks: &[u32], sample_freq: f64) -> Result<Self, SiftError> {
        if ticks.is_empty() {
            return Err(SiftError::EmptyInput("flux revolution"));
        }
        if !(sample_freq.is_finite() && sample_freq > 0.0) {
            return Err(SiftError::ParameterError);
        }

        let timebase = 1.0e9 / sample_freq;
        log::debug!("FluxRevolution::from_ticks(): Using timebase of {:.3}ns", timebase);

        let mut nfa_count = 0;
        let mut flux_deltas = Vec::with_capacity(ticks.len());
        for &tick in ticks {
            if tick == 0 {
                nfa_count += 1;
                continue;
            }
            flux_deltas.push(tick as f64 * timebase);
        }

        if nfa_count > 0 {
            log::warn!("FluxRevolution::from_ticks(): {} NFA cells found", nfa_count);
        }
        if flux_deltas.is_empty() {
            return Err(SiftError::EmptyInput("flux revolution"));
        }

        Ok(FluxRevolution { ch, index, flux_deltas })
    }

    /// Return the intervals of this revolution, in nanoseconds.
    pub fn deltas(&self) -> &[f64] {
        &self.flux_deltas
    }

    /// Return the number of flux transitions in this revolution.
    pub fn ft_ct(&self) -> usize {
        self.flux_deltas.len()
    }

    /// Return the total duration of the revolution, in nanoseconds.
    pub fn index_time(&self) -> f64 {
        self.flux_deltas.iter().sum()
    }

    pub fn stats(&self, bitcell_ns: f64) -> FluxStats {
        FluxStats::from_intervals(&self.flux_deltas, bitcell_ns)
    }

    /// Produce a histogram over a fraction of the revolution's intervals.
    pub fn histogram(&self, fraction: f64) -> FluxHistogram {
        FluxHistogram::new(&self.flux_deltas, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_convert_to_ns() {
        // 24MHz sample clock: 96 ticks is 4µs.
        let rev = FluxRevolution::from_ticks(DiskCh::new(0, 0), 0, &[96, 0, 144, 192], 24_000_000.0).unwrap();
        assert_eq!(rev.ft_ct(), 3);
        assert!((rev.deltas()[0] - 4000.0).abs() < 1e-6);
        assert!((rev.deltas()[1] - 6000.0).abs() < 1e-6);
        assert!((rev.index_time() - 18000.0).abs() < 1e-6);
    }

    #[test]
    fn empty_revolution_is_rejected() {
        assert!(matches!(
            FluxRevolution::from_ticks(DiskCh::default(), 0, &[], 24_000_000.0),
            Err(SiftError::EmptyInput(_))
        ));
        assert!(FluxRevolution::from_ns(DiskCh::default(), 0, Vec::new()).is_err());
        assert!(FluxRevolution::from_ticks(DiskCh::default(), 0, &[10], 0.0).is_err());
    }
}
