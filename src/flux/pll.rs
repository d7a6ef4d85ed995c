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

    src/flux/pll.rs

    The clock-recovery PLL that resolves flux intervals into bitcells.
*/
use crate::{
    config::PllConfig,
    flux::{flux_revolution::FluxRevolution, FluxStats},
    types::DiskCh,
    SiftError,
};
use bit_vec::BitVec;

/// Intervals longer than this are treated as no-flux areas and skipped.
const MAX_INTERVAL_NS: f64 = 100_000_000.0;
/// Zero-run length beyond which the PLL considers itself out of lock.
const MAX_LOCKED_ZEROS: u32 = 3;
/// Good bits required before a loss of lock is reported as a sync loss.
const SYNC_GOOD_BITS: u32 = 256;

/// The state of the PLL clock.
///
/// `clock` is always kept within `[min, max]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClockState {
    /// Current bitcell period in nanoseconds.
    pub clock: f64,
    /// Nominal bitcell period the clock is pulled back toward when out of lock.
    pub center: f64,
    pub min: f64,
    pub max: f64,
    /// Flux time accumulated since the last bitcell boundary. May be negative when a
    /// transition arrives early.
    pub residue: f64,
    pub clock_gain: f64,
    pub phase_gain: f64,
    /// Consecutive zero bits clocked out since the last transition.
    pub zero_run: u32,
    /// Bits decoded since the clock was last out of lock.
    pub good_bits: u32,
    pub sync_lost: bool,
}

impl ClockState {
    pub fn new(bitcell_ns: f64, config: &PllConfig) -> Self {
        ClockState {
            clock: bitcell_ns,
            center: bitcell_ns,
            min: bitcell_ns * (1.0 - config.max_adjust),
            max: bitcell_ns * (1.0 + config.max_adjust),
            residue: 0.0,
            clock_gain: config.clock_gain,
            phase_gain: config.phase_gain,
            zero_run: 0,
            good_bits: 0,
            sync_lost: false,
        }
    }

    /// Clock out the next bitcell from the accumulated residue.
    /// Returns `None` when more flux is needed to reach the next cell boundary.
    fn next_bit(&mut self) -> Option<bool> {
        if self.residue < self.clock / 2.0 {
            self.zero_run = 0;
            return None;
        }

        self.residue -= self.clock;

        if self.residue >= self.clock / 2.0 {
            // No transition in this cell.
            self.zero_run += 1;
            self.good_bits += 1;
            return Some(false);
        }

        if self.zero_run <= MAX_LOCKED_ZEROS {
            self.clock += self.residue * self.clock_gain;
        }
        else {
            self.clock += (self.center - self.clock) * self.clock_gain;
            if self.good_bits >= SYNC_GOOD_BITS {
                self.sync_lost = true;
            }
            self.good_bits = 0;
        }
        self.clock = self.clock.clamp(self.min, self.max);

        self.residue *= 1.0 - self.phase_gain;
        self.good_bits += 1;
        Some(true)
    }
}

/// The bitcells resolved from one revolution, with per-cell timing.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedRevolution {
    pub ch: DiskCh,
    pub index: usize,
    pub bits: BitVec,
    /// The measured duration of each bitcell, in nanoseconds. An interval spanning `n` cells
    /// contributes `n` entries of `interval / n`.
    pub bit_times: Vec<f32>,
    /// Bit offsets at which the PLL lost lock after a run of good bits.
    pub sync_losses: Vec<usize>,
    pub nominal_bitcell_ns: f64,
    pub index_time: f64,
    pub final_clock: f64,
    pub flux_stats: FluxStats,
}

impl DecodedRevolution {
    /// Build a decoded revolution from an externally supplied bitstream with an explicit
    /// bit count. Per-cell timing is assumed nominal.
    pub fn from_bits(ch: DiskCh, bits: BitVec, bitcell_ns: f64) -> Self {
        let len = bits.len();
        DecodedRevolution {
            ch,
            index: 0,
            bits,
            bit_times: vec![bitcell_ns as f32; len],
            sync_losses: Vec::new(),
            nominal_bitcell_ns: bitcell_ns,
            index_time: bitcell_ns * len as f64,
            final_clock: bitcell_ns,
            flux_stats: FluxStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Average bitcell period over the whole revolution, in nanoseconds.
    pub fn average_bitcell_ns(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.index_time / self.bits.len() as f64
    }

    /// Average measured bitcell duration over `range`, clamped to the revolution.
    pub fn average_time(&self, start: usize, end: usize) -> Option<f64> {
        let end = end.min(self.bit_times.len());
        if start >= end {
            return None;
        }
        let sum: f64 = self.bit_times[start..end].iter().map(|t| *t as f64).sum();
        Some(sum / (end - start) as f64)
    }
}

/// The flux decoder. Resolves flux intervals into bitcells with an adaptive clock.
///
/// Decoding is strictly sequential within a revolution, and deterministic: identical
/// input to a fresh decoder always produces identical output.
#[derive(Clone, Debug)]
pub struct FluxDecoder {
    config: PllConfig,
    bitcell_ns: f64,
    state: ClockState,
    pending_ns: f64,
    sync_loss_ct: u32,
}

impl FluxDecoder {
    /// Create a new decoder for a nominal bitcell period, in nanoseconds.
    pub fn new(bitcell_ns: f64, config: PllConfig) -> Result<Self, SiftError> {
        if !(bitcell_ns.is_finite() && bitcell_ns > 0.0) {
            log::error!("FluxDecoder::new(): Invalid bitcell period: {}", bitcell_ns);
            return Err(SiftError::ParameterError);
        }
        config.validate()?;

        log::debug!(
            "FluxDecoder::new(): bitcell: {} clock gain: {:.3} phase gain: {:.3} max adjust: {:.2}",
            crate::format_us!(bitcell_ns),
            config.clock_gain,
            config.phase_gain,
            config.max_adjust
        );

        Ok(FluxDecoder {
            config,
            bitcell_ns,
            state: ClockState::new(bitcell_ns, &config),
            pending_ns: 0.0,
            sync_loss_ct: 0,
        })
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn bitcell_ns(&self) -> f64 {
        self.bitcell_ns
    }

    /// Return the number of sync losses since the decoder was last reset.
    pub fn sync_loss_ct(&self) -> u32 {
        self.sync_loss_ct
    }

    /// Return the decoder to its initial state.
    pub fn reset(&mut self) {
        self.state = ClockState::new(self.bitcell_ns, &self.config);
        self.pending_ns = 0.0;
        self.sync_loss_ct = 0;
    }

    /// Feed one flux interval, in nanoseconds, to the PLL. The bitcells it resolves are
    /// appended to `bits`. Returns the number of bitcells emitted, which may be zero if the
    /// interval ended before the next cell boundary.
    pub fn process_interval(&mut self, ns: f64, bits: &mut BitVec) -> usize {
        if !ns.is_finite() || ns < 0.0 || ns > MAX_INTERVAL_NS {
            log::warn!("FluxDecoder::process_interval(): Skipping invalid interval: {}", ns);
            return 0;
        }

        self.state.residue += ns;
        let mut emitted = 0;
        while let Some(bit) = self.state.next_bit() {
            bits.push(bit);
            emitted += 1;
            if self.state.sync_lost {
                self.sync_loss_ct += 1;
                self.state.sync_lost = false;
                log::trace!(
                    "FluxDecoder::process_interval(): Sync lost at bit {}, clock: {}",
                    bits.len(),
                    crate::format_us!(self.state.clock)
                );
            }
        }
        emitted
    }

    /// Decode a full revolution with a freshly reset PLL.
    pub fn decode(&mut self, revolution: &FluxRevolution) -> DecodedRevolution {
        let mut decoded = self.decode_intervals(revolution.deltas());
        decoded.ch = revolution.ch;
        decoded.index = revolution.index;
        decoded
    }

    /// Decode a slice of intervals with a freshly reset PLL.
    pub fn decode_intervals(&mut self, intervals: &[f64]) -> DecodedRevolution {
        self.reset();

        let mut bits = BitVec::with_capacity(intervals.len() * 3);
        let mut bit_times = Vec::with_capacity(intervals.len() * 3);
        let mut sync_losses = Vec::new();
        let mut index_time = 0.0;

        for &interval in intervals {
            let losses_before = self.sync_loss_ct;
            let emitted = self.process_interval(interval, &mut bits);
            if self.sync_loss_ct != losses_before {
                sync_losses.push(bits.len());
            }
            if interval.is_finite() && interval > 0.0 && interval <= MAX_INTERVAL_NS {
                self.pending_ns += interval;
                index_time += interval;
            }
            if emitted > 0 {
                let per_cell = (self.pending_ns / emitted as f64) as f32;
                bit_times.extend(std::iter::repeat(per_cell).take(emitted));
                self.pending_ns = 0.0;
            }
        }

        log::debug!(
            "FluxDecoder::decode_intervals(): {} transitions -> {} bitcells, {} sync losses, final clock: {}",
            intervals.len(),
            bits.len(),
            sync_losses.len(),
            crate::format_us!(self.state.clock)
        );

        DecodedRevolution {
            ch: DiskCh::default(),
            index: 0,
            bits,
            bit_times,
            sync_losses,
            nominal_bitcell_ns: self.bitcell_ns,
            index_time,
            final_clock: self.state.clock,
            flux_stats: FluxStats::from_intervals(intervals, self.bitcell_ns),
        }
    }
}
