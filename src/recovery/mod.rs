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

    src/recovery/mod.rs

    Multi-pass recovery: majority voting over repeated reads of the same
    region, and whole-track recovery from several captured revolutions.
*/

//! Marginal media rarely reads the same way twice. The recovery engine takes several passes
//! over the same data, votes on each byte (or bitcell), and reports how strongly the passes
//! agreed.
//!
//! The basic operation is [RecoveryEngine::vote], which combines byte passes that the caller
//! already has. [RecoveryEngine::recover] pulls passes from a [PassSource] until enough have
//! been seen, and [RecoveryEngine::recover_track] runs the whole pipeline over captured flux
//! revolutions of a track.

pub mod correction;
mod engine;
mod vote;

pub use engine::{RecoveryEngine, TrackRecovery};
pub use vote::{vote_bits, vote_bytes, VotedData};

use std::fmt::{self, Display, Formatter};

/// One read of a region: the decoded bytes, a quality score and whether the read passed its CRC.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecoveryPass {
    pub data: Vec<u8>,
    /// Quality of the read (0-100), as judged by whoever produced it. Breaks voting ties.
    pub quality: u8,
    pub crc_ok: bool,
}

impl RecoveryPass {
    pub fn new(data: Vec<u8>, quality: u8, crc_ok: bool) -> Self {
        RecoveryPass {
            data,
            quality: quality.min(100),
            crc_ok,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The overall outcome of a recovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecoveryStatus {
    /// Voting reached the confidence threshold.
    Recovered,
    /// Voting completed but fell short of the confidence threshold. Data is still provided.
    LowConfidence,
    /// Too few passes were available to vote. No data is provided by [RecoveryEngine::vote];
    /// a [TrackRecovery] keeps whatever sectors its revolutions held.
    InsufficientPasses,
    /// Voting completed, but passes ran out before `required_crc_passes` of them passed CRC.
    /// Data is still provided.
    Unconfirmed,
}

impl RecoveryStatus {
    /// True only for [RecoveryStatus::Recovered].
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryStatus::Recovered)
    }
}

impl Display for RecoveryStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RecoveryStatus::Recovered => write!(f, "recovered"),
            RecoveryStatus::LowConfidence => write!(f, "low confidence"),
            RecoveryStatus::InsufficientPasses => write!(f, "insufficient passes"),
            RecoveryStatus::Unconfirmed => write!(f, "unconfirmed by CRC"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecoveryResult {
    pub status: RecoveryStatus,
    /// The voted bytes. `None` only when the status is [RecoveryStatus::InsufficientPasses].
    pub data: Option<Vec<u8>>,
    /// Mean per-byte confidence, 0-100.
    pub confidence: u8,
    pub byte_confidence: Vec<u8>,
    pub weak: Vec<bool>,
    pub passes_used: usize,
    pub crc_passes: usize,
}

impl RecoveryResult {
    pub(crate) fn insufficient(passes_used: usize, crc_passes: usize) -> Self {
        RecoveryResult {
            status: RecoveryStatus::InsufficientPasses,
            data: None,
            confidence: 0,
            byte_confidence: Vec::new(),
            weak: Vec::new(),
            passes_used,
            crc_passes,
        }
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from(self.confidence)
    }

    /// Offsets of bytes on which the passes disagreed.
    pub fn weak_offsets(&self) -> Vec<usize> {
        self.weak
            .iter()
            .enumerate()
            .filter_map(|(i, w)| if *w { Some(i) } else { None })
            .collect()
    }
}

/// Coarse grouping of a 0-100 confidence value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfidenceBand {
    /// 90 and above
    Strong,
    /// 60-89
    Weak,
    /// Below 60
    Ambiguous,
}

impl From<u8> for ConfidenceBand {
    fn from(confidence: u8) -> Self {
        match confidence {
            90.. => ConfidenceBand::Strong,
            60..=89 => ConfidenceBand::Weak,
            _ => ConfidenceBand::Ambiguous,
        }
    }
}

/// Classification of a voted bitcell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitClass {
    Strong1,
    Weak1,
    Strong0,
    Weak0,
    Ambiguous,
}

/// A bitcell voted across revolutions.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitCell {
    pub value: bool,
    /// Percentage of participating passes agreeing with `value`.
    pub confidence: u8,
    /// Number of passes that read a flux transition (a 1) here.
    pub transitions: u16,
    /// Difference between the longest and shortest measured cell time, in nanoseconds.
    pub timing_spread: f32,
    pub class: BitClass,
}

/// A supplier of passes for adaptive recovery. Returning `None` means no more passes can be had.
pub trait PassSource {
    fn next_pass(&mut self) -> Option<RecoveryPass>;
}

impl<I> PassSource for I
where
    I: Iterator<Item = RecoveryPass>,
{
    fn next_pass(&mut self) -> Option<RecoveryPass> {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bands() {
        assert_eq!(ConfidenceBand::from(100), ConfidenceBand::Strong);
        assert_eq!(ConfidenceBand::from(90), ConfidenceBand::Strong);
        assert_eq!(ConfidenceBand::from(89), ConfidenceBand::Weak);
        assert_eq!(ConfidenceBand::from(60), ConfidenceBand::Weak);
        assert_eq!(ConfidenceBand::from(59), ConfidenceBand::Ambiguous);
        assert_eq!(ConfidenceBand::from(0), ConfidenceBand::Ambiguous);
    }
}
