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

    src/recovery/vote.rs

    Byte and bit level majority voting across passes.
*/
use crate::{
    flux::DecodedRevolution,
    recovery::{BitCell, BitClass, ConfidenceBand, RecoveryPass},
};

/// The outcome of voting over a set of byte passes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VotedData {
    pub data: Vec<u8>,
    /// Confidence (0-100) per byte offset.
    pub confidence: Vec<u8>,
    /// True for each byte offset where the participating passes disagreed.
    pub weak: Vec<bool>,
    /// For each weak offset, the losing values in descending order of support.
    pub alternates: Vec<(usize, Vec<u8>)>,
    /// Mean of the per-byte confidences.
    pub overall: u8,
}

impl VotedData {
    pub fn weak_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.weak.iter().enumerate().filter(|(_, w)| **w).map(|(i, _)| i)
    }
}

#[derive(Copy, Clone)]
struct Tally {
    value: u8,
    count: usize,
    /// Sum of the quality scores of the passes that read `value`.
    quality: usize,
}

impl Tally {
    /// Order by count, then by summed quality.
    fn support(&self) -> (usize, usize) {
        (self.count, self.quality)
    }
}

/// Tally a single byte offset. Returns (value, count, participating, alternates).
///
/// Each pass counts as one vote. When two values have the same count, the one read by the
/// passes with the higher summed quality wins, and after that the value seen first.
fn tally(passes: &[RecoveryPass], offset: usize) -> (u8, usize, usize, Vec<u8>) {
    // In order of first appearance.
    let mut counts: Vec<Tally> = Vec::with_capacity(4);
    let mut participating = 0;

    for pass in passes {
        if let Some(&value) = pass.data.get(offset) {
            participating += 1;
            match counts.iter_mut().find(|t| t.value == value) {
                Some(t) => {
                    t.count += 1;
                    t.quality += pass.quality as usize;
                }
                None => counts.push(Tally {
                    value,
                    count: 1,
                    quality: pass.quality as usize,
                }),
            }
        }
    }

    let mut winner = 0;
    for (i, t) in counts.iter().enumerate() {
        // Strictly greater, so full ties go to the value seen first.
        if t.support() > counts[winner].support() {
            winner = i;
        }
    }
    let (value, count) = counts.get(winner).map(|t| (t.value, t.count)).unwrap_or((0, 0));

    let mut losers: Vec<Tally> = counts
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != winner)
        .map(|(_, t)| *t)
        .collect();
    // Stable sort keeps first-seen order among equal support.
    losers.sort_by(|a, b| b.support().cmp(&a.support()));

    (value, count, participating, losers.into_iter().map(|t| t.value).collect())
}

/// Vote across passes byte by byte. Passes may differ in length; each offset is decided by the
/// passes that reach it. The result is as long as the longest pass.
pub fn vote_bytes(passes: &[RecoveryPass]) -> VotedData {
    let len = passes.iter().map(|p| p.len()).max().unwrap_or(0);
    let mut voted = VotedData {
        data: Vec::with_capacity(len),
        confidence: Vec::with_capacity(len),
        weak: Vec::with_capacity(len),
        alternates: Vec::new(),
        overall: 0,
    };

    let mut confidence_sum = 0usize;
    for offset in 0..len {
        let (value, count, participating, alternates) = tally(passes, offset);
        let confidence = (count * 100 / participating.max(1)) as u8;
        let weak = count < participating;

        voted.data.push(value);
        voted.confidence.push(confidence);
        voted.weak.push(weak);
        if weak {
            voted.alternates.push((offset, alternates));
        }
        confidence_sum += confidence as usize;
    }

    if len > 0 {
        voted.overall = (confidence_sum / len) as u8;
    }
    voted
}

/// Vote across decoded revolutions bit by bit, aligned at the first bitcell. The result is as
/// long as the longest revolution.
pub fn vote_bits(revolutions: &[DecodedRevolution]) -> Vec<BitCell> {
    let len = revolutions.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut cells = Vec::with_capacity(len);

    for i in 0..len {
        let mut ones = 0u16;
        let mut zeros = 0u16;
        let mut first = None;
        let mut min_time = f32::MAX;
        let mut max_time = f32::MIN;

        for revolution in revolutions {
            let Some(bit) = revolution.bits.get(i)
            else {
                continue;
            };
            if first.is_none() {
                first = Some(bit);
            }
            if bit {
                ones += 1;
            }
            else {
                zeros += 1;
            }
            if let Some(&t) = revolution.bit_times.get(i) {
                min_time = min_time.min(t);
                max_time = max_time.max(t);
            }
        }

        let participating = ones + zeros;
        let value = match ones.cmp(&zeros) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => first.unwrap_or(false),
        };
        let agreeing = ones.max(zeros);
        let confidence = (agreeing as usize * 100 / participating.max(1) as usize) as u8;

        let class = match (ConfidenceBand::from(confidence), value) {
            (_, _) if ones == zeros => BitClass::Ambiguous,
            (ConfidenceBand::Strong, true) => BitClass::Strong1,
            (ConfidenceBand::Strong, false) => BitClass::Strong0,
            (ConfidenceBand::Weak, true) => BitClass::Weak1,
            (ConfidenceBand::Weak, false) => BitClass::Weak0,
            (ConfidenceBand::Ambiguous, _) => BitClass::Ambiguous,
        };

        cells.push(BitCell {
            value,
            confidence,
            transitions: ones,
            timing_spread: if max_time >= min_time { max_time - min_time } else { 0.0 },
            class,
        });
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiskCh;
    use bit_vec::BitVec;

    fn pass(data: &[u8]) -> RecoveryPass {
        RecoveryPass::new(data.to_vec(), 100, false)
    }

    #[test]
    fn majority_with_one_dissent() {
        let voted = vote_bytes(&[pass(&[0xAA, 0xBB, 0xCC]), pass(&[0xAA, 0xBB, 0xCC]), pass(&[0xAA, 0xBB, 0xFF])]);
        assert_eq!(voted.data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(voted.confidence, vec![100, 100, 66]);
        assert_eq!(voted.weak_offsets().collect::<Vec<_>>(), vec![2]);
        assert_eq!(voted.alternates, vec![(2, vec![0xFF])]);
        assert!(voted.overall >= 75);
    }

    #[test]
    fn ties_go_to_first_seen() {
        let voted = vote_bytes(&[pass(&[0x01]), pass(&[0x02]), pass(&[0x02]), pass(&[0x01])]);
        assert_eq!(voted.data, vec![0x01]);
        assert_eq!(voted.confidence, vec![50]);
    }

    #[test]
    fn ties_go_to_higher_quality() {
        let voted = vote_bytes(&[
            RecoveryPass::new(vec![0x01, 0x10], 40, false),
            RecoveryPass::new(vec![0x02, 0x10], 90, false),
        ]);
        assert_eq!(voted.data, vec![0x02, 0x10]);
        assert_eq!(voted.confidence, vec![50, 100]);
        assert_eq!(voted.alternates, vec![(0, vec![0x01])]);

        // Quality never outweighs a majority.
        let voted = vote_bytes(&[
            RecoveryPass::new(vec![0x01], 10, false),
            RecoveryPass::new(vec![0x01], 10, false),
            RecoveryPass::new(vec![0x02], 100, false),
        ]);
        assert_eq!(voted.data, vec![0x01]);
    }

    #[test]
    fn ragged_passes() {
        let voted = vote_bytes(&[pass(&[1, 2, 3, 4]), pass(&[1, 2]), pass(&[1, 9, 3])]);
        assert_eq!(voted.data, vec![1, 2, 3, 4]);
        // The last offset is decided by a single pass.
        assert_eq!(voted.confidence[3], 100);
        assert!(!voted.weak[3]);
        assert!(voted.weak[1]);
    }

    #[test]
    fn bit_classes() {
        let revs: Vec<_> = ["1100", "1010", "1001"]
            .iter()
            .map(|s| {
                let bits: BitVec = s.chars().map(|c| c == '1').collect();
                DecodedRevolution::from_bits(DiskCh::default(), bits, 2000.0)
            })
            .collect();
        let cells = vote_bits(&revs);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].class, BitClass::Strong1);
        assert_eq!(cells[0].transitions, 3);
        // Two of three agree: 66%.
        assert_eq!(cells[1].class, BitClass::Weak0);
        assert!(!cells[1].value);
        assert_eq!(cells[1].confidence, 66);

        let cells = vote_bits(&revs[..2]);
        assert_eq!(cells[1].class, BitClass::Ambiguous);
        assert!(cells[1].value);
    }
}
