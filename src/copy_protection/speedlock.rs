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

    src/copy_protection/speedlock.rs

    Speedlock detection. Speedlock writes a stretch of a track with a
    lengthened bitcell, followed by a stretch with a shortened one, before
    timing returns to normal. A copy written at a constant rate loses both.
*/

//! Detection works on per-cell timing. A baseline period is measured at the start of the
//! revolution, a moving average is run across the rest, and regions where the average rises
//! past `long_threshold` (or falls below `short_threshold`) of the baseline are located and
//! refined to cell precision. A revolution is only reported when a long region is followed by
//! a short region and the timing after the short region is back within the normal band.

use super::{
    AnalysisContext,
    ConfidenceTier,
    EvidenceLocation,
    EvidencePayload,
    EvidenceSource,
    ProtectionEvidence,
    ProtectionScheme,
};
use crate::{
    config::{check_f64, check_range},
    flux::DecodedRevolution,
    types::TrackRegion,
    SiftError,
};

/// Detection parameters. Ratios are given relative to the baseline period; the expected
/// ratios and their tolerance are in percent.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedlockParams {
    /// Cells at the start of the revolution averaged to obtain the baseline period.
    pub baseline_cells: usize,
    /// Largest accepted deviation of the baseline from the nominal period, as a fraction.
    pub baseline_tolerance: f64,
    pub long_threshold: f64,
    pub short_threshold: f64,
    /// Window averages within this range are considered normal timing.
    pub normal_min: f64,
    pub normal_max: f64,
    /// Moving average window, in cells.
    pub window: usize,
    /// Expected first cell of the long region.
    pub expected_long_start: usize,
    pub position_tolerance: usize,
    /// Expected length of each region, in cells. Bounds the search for the short region.
    pub expected_region_len: usize,
    pub expected_long_ratio: f64,
    pub expected_short_ratio: f64,
    pub ratio_tolerance: f64,
}

impl Default for SpeedlockParams {
    fn default() -> Self {
        SpeedlockParams {
            baseline_cells: 2000,
            baseline_tolerance: 0.25,
            long_threshold: 1.05,
            short_threshold: 0.95,
            normal_min: 0.97,
            normal_max: 1.03,
            window: 32,
            expected_long_start: 78048,
            position_tolerance: 5000,
            expected_region_len: 1920,
            expected_long_ratio: 110.0,
            expected_short_ratio: 90.0,
            ratio_tolerance: 5.0,
        }
    }
}

impl SpeedlockParams {
    pub fn validate(&self) -> Result<(), SiftError> {
        check_range("speedlock.baseline_cells", self.baseline_cells, 64, 100_000, "64-100000")?;
        check_range("speedlock.window", self.window, 4, 1024, "4-1024")?;
        check_f64(
            "speedlock.baseline_tolerance",
            self.baseline_tolerance,
            0.0,
            1.0,
            "0.0 < baseline_tolerance <= 1.0",
        )?;
        check_f64("speedlock.long_threshold", self.long_threshold, 1.0, 2.0, "1.0 < long_threshold <= 2.0")?;
        check_f64("speedlock.short_threshold", self.short_threshold, 0.0, 1.0, "0.0 < short_threshold <= 1.0")?;
        if self.normal_min > self.normal_max
            || self.normal_min <= self.short_threshold
            || self.normal_max >= self.long_threshold
        {
            return Err(SiftError::ConfigError {
                field: "speedlock.normal_min",
                value: format!("{}-{}", self.normal_min, self.normal_max),
                expected: "short_threshold < normal_min <= normal_max < long_threshold",
            });
        }
        check_f64("speedlock.ratio_tolerance", self.ratio_tolerance, 0.0, 50.0, "0.0 < ratio_tolerance <= 50.0")?;
        Ok(())
    }
}

/// What was found on a Speedlock track.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedlockInfo {
    pub revolution: usize,
    pub baseline_ns: f64,
    pub long_region: TrackRegion,
    /// Average period of the long region, in percent of the baseline.
    pub long_ratio: f64,
    pub short_region: TrackRegion,
    /// Average period of the short region, in percent of the baseline.
    pub short_ratio: f64,
    /// The long region starts within `position_tolerance` of the expected cell.
    pub position_valid: bool,
}

impl SpeedlockInfo {
    fn long_matches(&self, params: &SpeedlockParams) -> bool {
        (self.long_ratio - params.expected_long_ratio).abs() <= params.ratio_tolerance
    }

    fn short_matches(&self, params: &SpeedlockParams) -> bool {
        (self.short_ratio - params.expected_short_ratio).abs() <= params.ratio_tolerance
    }

    /// Grade a complete detection by how well its position and ratios fit the parameters.
    fn grade(&self, params: &SpeedlockParams) -> (ConfidenceTier, u8) {
        let long = self.long_matches(params);
        let short = self.short_matches(params);
        if self.position_valid && long && short {
            (ConfidenceTier::Certain, 95)
        }
        else if long || short || self.position_valid {
            (ConfidenceTier::Likely, 75)
        }
        else {
            (ConfidenceTier::Possible, 50)
        }
    }
}

/// Moving window averages over a revolution's cell times, via prefix sums.
struct TimingWindow<'a> {
    times: &'a [f32],
    prefix: Vec<f64>,
    window: usize,
    baseline: f64,
}

impl<'a> TimingWindow<'a> {
    fn new(times: &'a [f32], window: usize, baseline: f64) -> Self {
        let mut prefix = Vec::with_capacity(times.len() + 1);
        prefix.push(0.0);
        let mut sum = 0.0;
        for t in times {
            sum += *t as f64;
            prefix.push(sum);
        }
        TimingWindow {
            times,
            prefix,
            window,
            baseline,
        }
    }

    fn last_start(&self) -> usize {
        self.times.len().saturating_sub(self.window)
    }

    fn mean(&self, start: usize, end: usize) -> f64 {
        (self.prefix[end] - self.prefix[start]) / (end - start) as f64
    }

    /// Window average starting at `start`, relative to the baseline.
    fn ratio(&self, start: usize) -> f64 {
        self.mean(start, start + self.window) / self.baseline
    }

    fn cell_ratio(&self, cell: usize) -> f64 {
        self.times[cell] as f64 / self.baseline
    }

    /// Find the first region within windows starting in `from..to` whose average passes
    /// `test`, refined to the first and last passing cells.
    fn find_region(&self, from: usize, to: usize, test: impl Fn(f64) -> bool) -> Option<TrackRegion> {
        let to = to.min(self.last_start() + 1);
        let first = (from..to).find(|i| test(self.ratio(*i)))?;

        let mut last = first;
        while last < self.last_start() && test(self.ratio(last + 1)) {
            last += 1;
        }

        let start = (first..first + self.window)
            .find(|c| test(self.cell_ratio(*c)))
            .unwrap_or(first);
        let end = (last..last + self.window)
            .rev()
            .find(|c| test(self.cell_ratio(*c)))
            .map(|c| c + 1)
            .unwrap_or(last + self.window);

        (end > start).then(|| TrackRegion::new(start, end))
    }
}

/// Detects Speedlock timing regions in each revolution and reports the strongest.
#[derive(Clone, Debug)]
pub struct SpeedlockSource {
    params: SpeedlockParams,
}

impl SpeedlockSource {
    pub fn new(params: SpeedlockParams) -> Self {
        SpeedlockSource { params }
    }

    /// Examine one revolution. Returns `None` unless a long region, a short region and a
    /// return to normal timing are all found in that order.
    pub fn detect(&self, rev: &DecodedRevolution) -> Option<SpeedlockInfo> {
        let p = &self.params;
        let times = &rev.bit_times;
        if times.len() < p.baseline_cells + p.window * 2 {
            return None;
        }

        let baseline = rev.average_time(0, p.baseline_cells)?;
        if rev.nominal_bitcell_ns > 0.0
            && ((baseline / rev.nominal_bitcell_ns) - 1.0).abs() > p.baseline_tolerance
        {
            log::debug!(
                "SpeedlockSource::detect(): Baseline {:.1}ns too far from nominal {:.1}ns",
                baseline,
                rev.nominal_bitcell_ns
            );
            return None;
        }

        let timing = TimingWindow::new(times, p.window, baseline);
        let long_region = timing.find_region(p.baseline_cells, times.len(), |r| r >= p.long_threshold)?;
        let long_ratio = timing.mean(long_region.start, long_region.end) / baseline * 100.0;

        let Some(short_region) = timing.find_region(
            long_region.end,
            long_region.end + p.expected_region_len,
            |r| r <= p.short_threshold,
        )
        else {
            log::trace!(
                "SpeedlockSource::detect(): Revolution {}: long region {} has no short region",
                rev.index,
                long_region
            );
            return None;
        };
        let short_ratio = timing.mean(short_region.start, short_region.end) / baseline * 100.0;

        let tail = short_region.end;
        let returns_to_normal = tail <= timing.last_start() && {
            let r = timing.ratio(tail);
            r >= p.normal_min && r <= p.normal_max
        };
        if !returns_to_normal {
            log::trace!(
                "SpeedlockSource::detect(): Revolution {}: timing stays abnormal after {}",
                rev.index,
                short_region
            );
            return None;
        }

        let position_valid = long_region.start.abs_diff(p.expected_long_start) <= p.position_tolerance;

        Some(SpeedlockInfo {
            revolution: rev.index,
            baseline_ns: baseline,
            long_region,
            long_ratio,
            short_region,
            short_ratio,
            position_valid,
        })
    }
}

impl EvidenceSource for SpeedlockSource {
    fn name(&self) -> &'static str {
        "speedlock"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
        let best = ctx
            .revolutions
            .iter()
            .filter_map(|rev| self.detect(rev))
            .map(|info| {
                let (tier, confidence) = info.grade(&self.params);
                (tier, confidence, info)
            })
            .fold(None, |best: Option<(ConfidenceTier, u8, SpeedlockInfo)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });

        let Some((tier, confidence, info)) = best else {
            return Vec::new();
        };

        log::debug!(
            "SpeedlockSource::analyze(): Track {}: long region {} at {:.1}%, short region {} at {:.1}%",
            ctx.ch,
            info.long_region,
            info.long_ratio,
            info.short_region,
            info.short_ratio
        );

        let end = info.short_region.end;
        vec![ProtectionEvidence {
            scheme: ProtectionScheme::Speedlock,
            confidence,
            tier,
            location: EvidenceLocation {
                ch: ctx.ch,
                sector: None,
                bits: Some(TrackRegion::new(info.long_region.start, end)),
            },
            payload: EvidencePayload::Speedlock(info),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiskCh, TrackDataEncoding};
    use bit_vec::BitVec;

    fn timed_revolution(regions: &[(usize, usize, f32)]) -> DecodedRevolution {
        let mut rev = DecodedRevolution::from_bits(DiskCh::new(0, 0), BitVec::from_elem(100_000, false), 2000.0);
        for (start, len, time) in regions {
            for t in &mut rev.bit_times[*start..*start + *len] {
                *t = *time;
            }
        }
        rev
    }

    fn analyze(revs: &[DecodedRevolution]) -> Vec<ProtectionEvidence> {
        let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs, &[]);
        SpeedlockSource::new(SpeedlockParams::default()).analyze(&ctx)
    }

    #[test]
    fn classic_layout_is_certain() {
        let revs = vec![timed_revolution(&[(78048, 1920, 2200.0), (79968, 1920, 1800.0)])];
        let evidence = analyze(&revs);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
        assert_eq!(evidence[0].confidence, 95);
        match &evidence[0].payload {
            EvidencePayload::Speedlock(info) => {
                assert_eq!(info.long_region, TrackRegion::new(78048, 79968));
                assert_eq!(info.short_region, TrackRegion::new(79968, 81888));
                assert!((info.long_ratio - 110.0).abs() < 0.01);
                assert!((info.short_ratio - 90.0).abs() < 0.01);
                assert_eq!(evidence[0].location.bits, Some(TrackRegion::new(78048, 81888)));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn long_region_alone_yields_nothing() {
        let revs = vec![timed_revolution(&[(78048, 1920, 2200.0)])];
        assert!(analyze(&revs).is_empty());
    }

    #[test]
    fn short_region_without_return_to_normal_yields_nothing() {
        let revs = vec![timed_revolution(&[
            (78048, 1920, 2200.0),
            (79968, 1920, 1800.0),
            (81888, 4000, 2200.0),
        ])];
        assert!(analyze(&revs).is_empty());
    }

    #[test]
    fn short_region_before_long_yields_nothing() {
        let revs = vec![timed_revolution(&[(76128, 1920, 1800.0), (78048, 1920, 2200.0)])];
        assert!(analyze(&revs).is_empty());
    }

    #[test]
    fn misplaced_pattern_is_likely() {
        let revs = vec![timed_revolution(&[(30000, 1920, 2200.0), (31920, 1920, 1800.0)])];
        let evidence = analyze(&revs);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Likely);
        assert_eq!(evidence[0].confidence, 75);
    }

    #[test]
    fn odd_ratios_elsewhere_are_possible() {
        let revs = vec![timed_revolution(&[(30000, 1920, 2600.0), (31920, 1920, 1500.0)])];
        let evidence = analyze(&revs);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Possible);
    }

    #[test]
    fn strongest_revolution_wins() {
        let revs = vec![
            timed_revolution(&[(30000, 1920, 2600.0), (31920, 1920, 1500.0)]),
            timed_revolution(&[(78048, 1920, 2200.0), (79968, 1920, 1800.0)]),
        ];
        let evidence = analyze(&revs);
        assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
    }

    #[test]
    fn constant_timing_yields_nothing() {
        assert!(analyze(&[timed_revolution(&[])]).is_empty());
    }

    #[test]
    fn default_params_are_valid() {
        assert!(SpeedlockParams::default().validate().is_ok());
    }
}
