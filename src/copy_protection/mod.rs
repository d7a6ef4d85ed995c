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

    src/copy_protection/mod.rs

    Copy protection analysis. Evidence sources inspect decoded tracks and
    their timing, and the analyzer ranks what they report.
*/

//! Protection schemes leave traces that a normal disk duplicator cannot reproduce: tracks that
//! are longer or shorter than the drive writes, bits that read differently on every revolution,
//! malformed syncs and sector IDs, and regions recorded at a deliberately altered bit rate.
//!
//! Each kind of trace is examined by an [EvidenceSource]. A [ProtectionAnalyzer] owns a set of
//! sources, runs each of them over an [AnalysisContext], and returns the combined evidence
//! sorted from strongest to weakest.

mod anomalies;
pub mod copylock;
pub mod speedlock;
mod track_length;
mod weak_region;

pub use anomalies::SectorAnomalySource;
pub use copylock::{CopyLockInfo, CopyLockSource, CopyLockVariant, Lfsr};
pub use speedlock::{SpeedlockInfo, SpeedlockParams, SpeedlockSource};
pub use track_length::TrackLengthSource;
pub use weak_region::WeakRegionSource;

use crate::{
    bounded::BoundedVec,
    config::AnalyzerConfig,
    flux::DecodedRevolution,
    recovery::TrackRecovery,
    track::{SectorRecord, TrackRecord},
    track_schema::TrackScan,
    types::{DiskCh, DiskChsn, DiskRpm, TrackDataEncoding, TrackDensity, TrackRegion},
    SiftError,
};
use dyn_clone::{clone_trait_object, DynClone};
use std::fmt::{self, Display, Formatter};

/// The kind of protection a piece of evidence points to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtectionScheme {
    CopyLock,
    Speedlock,
    LongTrack,
    ShortTrack,
    WeakBits,
    DuplicateSectorId,
    NonStandardSync,
    MissingSectors,
}

impl Display for ProtectionScheme {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ProtectionScheme::CopyLock => write!(f, "Rob Northen CopyLock"),
            ProtectionScheme::Speedlock => write!(f, "Speedlock"),
            ProtectionScheme::LongTrack => write!(f, "Long track"),
            ProtectionScheme::ShortTrack => write!(f, "Short track"),
            ProtectionScheme::WeakBits => write!(f, "Weak bits"),
            ProtectionScheme::DuplicateSectorId => write!(f, "Duplicate sector ID"),
            ProtectionScheme::NonStandardSync => write!(f, "Non-standard sync"),
            ProtectionScheme::MissingSectors => write!(f, "Missing sectors"),
        }
    }
}

/// How sure a source is that its evidence indicates the named scheme.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfidenceTier {
    Certain,
    Likely,
    Possible,
}

impl Display for ConfidenceTier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ConfidenceTier::Certain => write!(f, "certain"),
            ConfidenceTier::Likely => write!(f, "likely"),
            ConfidenceTier::Possible => write!(f, "possible"),
        }
    }
}

/// Where on the disk a piece of evidence was found.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvidenceLocation {
    pub ch: DiskCh,
    pub sector: Option<DiskChsn>,
    /// Bitcell range within the first revolution.
    pub bits: Option<TrackRegion>,
}

impl EvidenceLocation {
    pub fn track(ch: DiskCh) -> Self {
        EvidenceLocation {
            ch,
            sector: None,
            bits: None,
        }
    }
}

/// Scheme-specific details carried by a piece of evidence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvidencePayload {
    TrackLength {
        bit_len: usize,
        nominal: usize,
        /// Deviation from nominal, in percent. Negative for short tracks.
        deviation: f64,
    },
    WeakSpans {
        spans: Vec<TrackRegion>,
        differing_bytes: usize,
        compared_bytes: usize,
    },
    Sectors(Vec<DiskChsn>),
    MissingIds(Vec<u8>),
    Speedlock(SpeedlockInfo),
    CopyLock(CopyLockInfo),
}

/// A single finding from an evidence source. Evidence is immutable once emitted.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtectionEvidence {
    pub scheme: ProtectionScheme,
    /// Confidence, 0-100.
    pub confidence: u8,
    pub tier: ConfidenceTier,
    pub location: EvidenceLocation,
    pub payload: EvidencePayload,
}

impl Display for ProtectionEvidence {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {}%)",
            self.location.ch, self.scheme, self.tier, self.confidence
        )?;
        if let Some(sector) = self.location.sector {
            write!(f, " sector {}", sector)?;
        }
        if let Some(bits) = self.location.bits {
            write!(f, " bits {}", bits)?;
        }
        Ok(())
    }
}

/// The expected sector layout of a track, used to spot missing sectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpectedLayout {
    pub sector_ct: u8,
    pub first_id: u8,
}

/// Everything an evidence source may inspect about one track.
#[derive(Clone, Debug)]
pub struct AnalysisContext<'a> {
    pub ch: DiskCh,
    pub encoding: TrackDataEncoding,
    pub rpm: DiskRpm,
    /// Density of the track. When `None` it is inferred from the revolutions' bitcell period.
    pub density: Option<TrackDensity>,
    pub revolutions: &'a [DecodedRevolution],
    pub scans: &'a [TrackScan],
    pub track: Option<&'a TrackRecord>,
    pub expected: Option<ExpectedLayout>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        ch: DiskCh,
        encoding: TrackDataEncoding,
        revolutions: &'a [DecodedRevolution],
        scans: &'a [TrackScan],
    ) -> Self {
        AnalysisContext {
            ch,
            encoding,
            rpm: DiskRpm::default(),
            density: None,
            revolutions,
            scans,
            track: None,
            expected: None,
        }
    }

    /// Build a context over the results of a track recovery.
    pub fn from_recovery(recovery: &'a TrackRecovery) -> Self {
        AnalysisContext {
            track: Some(&recovery.track),
            ..AnalysisContext::new(
                recovery.track.ch(),
                recovery.track.encoding(),
                &recovery.revolutions,
                &recovery.scans,
            )
        }
    }

    pub fn with_rpm(mut self, rpm: DiskRpm) -> Self {
        self.rpm = rpm;
        self
    }

    pub fn with_density(mut self, density: TrackDensity) -> Self {
        self.density = Some(density);
        self
    }

    pub fn with_expected_layout(mut self, layout: ExpectedLayout) -> Self {
        self.expected = Some(layout);
        self
    }

    /// The sectors of the track: the recovered record's if there is one, otherwise the first
    /// scan's.
    pub fn sectors(&self) -> &[SectorRecord] {
        match (self.track, self.scans.first()) {
            (Some(track), _) => track.sectors(),
            (None, Some(scan)) => &scan.sectors,
            (None, None) => &[],
        }
    }

    /// The track density, given or inferred.
    pub fn density(&self) -> Option<TrackDensity> {
        self.density.or_else(|| {
            self.revolutions
                .first()
                .and_then(|r| TrackDensity::from_base_clock_ns(r.nominal_bitcell_ns))
        })
    }

    /// The nominal number of bitcells on a track of this density.
    pub fn nominal_bitcells(&self) -> Option<usize> {
        self.density().map(|d| d.bitcells(Some(self.rpm)))
    }

    /// The measured track length: the mean revolution length, or the track record's length.
    pub fn bit_len(&self) -> Option<usize> {
        if !self.revolutions.is_empty() {
            Some(self.revolutions.iter().map(|r| r.len()).sum::<usize>() / self.revolutions.len())
        }
        else {
            self.track.map(|t| t.bit_len()).filter(|len| *len > 0)
        }
    }
}

/// A detector for one kind of protection evidence.
pub trait EvidenceSource: DynClone + Send + Sync {
    /// A short, stable name for the source.
    fn name(&self) -> &'static str;
    /// Examine a track and return any evidence found. Sources never fail; a track they cannot
    /// judge simply yields no evidence.
    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence>;
}

clone_trait_object!(EvidenceSource);

/// Runs a registry of [EvidenceSource]s over tracks and ranks their findings.
#[derive(Clone)]
pub struct ProtectionAnalyzer {
    sources: Vec<Box<dyn EvidenceSource>>,
    evidence_capacity: usize,
}

impl ProtectionAnalyzer {
    /// Create an analyzer with every built-in source registered.
    pub fn new(config: AnalyzerConfig) -> Result<Self, SiftError> {
        config.validate()?;
        let mut analyzer = ProtectionAnalyzer::empty(config.evidence_capacity);
        analyzer.register(Box::new(TrackLengthSource::new(config.track_length_tolerance)));
        analyzer.register(Box::new(WeakRegionSource::new(config.weak_max_fraction)));
        analyzer.register(Box::new(SectorAnomalySource::new(config.min_sync_mfm, config.min_sync_fm)));
        analyzer.register(Box::new(SpeedlockSource::new(config.speedlock)));
        analyzer.register(Box::new(CopyLockSource::new(config.copylock_timing_tolerance)));
        Ok(analyzer)
    }

    /// Create an analyzer with no sources.
    pub fn empty(evidence_capacity: usize) -> Self {
        ProtectionAnalyzer {
            sources: Vec::new(),
            evidence_capacity,
        }
    }

    pub fn register(&mut self, source: Box<dyn EvidenceSource>) -> &mut Self {
        log::trace!("ProtectionAnalyzer::register(): Registered source '{}'", source.name());
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run every source over a track. Evidence is returned in descending order of confidence,
    /// ties broken by scheme, then location. More evidence than the configured capacity is an
    /// error.
    pub fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<ProtectionEvidence>, SiftError> {
        let mut evidence: Vec<ProtectionEvidence> = self.sources.iter().flat_map(|s| s.analyze(ctx)).collect();

        evidence.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(a.scheme.cmp(&b.scheme))
                .then(a.tier.cmp(&b.tier))
                .then(a.location.bits.map(|r| r.start).cmp(&b.location.bits.map(|r| r.start)))
        });

        let mut bounded = BoundedVec::new(self.evidence_capacity, "evidence entries");
        for item in evidence {
            bounded.push(item)?;
        }

        log::debug!(
            "ProtectionAnalyzer::analyze(): Track {}: {} evidence entries",
            ctx.ch,
            bounded.len()
        );
        Ok(bounded.into_vec())
    }

    /// Analyze a track recovery and return its track record with the evidence attached.
    pub fn analyze_recovery(&self, recovery: &TrackRecovery, rpm: DiskRpm) -> Result<TrackRecord, SiftError> {
        let ctx = AnalysisContext::from_recovery(recovery).with_rpm(rpm);
        let evidence = self.analyze(&ctx)?;
        Ok(recovery.track.clone().with_evidence(evidence))
    }

    /// Analyze several tracks, on the worker pool when the `parallel` feature is enabled.
    /// Results are in the same order as `contexts`.
    pub fn analyze_tracks(&self, contexts: &[AnalysisContext]) -> Result<Vec<Vec<ProtectionEvidence>>, SiftError> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            contexts.par_iter().map(|ctx| self.analyze(ctx)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            contexts.iter().map(|ctx| self.analyze(ctx)).collect()
        }
    }
}

/// Map a confidence value to the tier used by sources that grade on a sliding scale.
pub(crate) fn tier_for(confidence: u8) -> ConfidenceTier {
    match confidence {
        90.. => ConfidenceTier::Certain,
        70..=89 => ConfidenceTier::Likely,
        _ => ConfidenceTier::Possible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FixedSource(Vec<(ProtectionScheme, u8)>);

    impl EvidenceSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
            self.0
                .iter()
                .map(|(scheme, confidence)| ProtectionEvidence {
                    scheme: *scheme,
                    confidence: *confidence,
                    tier: tier_for(*confidence),
                    location: EvidenceLocation::track(ctx.ch),
                    payload: EvidencePayload::Sectors(Vec::new()),
                })
                .collect()
        }
    }

    #[test]
    fn results_are_ranked() {
        let mut analyzer = ProtectionAnalyzer::empty(8);
        analyzer.register(Box::new(FixedSource(vec![
            (ProtectionScheme::WeakBits, 60),
            (ProtectionScheme::LongTrack, 90),
        ])));
        analyzer.register(Box::new(FixedSource(vec![(ProtectionScheme::CopyLock, 60)])));

        let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &[], &[]);
        let evidence = analyzer.analyze(&ctx).unwrap();
        let schemes: Vec<_> = evidence.iter().map(|e| e.scheme).collect();
        assert_eq!(
            schemes,
            vec![ProtectionScheme::LongTrack, ProtectionScheme::CopyLock, ProtectionScheme::WeakBits]
        );
    }

    #[test]
    fn evidence_capacity_is_enforced() {
        let mut analyzer = ProtectionAnalyzer::empty(2);
        analyzer.register(Box::new(FixedSource(vec![(ProtectionScheme::WeakBits, 50); 3])));
        let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &[], &[]);
        assert!(matches!(
            analyzer.analyze(&ctx),
            Err(SiftError::CapacityExceeded { limit: 2, .. })
        ));
    }

    #[test]
    fn default_registry() {
        let analyzer = ProtectionAnalyzer::new(AnalyzerConfig::default()).unwrap();
        assert_eq!(
            analyzer.source_names(),
            vec!["track_length", "weak_region", "sector_anomaly", "speedlock", "copylock"]
        );
        let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &[], &[]);
        assert!(analyzer.analyze(&ctx).unwrap().is_empty());
    }
}
