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

    src/copy_protection/anomalies.rs

    Sector-level anomalies: short or malformed syncs, repeated sector IDs,
    and sectors absent from the expected layout.
*/
use super::{
    tier_for,
    AnalysisContext,
    ConfidenceTier,
    EvidenceLocation,
    EvidencePayload,
    EvidenceSource,
    ProtectionEvidence,
    ProtectionScheme,
};
use crate::types::{DiskChsn, SectorCondition, TrackDataEncoding};

/// Reports one aggregated piece of evidence per anomaly kind found on a track.
#[derive(Clone, Debug)]
pub struct SectorAnomalySource {
    min_sync_mfm: usize,
    min_sync_fm: usize,
}

impl SectorAnomalySource {
    pub fn new(min_sync_mfm: usize, min_sync_fm: usize) -> Self {
        SectorAnomalySource {
            min_sync_mfm,
            min_sync_fm,
        }
    }

    fn min_sync(&self, encoding: TrackDataEncoding) -> usize {
        match encoding {
            TrackDataEncoding::Fm => self.min_sync_fm,
            _ => self.min_sync_mfm,
        }
    }
}

fn sector_evidence(
    ctx: &AnalysisContext,
    scheme: ProtectionScheme,
    confidence: u8,
    tier: ConfidenceTier,
    ids: Vec<DiskChsn>,
) -> ProtectionEvidence {
    ProtectionEvidence {
        scheme,
        confidence,
        tier,
        location: EvidenceLocation {
            ch: ctx.ch,
            sector: ids.first().copied(),
            bits: None,
        },
        payload: EvidencePayload::Sectors(ids),
    }
}

impl EvidenceSource for SectorAnomalySource {
    fn name(&self) -> &'static str {
        "sector_anomaly"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
        let sectors = ctx.sectors();
        let mut evidence = Vec::new();

        let min_sync = self.min_sync(ctx.encoding);
        let odd_sync: Vec<DiskChsn> = sectors
            .iter()
            .filter(|s| {
                s.sync_len < min_sync || s.has(SectorCondition::WeakSync) || s.has(SectorCondition::UnusualMark)
            })
            .map(|s| s.id)
            .collect();
        if !odd_sync.is_empty() {
            let confidence = (55 + odd_sync.len() * 10).min(85) as u8;
            let tier = if odd_sync.len() > 1 {
                ConfidenceTier::Likely
            }
            else {
                ConfidenceTier::Possible
            };
            log::debug!(
                "SectorAnomalySource::analyze(): Track {}: {} sector(s) with non-standard sync or mark",
                ctx.ch,
                odd_sync.len()
            );
            evidence.push(sector_evidence(
                ctx,
                ProtectionScheme::NonStandardSync,
                confidence,
                tier,
                odd_sync,
            ));
        }

        let duplicates: Vec<DiskChsn> = sectors
            .iter()
            .filter(|s| s.has(SectorCondition::DuplicateId))
            .map(|s| s.id)
            .collect();
        if !duplicates.is_empty() {
            log::debug!(
                "SectorAnomalySource::analyze(): Track {}: {} duplicate sector ID(s)",
                ctx.ch,
                duplicates.len()
            );
            evidence.push(sector_evidence(
                ctx,
                ProtectionScheme::DuplicateSectorId,
                85,
                ConfidenceTier::Likely,
                duplicates,
            ));
        }

        if let Some(layout) = ctx.expected {
            let missing: Vec<u8> = (0..layout.sector_ct)
                .map(|i| layout.first_id.wrapping_add(i))
                .filter(|id| !sectors.iter().any(|s| s.id.s() == *id))
                .collect();
            if !missing.is_empty() {
                let confidence = (50 + missing.len() * 10).min(80) as u8;
                evidence.push(ProtectionEvidence {
                    scheme: ProtectionScheme::MissingSectors,
                    confidence,
                    tier: tier_for(confidence),
                    location: EvidenceLocation::track(ctx.ch),
                    payload: EvidencePayload::MissingIds(missing),
                });
            }
        }

        evidence
    }
}
