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

    src/copy_protection/weak_region.rs

    Finds regions that decode differently on each revolution.
*/
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
    bitstream_codec::{decode_bytes, mfm::MFM_BYTE_LEN},
    types::TrackRegion,
};

/// Compares revolutions byte by byte after aligning them on their first address mark.
///
/// Differences are only credible in moderation; when more than `max_fraction` of the compared
/// bytes differ the revolutions are assumed to be misaligned and nothing is reported.
#[derive(Clone, Debug)]
pub struct WeakRegionSource {
    max_fraction: f64,
}

impl WeakRegionSource {
    pub fn new(max_fraction: f64) -> Self {
        WeakRegionSource { max_fraction }
    }

    fn align(ctx: &AnalysisContext, rev: usize) -> usize {
        ctx.scans.get(rev).and_then(|scan| scan.first_marker()).unwrap_or(0)
    }
}

impl EvidenceSource for WeakRegionSource {
    fn name(&self) -> &'static str {
        "weak_region"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
        if ctx.revolutions.len() < 2 {
            return Vec::new();
        }

        let decoded: Vec<(usize, Vec<u8>)> = ctx
            .revolutions
            .iter()
            .enumerate()
            .map(|(i, rev)| {
                let offset = Self::align(ctx, i).min(rev.len());
                (offset, decode_bytes(&rev.bits, offset, (rev.len() - offset) / MFM_BYTE_LEN))
            })
            .collect();

        let compared = decoded.iter().map(|(_, bytes)| bytes.len()).min().unwrap_or(0);
        if compared == 0 {
            return Vec::new();
        }

        let (base_offset, base) = &decoded[0];
        let differs: Vec<bool> = (0..compared)
            .map(|j| decoded[1..].iter().any(|(_, bytes)| bytes[j] != base[j]))
            .collect();
        let differing_bytes = differs.iter().filter(|d| **d).count();

        if differing_bytes == 0 {
            return Vec::new();
        }
        if differing_bytes as f64 > compared as f64 * self.max_fraction {
            log::debug!(
                "WeakRegionSource::analyze(): Track {}: {}/{} bytes differ, revolutions are not aligned",
                ctx.ch,
                differing_bytes,
                compared
            );
            return Vec::new();
        }

        let mut spans: Vec<TrackRegion> = Vec::new();
        let mut run_start: Option<usize> = None;
        for (j, differs) in differs.iter().chain(std::iter::once(&false)).enumerate() {
            match (differs, run_start) {
                (true, None) => run_start = Some(j),
                (false, Some(start)) => {
                    spans.push(TrackRegion::new(
                        base_offset + start * MFM_BYTE_LEN,
                        base_offset + j * MFM_BYTE_LEN,
                    ));
                    run_start = None;
                }
                _ => {}
            }
        }

        let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
            return Vec::new();
        };
        let bits = TrackRegion::new(first.start, last.end);
        let sector = ctx
            .scans
            .first()
            .and_then(|scan| scan.sectors.iter().rev().find(|s| s.id_offset <= bits.start))
            .map(|s| s.id);

        let confidence = (60 + differing_bytes).min(90) as u8;
        let tier = if differing_bytes >= 4 {
            ConfidenceTier::Likely
        }
        else {
            ConfidenceTier::Possible
        };

        log::debug!(
            "WeakRegionSource::analyze(): Track {}: {} weak bytes in {} span(s) starting at bit {}",
            ctx.ch,
            differing_bytes,
            spans.len(),
            bits.start
        );

        vec![ProtectionEvidence {
            scheme: ProtectionScheme::WeakBits,
            confidence,
            tier,
            location: EvidenceLocation {
                ch: ctx.ch,
                sector,
                bits: Some(bits),
            },
            payload: EvidencePayload::WeakSpans {
                spans,
                differing_bytes,
                compared_bytes: compared,
            },
        }]
    }
}
