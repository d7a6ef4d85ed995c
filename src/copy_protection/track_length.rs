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

    src/copy_protection/track_length.rs

    Reports tracks whose bitcell count departs from the nominal length for
    their density.
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

/// Flags tracks longer or shorter than nominal by more than a tolerance.
///
/// Confidence grows by 8 points per percent of deviation past the tolerance, starting at 50
/// and capped at 95.
#[derive(Clone, Debug)]
pub struct TrackLengthSource {
    tolerance: f64,
}

impl TrackLengthSource {
    pub fn new(tolerance: f64) -> Self {
        TrackLengthSource { tolerance }
    }
}

impl EvidenceSource for TrackLengthSource {
    fn name(&self) -> &'static str {
        "track_length"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
        let (Some(bit_len), Some(nominal)) = (ctx.bit_len(), ctx.nominal_bitcells()) else {
            return Vec::new();
        };
        if nominal == 0 {
            return Vec::new();
        }

        let ratio = bit_len as f64 / nominal as f64;
        let deviation = ratio - 1.0;
        if deviation.abs() <= self.tolerance {
            return Vec::new();
        }

        let over = (deviation.abs() - self.tolerance) * 100.0;
        let confidence = (50.0 + over * 8.0).min(95.0) as u8;
        let tier = if deviation.abs() > self.tolerance * 2.0 {
            ConfidenceTier::Likely
        }
        else {
            ConfidenceTier::Possible
        };

        let scheme = if deviation > 0.0 {
            ProtectionScheme::LongTrack
        }
        else {
            ProtectionScheme::ShortTrack
        };

        log::debug!(
            "TrackLengthSource::analyze(): Track {} is {} bitcells against nominal {} ({:+.2}%)",
            ctx.ch,
            bit_len,
            nominal,
            deviation * 100.0
        );

        vec![ProtectionEvidence {
            scheme,
            confidence,
            tier,
            location: EvidenceLocation::track(ctx.ch),
            payload: EvidencePayload::TrackLength {
                bit_len,
                nominal,
                deviation: deviation * 100.0,
            },
        }]
    }
}
