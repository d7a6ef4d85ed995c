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

    src/track/mod.rs

    The assembled record of one physical track.
*/

mod sector;

pub use sector::SectorRecord;

use crate::{
    bounded::BoundedVec,
    copy_protection::ProtectionEvidence,
    types::{DiskCh, DiskChsn, SectorCondition, TrackDataEncoding},
    SiftError,
};

/// Everything recovered from one physical track: its sectors, bit length, aggregate
/// confidence and any copy protection evidence.
///
/// A TrackRecord is assembled once by a [TrackRecordBuilder] and is read-only afterward.
#[derive(Clone, Debug)]
pub struct TrackRecord {
    ch: DiskCh,
    encoding: TrackDataEncoding,
    sectors: Vec<SectorRecord>,
    bit_len: usize,
    confidence: u8,
    sync_losses: usize,
    evidence: Vec<ProtectionEvidence>,
}

impl TrackRecord {
    pub fn ch(&self) -> DiskCh {
        self.ch
    }

    pub fn encoding(&self) -> TrackDataEncoding {
        self.encoding
    }

    pub fn sectors(&self) -> &[SectorRecord] {
        &self.sectors
    }

    pub fn sector_ct(&self) -> usize {
        self.sectors.len()
    }

    /// Length of the track in bitcells.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Aggregate confidence (0-100) in the track's sector data.
    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// Number of times the PLL lost lock while decoding the track.
    pub fn sync_losses(&self) -> usize {
        self.sync_losses
    }

    /// Protection evidence found on this track, strongest first.
    pub fn evidence(&self) -> &[ProtectionEvidence] {
        &self.evidence
    }

    /// Return the first sector with the given ID that was not flagged as a duplicate.
    pub fn sector(&self, id: &DiskChsn) -> Option<&SectorRecord> {
        self.sectors
            .iter()
            .find(|s| s.id == *id && !s.has(SectorCondition::DuplicateId))
    }

    /// Return the number of sectors read without error.
    pub fn good_sector_ct(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_valid()).count()
    }

    /// Consume the record and return a copy carrying the given evidence list.
    pub fn with_evidence(mut self, evidence: Vec<ProtectionEvidence>) -> TrackRecord {
        self.evidence = evidence;
        self
    }
}

/// Assembles a [TrackRecord]. Sector capacity is bounded; adding more sectors than the
/// capacity is an error.
pub struct TrackRecordBuilder {
    ch: DiskCh,
    encoding: TrackDataEncoding,
    sectors: BoundedVec<SectorRecord>,
    bit_len: usize,
    confidence: Option<u8>,
    sync_losses: usize,
    evidence: Vec<ProtectionEvidence>,
}

impl TrackRecordBuilder {
    pub fn new(ch: DiskCh, encoding: TrackDataEncoding, sector_capacity: usize) -> Self {
        TrackRecordBuilder {
            ch,
            encoding,
            sectors: BoundedVec::new(sector_capacity, "sectors"),
            bit_len: 0,
            confidence: None,
            sync_losses: 0,
            evidence: Vec::new(),
        }
    }

    pub fn push_sector(&mut self, sector: SectorRecord) -> Result<&mut Self, SiftError> {
        self.sectors.push(sector)?;
        Ok(self)
    }

    pub fn bit_len(&mut self, bit_len: usize) -> &mut Self {
        self.bit_len = bit_len;
        self
    }

    pub fn confidence(&mut self, confidence: u8) -> &mut Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn sync_losses(&mut self, sync_losses: usize) -> &mut Self {
        self.sync_losses = sync_losses;
        self
    }

    pub fn evidence(&mut self, evidence: Vec<ProtectionEvidence>) -> &mut Self {
        self.evidence = evidence;
        self
    }

    /// Finish the record. If no confidence was set, it is the mean of the sector confidences.
    pub fn build(self) -> TrackRecord {
        let sectors = self.sectors.into_vec();
        let confidence = self.confidence.unwrap_or_else(|| {
            if sectors.is_empty() {
                0
            }
            else {
                (sectors.iter().map(|s| s.confidence as usize).sum::<usize>() / sectors.len()) as u8
            }
        });
        TrackRecord {
            ch: self.ch,
            encoding: self.encoding,
            sectors,
            bit_len: self.bit_len,
            confidence,
            sync_losses: self.sync_losses,
            evidence: self.evidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_enforces_sector_capacity() {
        let mut builder = TrackRecordBuilder::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, 2);
        for s in 1..=2 {
            builder.push_sector(SectorRecord::new(DiskChsn::new(0, 0, s, 2), 0)).unwrap();
        }
        assert!(builder.push_sector(SectorRecord::new(DiskChsn::new(0, 0, 3, 2), 0)).is_err());
        let track = builder.build();
        assert_eq!(track.sector_ct(), 2);
    }

    #[test]
    fn default_confidence_is_sector_mean() {
        let mut builder = TrackRecordBuilder::new(DiskCh::new(1, 0), TrackDataEncoding::Mfm, 8);
        let mut a = SectorRecord::new(DiskChsn::new(1, 0, 1, 2), 0);
        a.confidence = 100;
        let mut b = SectorRecord::new(DiskChsn::new(1, 0, 2, 2), 0);
        b.confidence = 50;
        builder.push_sector(a).unwrap();
        builder.push_sector(b).unwrap();
        assert_eq!(builder.build().confidence(), 75);
    }
}
