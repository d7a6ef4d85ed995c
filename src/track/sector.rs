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

    src/track/sector.rs

    The record of a single decoded sector.
*/
use crate::types::{CrcCheck, DataMark, DiskChsn, SectorCondition, SectorStatus};

/// A sector decoded from a track: its ID, status flags, CRCs and whatever payload could be
/// read. A sector record is kept even when decoding fails part way; the status flags say what
/// went wrong.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorRecord {
    pub id: DiskChsn,
    pub status: SectorStatus,
    pub id_crc: CrcCheck,
    pub data_crc: Option<CrcCheck>,
    pub data_mark: Option<DataMark>,
    /// Number of 0x00 gap bytes seen immediately before the ID marker.
    pub sync_len: usize,
    /// Bitcell offset of the ID address marker.
    pub id_offset: usize,
    /// Bitcell offset of the data address marker, if found.
    pub data_offset: Option<usize>,
    pub data: Vec<u8>,
    /// Per-byte flags marking bytes that differed between passes.
    pub weak_mask: Option<Vec<bool>>,
    /// Confidence (0-100) in the sector payload.
    pub confidence: u8,
}

impl SectorRecord {
    pub fn new(id: DiskChsn, id_offset: usize) -> Self {
        SectorRecord {
            id,
            id_offset,
            ..Default::default()
        }
    }

    #[inline]
    pub fn has(&self, condition: SectorCondition) -> bool {
        self.status.has(condition)
    }

    #[inline]
    pub fn flag(&mut self, condition: SectorCondition) {
        self.status |= SectorStatus::from(condition);
    }

    /// Return true if both the header and data were read with valid CRCs.
    pub fn is_valid(&self) -> bool {
        !self.status.is_error() && self.data_crc.map(|c| c.is_valid()).unwrap_or(false)
    }

    /// Return true if the data field CRC matched, regardless of the header.
    pub fn data_crc_valid(&self) -> bool {
        self.data_crc.map(|c| c.is_valid()).unwrap_or(false) && !self.has(SectorCondition::Truncated)
    }

    /// Return the number of weak bytes recorded for this sector.
    pub fn weak_ct(&self) -> usize {
        self.weak_mask
            .as_ref()
            .map(|mask| mask.iter().filter(|w| **w).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_follows_status_and_crc() {
        let mut sector = SectorRecord::new(DiskChsn::new(0, 0, 1, 2), 0);
        assert!(!sector.is_valid());
        sector.data_crc = Some(CrcCheck::new(0x1234, 0x1234));
        assert!(sector.is_valid());
        sector.flag(SectorCondition::CrcIdBad);
        assert!(!sector.is_valid());
        assert!(sector.data_crc_valid());
    }
}
