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

    src/track_schema/mod.rs

    Track layouts and the result of scanning a track for sectors.
*/

//! A track schema interprets the layout of syncs, gaps and address marks on a track, relying on
//! the [bitstream_codec](crate::bitstream_codec) helpers to decode the underlying data cells.
//!
//! Only the IBM System 34 layout is implemented. It is used with both MFM and FM encodings.

pub mod system34;

pub use system34::{format_track, FormatSector, System34Decoder};

use crate::{
    track::SectorRecord,
    types::{DiskChsn, SectorCondition, SectorStatus, TrackDataEncoding},
};

/// The sectors found by a single scan of a bitcell stream, in stream order.
#[derive(Clone, Debug, Default)]
pub struct TrackScan {
    pub encoding: TrackDataEncoding,
    /// Length of the scanned stream in bitcells.
    pub bit_len: usize,
    pub sectors: Vec<SectorRecord>,
    /// Union of the status flags of every sector.
    pub status: SectorStatus,
    /// Number of data marks found without a preceding sector header.
    pub orphan_data_marks: usize,
}

impl TrackScan {
    pub(crate) fn new(
        encoding: TrackDataEncoding,
        bit_len: usize,
        sectors: Vec<SectorRecord>,
        orphan_data_marks: usize,
    ) -> Self {
        let status = sectors
            .iter()
            .fold(SectorStatus::empty(), |status, sector| status | sector.status);
        TrackScan {
            encoding,
            bit_len,
            sectors,
            status,
            orphan_data_marks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn sector_ct(&self) -> usize {
        self.sectors.len()
    }

    pub fn good_sector_ct(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_valid()).count()
    }

    /// Return the first sector with the given ID. Later duplicates are skipped.
    pub fn sector(&self, id: &DiskChsn) -> Option<&SectorRecord> {
        self.sectors
            .iter()
            .find(|s| s.id == *id && !s.has(SectorCondition::DuplicateId))
    }

    /// Bitcell offset of the first address mark on the track, if any.
    pub fn first_marker(&self) -> Option<usize> {
        self.sectors.first().map(|s| s.id_offset)
    }
}
