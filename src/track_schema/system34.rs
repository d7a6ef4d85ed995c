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

    src/track_schema/system34.rs

    Address mark detection and sector decoding for the IBM System 34 track
    layout, in both its MFM and FM forms.
*/

//! The System 34 layout is shared by IBM PC compatible disks, many CP/M and Atari ST disks and
//! 1.44MB Macintosh disks. Each sector is a header (ID address mark, C, H, R, N, CRC) followed by
//! a short gap and a data field (data address mark, payload, CRC).
//!
//! In MFM, an address mark is three A1 sync bytes written with a missing clock bit (`0x4489`),
//! followed by the mark byte. In FM, the mark byte itself is written with the clock pattern
//! 0xC7 and is preceded by a run of 0x00 bytes.

use std::collections::HashSet;

use crate::{
    bitstream_codec::{
        decode_bytes,
        fm::{decode_fm_word, encode_fm, encode_fm_word, FM_MARK_CLOCK},
        mfm::{clock_valid, encode_marker, encode_mfm, MFM_BYTE_LEN, MFM_MARKER_LEN},
        push_raw_u16,
    },
    bounded::BoundedVec,
    flux::DecodedRevolution,
    track::SectorRecord,
    track_schema::TrackScan,
    types::{CrcCheck, DataMark, DiskChsn, SectorCondition, TrackDataEncoding},
    util::crc_ibm_3740,
    SiftError,
    DEFAULT_SECTOR_CAPACITY,
};
use bit_vec::BitVec;

pub const IDAM_MARKER: u64 = 0x4489_4489_4489_5554;
pub const DAM_MARKER: u64 = 0x4489_4489_4489_5545;
pub const DDAM_MARKER: u64 = 0x4489_4489_4489_554A;

pub const IDAM_MARKER_BYTES: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xFE];
pub const DAM_MARKER_BYTES: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xFB];
pub const DDAM_MARKER_BYTES: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xF8];

pub const IDAM_MARK: u8 = 0xFE;

const MFM_SYNC3: u64 = 0x4489_4489_4489_0000;
const MFM_SYNC3_MASK: u64 = 0xFFFF_FFFF_FFFF_0000;
const MFM_SYNC2: u64 = 0x4489_4489_0000;
const MFM_SYNC2_MASK: u64 = 0xFFFF_FFFF_0000;
const FM_SYNC: u64 = 0xAAAA_AAAA_0000;
const FM_SYNC_MASK: u64 = 0xFFFF_FFFF_0000;
const FM_MARKER_LEN: usize = 48;

/// The MFM sync bytes included in every CRC.
const MFM_CRC_PREFIX: [u8; 3] = [0xA1, 0xA1, 0xA1];

/// Return the CRC of the bytes that precede a field introduced by `mark`: the A1 syncs and the
/// mark byte for MFM, the mark byte alone for FM. Field CRCs continue from this value.
pub fn mark_crc(encoding: TrackDataEncoding, mark: u8) -> u16 {
    match encoding {
        TrackDataEncoding::Fm => crc_ibm_3740(&[mark], None),
        _ => crc_ibm_3740(&[mark], Some(crc_ibm_3740(&MFM_CRC_PREFIX, None))),
    }
}

/// Default limit, in bytes, on the gap between a sector header and its data mark.
pub const MFM_DATA_GAP_LIMIT: usize = 64;
pub const FM_DATA_GAP_LIMIT: usize = 40;

/// The longest run of 0x00 gap bytes counted before a marker.
const MAX_SYNC_COUNT: usize = 128;

pub const MFM_GAP_BYTE: u8 = 0x4E;
pub const FM_GAP_BYTE: u8 = 0xFF;
pub const MFM_SYNC_LEN: usize = 12;
pub const FM_SYNC_LEN: usize = 6;
pub const IBM_GAP1: usize = 50;
pub const IBM_GAP2: usize = 22;
pub const IBM_GAP3_DEFAULT: usize = 22;
pub const IBM_GAP4A: usize = 80;
pub const FM_GAP2: usize = 11;

/// The kind of address mark found in a bitstream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressMark {
    Id,
    Data(DataMark),
}

impl AddressMark {
    fn from_mark_byte(byte: u8) -> Option<AddressMark> {
        match byte {
            IDAM_MARK => Some(AddressMark::Id),
            0xFB => Some(AddressMark::Data(DataMark::Normal)),
            0xF8 => Some(AddressMark::Data(DataMark::Deleted)),
            0xF9 | 0xFA => Some(AddressMark::Data(DataMark::Unusual(byte))),
            _ => None,
        }
    }

    /// The mark byte as recorded on disk.
    pub fn byte(&self) -> u8 {
        match self {
            AddressMark::Id => IDAM_MARK,
            AddressMark::Data(mark) => mark.byte(),
        }
    }
}

/// The location of an address mark within a bitstream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarkerHit {
    pub kind: AddressMark,
    /// Bitcell offset of the first sync cell of the marker.
    pub sync_start: usize,
    /// Bitcell offset of the mark byte.
    pub mark_pos: usize,
    /// The marker was preceded by only two A1 syncs.
    pub weak_sync: bool,
}

/// Return the data cells of a 16-cell word.
fn data_cells(word: u16) -> u8 {
    let mut byte = 0u8;
    for i in 0..8 {
        byte = (byte << 1) | ((word >> (14 - i * 2)) & 1) as u8;
    }
    byte
}

/// Scans bitcell streams for System 34 address marks and decodes the sectors they introduce.
#[derive(Clone, Debug)]
pub struct System34Decoder {
    encoding: TrackDataEncoding,
    data_gap_limit: usize,
    sector_capacity: usize,
}

impl System34Decoder {
    /// Create a decoder for the given encoding. Only MFM and FM are accepted.
    pub fn new(encoding: TrackDataEncoding) -> Result<Self, SiftError> {
        let data_gap_limit = match encoding {
            TrackDataEncoding::Mfm => MFM_DATA_GAP_LIMIT,
            TrackDataEncoding::Fm => FM_DATA_GAP_LIMIT,
            TrackDataEncoding::Gcr => {
                return Err(SiftError::ConfigError {
                    field: "encoding",
                    value: encoding.to_string(),
                    expected: "MFM or FM",
                })
            }
        };
        Ok(System34Decoder {
            encoding,
            data_gap_limit,
            sector_capacity: DEFAULT_SECTOR_CAPACITY,
        })
    }

    /// Set the maximum number of bytes searched between a sector header and its data mark.
    pub fn with_data_gap_limit(mut self, bytes: usize) -> Self {
        self.data_gap_limit = bytes;
        self
    }

    /// Set the maximum number of sectors accepted on one track.
    pub fn with_sector_capacity(mut self, capacity: usize) -> Self {
        self.sector_capacity = capacity;
        self
    }

    pub fn encoding(&self) -> TrackDataEncoding {
        self.encoding
    }

    fn marker_len(&self) -> usize {
        match self.encoding {
            TrackDataEncoding::Fm => FM_MARKER_LEN,
            _ => MFM_MARKER_LEN,
        }
    }

    /// Find the next address mark whose sync begins at or after `start`. If `limit` is given,
    /// the marker must be complete within `limit` bitcells of `start`.
    pub fn find_marker(&self, bits: &BitVec, start: usize, limit: Option<usize>) -> Option<MarkerHit> {
        let end = match limit {
            Some(limit) => bits.len().min(start.saturating_add(limit)),
            None => bits.len(),
        };
        let mut shift_reg: u64 = 0;

        for i in start..end {
            shift_reg = (shift_reg << 1) | bits[i] as u64;
            let shifted = i + 1 - start;
            let mark_pos = match (i + 1).checked_sub(16) {
                Some(pos) => pos,
                None => continue,
            };
            let mark_word = shift_reg as u16;

            match self.encoding {
                TrackDataEncoding::Fm => {
                    if shifted < FM_MARKER_LEN || shift_reg & FM_SYNC_MASK != FM_SYNC {
                        continue;
                    }
                    let (data, clock) = decode_fm_word(mark_word);
                    if clock != FM_MARK_CLOCK {
                        continue;
                    }
                    if let Some(kind) = AddressMark::from_mark_byte(data) {
                        return Some(MarkerHit {
                            kind,
                            sync_start: mark_pos,
                            mark_pos,
                            weak_sync: false,
                        });
                    }
                }
                _ => {
                    let weak_sync = if shifted >= MFM_MARKER_LEN && shift_reg & MFM_SYNC3_MASK == MFM_SYNC3 {
                        false
                    }
                    else if shifted >= 48 && shift_reg & MFM_SYNC2_MASK == MFM_SYNC2 {
                        true
                    }
                    else {
                        continue;
                    };
                    // The mark byte follows an A1, so the previous data cell is 1.
                    if !clock_valid(mark_word, true) {
                        continue;
                    }
                    if let Some(kind) = AddressMark::from_mark_byte(data_cells(mark_word)) {
                        let sync_words = if weak_sync { 2 } else { 3 };
                        return Some(MarkerHit {
                            kind,
                            sync_start: mark_pos - sync_words * MFM_BYTE_LEN,
                            mark_pos,
                            weak_sync,
                        });
                    }
                }
            }
        }
        None
    }

    /// Count the 0x00 bytes immediately preceding bitcell offset `pos`.
    fn count_sync(&self, bits: &BitVec, pos: usize) -> usize {
        let mut count = 0;
        while count < MAX_SYNC_COUNT {
            let Some(offset) = pos.checked_sub((count + 1) * MFM_BYTE_LEN)
            else {
                break;
            };
            match decode_bytes(bits, offset, 1).first() {
                Some(0) => count += 1,
                _ => break,
            }
        }
        count
    }

    /// Scan a decoded revolution.
    pub fn scan_revolution(&self, revolution: &DecodedRevolution) -> Result<TrackScan, SiftError> {
        self.scan(&revolution.bits)
    }

    /// Scan a bitcell stream for sectors. Decoding failures are recorded as sector status flags
    /// and never stop the scan. An error is returned only if the sector capacity is exceeded.
    pub fn scan(&self, bits: &BitVec) -> Result<TrackScan, SiftError> {
        let mut sectors: BoundedVec<SectorRecord> = BoundedVec::new(self.sector_capacity, "sectors");
        let mut seen_ids: HashSet<DiskChsn> = HashSet::new();
        let mut cursor = 0;
        let mut orphan_ct = 0;

        while let Some(hit) = self.find_marker(bits, cursor, None) {
            match hit.kind {
                AddressMark::Id => {
                    let (mut sector, next) = self.read_sector(bits, &hit);
                    if !seen_ids.insert(sector.id) {
                        log::debug!(
                            "System34Decoder::scan(): Duplicate sector ID {} at bit offset {}",
                            sector.id,
                            hit.sync_start
                        );
                        sector.flag(SectorCondition::DuplicateId);
                    }
                    sectors.push(sector)?;
                    cursor = next.max(hit.mark_pos + 16);
                }
                AddressMark::Data(mark) => {
                    log::trace!(
                        "System34Decoder::scan(): {} without a sector header at bit offset {}",
                        mark,
                        hit.sync_start
                    );
                    orphan_ct += 1;
                    cursor = hit.mark_pos + 16;
                }
            }
        }

        let sectors = sectors.into_vec();
        log::debug!(
            "System34Decoder::scan(): Found {} sectors ({} orphaned data marks) in {} bitcells",
            sectors.len(),
            orphan_ct,
            bits.len()
        );
        Ok(TrackScan::new(self.encoding, bits.len(), sectors, orphan_ct))
    }

    /// Decode the sector introduced by the ID mark `hit`. Return the sector and the bitcell
    /// offset at which scanning should resume.
    fn read_sector(&self, bits: &BitVec, hit: &MarkerHit) -> (SectorRecord, usize) {
        let header_pos = hit.mark_pos + 16;
        let header = decode_bytes(bits, header_pos, 6);

        let mut id_bytes = [0u8; 4];
        for (dst, src) in id_bytes.iter_mut().zip(header.iter()) {
            *dst = *src;
        }
        let id = DiskChsn::from_id_bytes(id_bytes);
        let mut sector = SectorRecord::new(id, hit.sync_start);
        sector.sync_len = self.count_sync(bits, hit.sync_start);
        if hit.weak_sync {
            sector.flag(SectorCondition::WeakSync);
        }

        if header.len() < 6 {
            log::debug!(
                "System34Decoder::read_sector(): Header at bit offset {} truncated",
                hit.sync_start
            );
            sector.flag(SectorCondition::Truncated);
            sector.flag(SectorCondition::CrcIdBad);
            sector.flag(SectorCondition::MissingData);
            return (sector, bits.len());
        }

        let calculated = crc_ibm_3740(&id_bytes, Some(mark_crc(self.encoding, IDAM_MARK)));
        sector.id_crc = CrcCheck::new(u16::from_be_bytes([header[4], header[5]]), calculated);
        if !sector.id_crc.is_valid() {
            log::debug!(
                "System34Decoder::read_sector(): Sector {} header CRC bad: {}",
                id,
                sector.id_crc
            );
            sector.flag(SectorCondition::CrcIdBad);
        }
        if id.n_oversized() {
            sector.flag(SectorCondition::SizeMismatch);
        }

        let header_end = header_pos + 6 * MFM_BYTE_LEN;
        let limit = self.data_gap_limit * MFM_BYTE_LEN + self.marker_len();
        let data_hit = match self.find_marker(bits, header_end, Some(limit)) {
            Some(data_hit) => data_hit,
            None => {
                sector.flag(SectorCondition::MissingData);
                return (sector, header_end);
            }
        };

        let mark = match data_hit.kind {
            AddressMark::Data(mark) => mark,
            AddressMark::Id => {
                // The next sector header arrived before any data mark.
                sector.flag(SectorCondition::MissingData);
                return (sector, data_hit.sync_start);
            }
        };

        sector.data_mark = Some(mark);
        sector.data_offset = Some(data_hit.sync_start);
        match mark {
            DataMark::Deleted => sector.flag(SectorCondition::Deleted),
            DataMark::Unusual(_) => sector.flag(SectorCondition::UnusualMark),
            DataMark::Normal => {}
        }
        if data_hit.weak_sync {
            sector.flag(SectorCondition::WeakSync);
        }

        let size = id.n_size();
        let payload_pos = data_hit.mark_pos + 16;
        let mut payload = decode_bytes(bits, payload_pos, size + 2);
        if payload.len() < size + 2 {
            log::debug!(
                "System34Decoder::read_sector(): Sector {} data truncated at {} of {} bytes",
                id,
                payload.len(),
                size
            );
            payload.truncate(size);
            sector.data = payload;
            sector.flag(SectorCondition::Truncated);
            return (sector, bits.len());
        }

        let recorded = u16::from_be_bytes([payload[size], payload[size + 1]]);
        payload.truncate(size);
        let calculated = crc_ibm_3740(&payload, Some(mark_crc(self.encoding, mark.byte())));
        sector.data_crc = Some(CrcCheck::new(recorded, calculated));
        if recorded != calculated {
            log::debug!(
                "System34Decoder::read_sector(): Sector {} data CRC bad: {:04X}/{:04X}",
                id,
                recorded,
                calculated
            );
            sector.flag(SectorCondition::CrcDataBad);
        }
        sector.data = payload;
        sector.confidence = if sector.is_valid() { 100 } else { 0 };

        (sector, payload_pos + (size + 2) * MFM_BYTE_LEN)
    }
}

/// A sector to be laid down by [format_track].
#[derive(Clone, Debug)]
pub struct FormatSector {
    pub id: DiskChsn,
    pub data: Vec<u8>,
    pub mark: DataMark,
    /// Number of 0x00 sync bytes written before each marker.
    pub sync_len: usize,
    /// Write the data CRC inverted.
    pub bad_crc: bool,
    /// Omit the data field entirely.
    pub no_data: bool,
}

impl FormatSector {
    pub fn new(id: DiskChsn, data: Vec<u8>) -> Self {
        FormatSector {
            id,
            data,
            mark: DataMark::Normal,
            sync_len: 0,
            bad_crc: false,
            no_data: false,
        }
    }
}

struct TrackWriter {
    encoding: TrackDataEncoding,
    bits: BitVec,
    prev_bit: bool,
}

impl TrackWriter {
    fn bytes(&mut self, data: &[u8]) {
        let encoded = match self.encoding {
            TrackDataEncoding::Fm => encode_fm(data),
            _ => encode_mfm(data, self.prev_bit),
        };
        self.bits.extend(encoded.iter());
        if let Some(last) = data.last() {
            self.prev_bit = last & 1 != 0;
        }
    }

    fn fill(&mut self, byte: u8, count: usize) {
        self.bytes(&vec![byte; count]);
    }

    fn marker(&mut self, mark: u8) {
        match self.encoding {
            TrackDataEncoding::Fm => push_raw_u16(&mut self.bits, encode_fm_word(mark, FM_MARK_CLOCK)),
            _ => {
                let pattern = encode_marker(&[0xA1, 0xA1, 0xA1, mark]);
                for shift in (0..4).rev() {
                    push_raw_u16(&mut self.bits, (pattern >> (shift * 16)) as u16);
                }
            }
        }
        self.prev_bit = mark & 1 != 0;
    }
}

/// Build the bitcells of a System 34 formatted track holding `sectors`, padded with gap bytes to
/// at least `bit_len` bitcells. Reference tracks built this way are used to validate decoding.
pub fn format_track(encoding: TrackDataEncoding, sectors: &[FormatSector], gap3: usize, bit_len: usize) -> BitVec {
    let (gap_byte, default_sync, gap2) = match encoding {
        TrackDataEncoding::Fm => (FM_GAP_BYTE, FM_SYNC_LEN, FM_GAP2),
        _ => (MFM_GAP_BYTE, MFM_SYNC_LEN, IBM_GAP2),
    };
    let mut writer = TrackWriter {
        encoding,
        bits: BitVec::new(),
        prev_bit: false,
    };

    writer.fill(gap_byte, IBM_GAP4A);
    writer.fill(gap_byte, IBM_GAP1);

    for sector in sectors {
        let sync_len = if sector.sync_len > 0 { sector.sync_len } else { default_sync };

        writer.fill(0x00, sync_len);
        writer.marker(IDAM_MARK);
        let id_bytes = sector.id.id_bytes();
        let id_crc = crc_ibm_3740(&id_bytes, Some(mark_crc(encoding, IDAM_MARK)));
        writer.bytes(&id_bytes);
        writer.bytes(&id_crc.to_be_bytes());
        writer.fill(gap_byte, gap2);

        if !sector.no_data {
            writer.fill(0x00, sync_len);
            writer.marker(sector.mark.byte());
            let mut crc = crc_ibm_3740(&sector.data, Some(mark_crc(encoding, sector.mark.byte())));
            if sector.bad_crc {
                crc = !crc;
            }
            writer.bytes(&sector.data);
            writer.bytes(&crc.to_be_bytes());
        }
        writer.fill(gap_byte, gap3);
    }

    while writer.bits.len() < bit_len {
        writer.fill(gap_byte, 1);
    }
    writer.bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(s: u8, fill: u8) -> FormatSector {
        FormatSector::new(DiskChsn::new(0, 0, s, 2), vec![fill; 512])
    }

    #[test]
    fn marker_constants() {
        assert_eq!(encode_marker(&IDAM_MARKER_BYTES), IDAM_MARKER);
        assert_eq!(encode_marker(&DAM_MARKER_BYTES), DAM_MARKER);
        assert_eq!(encode_marker(&DDAM_MARKER_BYTES), DDAM_MARKER);
    }

    #[test]
    fn decodes_formatted_mfm_track() {
        let sectors: Vec<_> = (1..=9).map(|s| sector(s, s)).collect();
        let bits = format_track(TrackDataEncoding::Mfm, &sectors, IBM_GAP3_DEFAULT, 100_000);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();

        assert_eq!(scan.sector_ct(), 9);
        assert_eq!(scan.good_sector_ct(), 9);
        for (i, record) in scan.sectors.iter().enumerate() {
            assert_eq!(record.id.s(), i as u8 + 1);
            assert_eq!(record.data, vec![i as u8 + 1; 512]);
            assert_eq!(record.sync_len, MFM_SYNC_LEN);
            assert!(record.status.is_empty());
        }
    }

    #[test]
    fn decodes_formatted_fm_track() {
        let sectors: Vec<_> = (1..=4).map(|s| sector(s, 0xE5)).collect();
        let bits = format_track(TrackDataEncoding::Fm, &sectors, 27, 50_000);
        let scan = System34Decoder::new(TrackDataEncoding::Fm).unwrap().scan(&bits).unwrap();

        assert_eq!(scan.sector_ct(), 4);
        assert_eq!(scan.good_sector_ct(), 4);
        assert_eq!(scan.sectors[0].sync_len, FM_SYNC_LEN);
    }

    #[test]
    fn flags_bad_crc_and_deleted_marks() {
        let mut bad = sector(1, 0x11);
        bad.bad_crc = true;
        let mut deleted = sector(2, 0x22);
        deleted.mark = DataMark::Deleted;
        let mut unusual = sector(3, 0x33);
        unusual.mark = DataMark::Unusual(0xFA);

        let bits = format_track(TrackDataEncoding::Mfm, &[bad, deleted, unusual], 22, 0);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();

        assert_eq!(scan.sector_ct(), 3);
        assert!(scan.sectors[0].has(SectorCondition::CrcDataBad));
        assert_eq!(scan.sectors[0].data, vec![0x11; 512]);
        assert!(scan.sectors[1].has(SectorCondition::Deleted));
        assert!(scan.sectors[1].data_crc_valid());
        assert!(scan.sectors[2].has(SectorCondition::UnusualMark));
        assert_eq!(scan.sectors[2].data_mark, Some(DataMark::Unusual(0xFA)));
    }

    #[test]
    fn data_mark_beyond_gap_limit_is_missing() {
        let bits = format_track(TrackDataEncoding::Mfm, &[sector(1, 0x11), sector(2, 0x22)], 22, 0);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm)
            .unwrap()
            .with_data_gap_limit(4)
            .scan(&bits)
            .unwrap();

        assert_eq!(scan.sector_ct(), 2);
        assert!(scan.sectors.iter().all(|s| s.has(SectorCondition::MissingData)));
        assert!(scan.sectors.iter().all(|s| s.data.is_empty()));
    }

    #[test]
    fn duplicate_id_keeps_first_record() {
        let first = sector(5, 0xAA);
        let second = sector(5, 0xBB);
        let bits = format_track(TrackDataEncoding::Mfm, &[first, second], 22, 0);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();

        assert_eq!(scan.sector_ct(), 2);
        assert!(!scan.sectors[0].has(SectorCondition::DuplicateId));
        assert_eq!(scan.sectors[0].data, vec![0xAA; 512]);
        assert!(scan.sectors[1].has(SectorCondition::DuplicateId));
        assert_eq!(scan.sector(&DiskChsn::new(0, 0, 5, 2)).map(|s| s.data[0]), Some(0xAA));
    }

    #[test]
    fn missing_data_and_truncation() {
        let mut no_data = sector(1, 0);
        no_data.no_data = true;
        let bits = format_track(TrackDataEncoding::Mfm, &[no_data, sector(2, 0x42)], 22, 0);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();
        assert_eq!(scan.sector_ct(), 2);
        assert!(scan.sectors[0].has(SectorCondition::MissingData));
        assert!(scan.sectors[1].is_valid());

        // Cut the track in the middle of the second sector's payload.
        let mut cut = bits.clone();
        let data_offset = scan.sectors[1].data_offset.unwrap();
        cut.truncate(data_offset + MFM_MARKER_LEN + 100 * MFM_BYTE_LEN);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&cut).unwrap();
        assert!(scan.sectors[1].has(SectorCondition::Truncated));
        assert_eq!(scan.sectors[1].data.len(), 100);
    }

    #[test]
    fn oversized_n_reads_maximum() {
        let id = DiskChsn::new(0, 0, 1, 7);
        let bits = format_track(
            TrackDataEncoding::Mfm,
            &[FormatSector::new(id, vec![0x5A; 8192])],
            22,
            0,
        );
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();
        assert!(scan.sectors[0].has(SectorCondition::SizeMismatch));
        assert_eq!(scan.sectors[0].data.len(), 8192);
        assert!(scan.sectors[0].data_crc_valid());
    }

    #[test]
    fn weak_sync_is_accepted() {
        let mut bits = BitVec::new();
        bits.extend(encode_mfm(&[0x4E; 4], false).iter());
        bits.extend(encode_mfm(&[0x00; 12], false).iter());
        push_raw_u16(&mut bits, 0x4489);
        push_raw_u16(&mut bits, 0x4489);
        push_raw_u16(&mut bits, 0x5554);
        let id = [0u8, 0, 1, 2];
        let crc = crc_ibm_3740(&id, Some(crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFE], None)));
        bits.extend(encode_mfm(&id, false).iter());
        bits.extend(encode_mfm(&crc.to_be_bytes(), false).iter());
        bits.extend(encode_mfm(&[0x4E; 60], crc & 1 != 0).iter());

        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&bits).unwrap();
        assert_eq!(scan.sector_ct(), 1);
        assert!(scan.sectors[0].has(SectorCondition::WeakSync));
        assert!(scan.sectors[0].id_crc.is_valid());
        assert!(scan.sectors[0].has(SectorCondition::MissingData));
    }

    #[test]
    fn capacity_is_enforced() {
        let sectors: Vec<_> = (1..=4).map(|s| sector(s, 0)).collect();
        let bits = format_track(TrackDataEncoding::Mfm, &sectors, 22, 0);
        let decoder = System34Decoder::new(TrackDataEncoding::Mfm)
            .unwrap()
            .with_sector_capacity(3);
        assert!(matches!(
            decoder.scan(&bits),
            Err(SiftError::CapacityExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn empty_stream_scans_cleanly() {
        let scan = System34Decoder::new(TrackDataEncoding::Mfm)
            .unwrap()
            .scan(&BitVec::new())
            .unwrap();
        assert!(scan.is_empty());
        assert!(System34Decoder::new(TrackDataEncoding::Gcr).is_err());
    }
}
