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

    src/copy_protection/copylock.rs

    Rob Northen CopyLock detection. A CopyLock track carries eleven sectors,
    each introduced by its own non-standard sync word and filled from a
    23-bit LFSR keystream. Two sectors are written at an altered bit rate
    and one carries an ASCII signature.
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
    bitstream_codec::{
        decode_bytes,
        find_raw_u16,
        mfm::{MFM_BYTE_LEN, MFM_SYNC_WORD},
        read_raw_u16,
    },
    flux::DecodedRevolution,
    types::TrackRegion,
};
use bit_vec::BitVec;
use std::fmt::{self, Display, Formatter};

pub const COPYLOCK_SECTOR_CT: usize = 11;
pub const COPYLOCK_SECTOR_BYTES: usize = 512;
pub const COPYLOCK_SIGNATURE: &[u8; 16] = b"Rob Northen Comp";
pub const COPYLOCK_SIGNATURE_SECTOR: usize = 6;

/// Sync words of the common CopyLock variant, by sector.
pub const STANDARD_SYNCS: [u16; COPYLOCK_SECTOR_CT] = [
    0x8A91, 0x8A44, 0x8A45, 0x8A51, 0x8912, 0x8911, 0x8914, 0x8915, 0x8944, 0x8945, 0x8951,
];
/// Sync words of the early CopyLock variant, by sector.
pub const OLD_SYNCS: [u16; COPYLOCK_SECTOR_CT] = [
    0x6591, 0x6544, 0x6545, 0x6551, 0x6412, 0x6411, 0x6414, 0x6415, 0x6444, 0x6445, 0x6451,
];

/// Cells either side of a sync word averaged for sector timing.
const TIMING_WINDOW: usize = 32;
/// Furthest a sync word may lie from a neighbouring sector, per sector between them, in cells.
/// Only applied to sectors whose data does not continue the track's keystream.
const MAX_SYNC_DISTANCE: usize = (COPYLOCK_SECTOR_BYTES + 128) * MFM_BYTE_LEN * 2;
/// Bytes needed before seed recovery is attempted. They fix the state above the guessed bits.
pub const LFSR_MIN_BYTES: usize = 8;
/// Low state bits searched during seed recovery.
const LFSR_GUESS_BITS: u32 = 8;

/// The CopyLock keystream generator: a 23-bit Fibonacci LFSR with taps at bits 22 and 0.
/// Each output byte is bits 22..15 of the state, taken before the state advances.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lfsr {
    state: u32,
}

impl Lfsr {
    pub const MASK: u32 = 0x7F_FFFF;

    pub fn new(seed: u32) -> Self {
        Lfsr { state: seed & Self::MASK }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    #[inline]
    pub fn byte(&self) -> u8 {
        (self.state >> 15) as u8
    }

    #[inline]
    pub fn advance(&mut self) {
        let s = self.state;
        self.state = ((s << 1) | (((s >> 22) ^ s) & 1)) & Self::MASK;
    }

    /// Step the register back one position. The exact inverse of [Lfsr::advance].
    #[inline]
    pub fn retreat(&mut self) {
        let t = self.state;
        self.state = (t >> 1) | (((t ^ (t >> 1)) & 1) << 22);
    }

    pub fn next_byte(&mut self) -> u8 {
        let byte = self.byte();
        self.advance();
        byte
    }

    /// Generate `len` keystream bytes starting `offset` bytes into the stream of `seed`.
    pub fn keystream(seed: u32, offset: usize, len: usize) -> Vec<u8> {
        let mut lfsr = Lfsr::new(seed);
        for _ in 0..offset {
            lfsr.advance();
        }
        (0..len).map(|_| lfsr.next_byte()).collect()
    }

    /// Recover the state that produced `bytes`.
    ///
    /// Byte `k` holds state bits `22-k..15-k`, so the first eight bytes fix bits 22..8. The
    /// remaining low bits are searched, and the first candidate that reproduces every supplied
    /// byte is returned. Samples shorter than sixteen bytes leave some low bits unobserved and
    /// may resolve to any state that agrees with them.
    pub fn recover(bytes: &[u8]) -> Option<u32> {
        if bytes.len() < LFSR_MIN_BYTES {
            return None;
        }
        let fixed = bytes[1..LFSR_MIN_BYTES]
            .iter()
            .enumerate()
            .fold((bytes[0] as u32) << 15, |s, (k, b)| s | ((*b as u32 & 1) << (14 - k)));

        (0..1u32 << LFSR_GUESS_BITS)
            .map(|guess| fixed | guess)
            .filter(|state| *state != 0)
            .find(|state| {
                let mut lfsr = Lfsr::new(*state);
                bytes.iter().all(|b| lfsr.next_byte() == *b)
            })
    }
}

/// Return the keystream offset at which a sector's data begins. The signature sector
/// carries only `512 - 16` keystream bytes, so later sectors are shifted back.
pub fn keystream_offset(sector: usize) -> usize {
    if sector > COPYLOCK_SIGNATURE_SECTOR {
        sector * COPYLOCK_SECTOR_BYTES - COPYLOCK_SIGNATURE.len()
    }
    else {
        sector * COPYLOCK_SECTOR_BYTES
    }
}

/// Expected sector timing, in percent of the track's mean bitcell period.
pub fn expected_timing(sector: usize) -> f64 {
    match sector {
        4 => 95.0,
        6 => 105.0,
        _ => 100.0,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CopyLockVariant {
    Standard,
    Old,
}

impl CopyLockVariant {
    pub fn syncs(&self) -> &'static [u16; COPYLOCK_SECTOR_CT] {
        match self {
            CopyLockVariant::Standard => &STANDARD_SYNCS,
            CopyLockVariant::Old => &OLD_SYNCS,
        }
    }
}

impl Display for CopyLockVariant {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CopyLockVariant::Standard => write!(f, "standard"),
            CopyLockVariant::Old => write!(f, "old"),
        }
    }
}

/// What was found on a CopyLock track.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CopyLockInfo {
    pub variant: CopyLockVariant,
    /// Sector indices whose sync word was found.
    pub sectors: Vec<u8>,
    /// Number of altered-rate sectors whose timing matched.
    pub timing_matches: usize,
    pub signature: bool,
    pub seed: Option<u32>,
    /// The seed reproduced the data of every other sector read.
    pub seed_verified: bool,
}

impl CopyLockInfo {
    pub fn sync_ct(&self) -> usize {
        self.sectors.len()
    }

    fn grade(&self) -> Option<(ConfidenceTier, u8)> {
        let syncs = self.sync_ct();
        match syncs {
            8.. if self.signature => Some((ConfidenceTier::Certain, 95)),
            8.. if self.timing_matches > 0 || syncs >= 10 => Some((ConfidenceTier::Likely, 80)),
            8.. => Some((ConfidenceTier::Possible, 60)),
            3..=7 => Some((ConfidenceTier::Possible, 40)),
            _ => None,
        }
    }
}

/// Some CopyLock sync words also occur at an offset inside the run of 0x4489 words that
/// precedes a standard address mark. Return true if the word at `pos` overlaps such a run.
fn within_mark_sync(bits: &BitVec, pos: usize) -> bool {
    let is_sync = |i: usize| read_raw_u16(bits, i) == Some(MFM_SYNC_WORD);
    (pos.saturating_sub(MFM_BYTE_LEN - 1)..pos + MFM_BYTE_LEN)
        .any(|i| is_sync(i) && (is_sync(i + MFM_BYTE_LEN) || i.checked_sub(MFM_BYTE_LEN).is_some_and(is_sync)))
}

/// Every occurrence of `word` in the revolution that is not part of an A1 sync run.
fn sync_candidates(bits: &BitVec, word: u16) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = find_raw_u16(bits, word, from) {
        if !within_mark_sync(bits, pos) {
            found.push(pos);
        }
        from = pos + 1;
    }
    found
}

/// Cells from `from` forward to `to`, wrapping at the index.
fn track_distance(from: usize, to: usize, len: usize) -> usize {
    if to >= from {
        to - from
    }
    else {
        len - from + to
    }
}

struct SectorHit {
    sector: usize,
    pos: usize,
    data: Vec<u8>,
}

impl SectorHit {
    fn read(bits: &BitVec, sector: usize, pos: usize) -> Self {
        let data = decode_bytes(bits, pos + MFM_BYTE_LEN, COPYLOCK_SECTOR_BYTES);
        SectorHit { sector, pos, data }
    }

    /// First cell after the sector's data.
    fn end(&self) -> usize {
        self.pos + MFM_BYTE_LEN + self.data.len() * MFM_BYTE_LEN
    }

    /// The stream seed this sector's data implies, if the data is a clean run of keystream.
    fn implied_seed(&self) -> Option<u32> {
        let (offset, stream) = self.keystream();
        let state = Lfsr::recover(stream)?;
        let mut lfsr = Lfsr::new(state);
        for _ in 0..offset {
            lfsr.retreat();
        }
        Some(lfsr.state())
    }

    /// The keystream portion of the sector and its offset into the stream.
    fn keystream(&self) -> (usize, &[u8]) {
        if self.sector == COPYLOCK_SIGNATURE_SECTOR && self.data.starts_with(COPYLOCK_SIGNATURE) {
            (keystream_offset(self.sector), &self.data[COPYLOCK_SIGNATURE.len()..])
        }
        else {
            (keystream_offset(self.sector), &self.data)
        }
    }
}

/// Locates CopyLock sectors by their sync words and grades what it finds.
#[derive(Clone, Debug)]
pub struct CopyLockSource {
    timing_tolerance: f64,
}

impl CopyLockSource {
    pub fn new(timing_tolerance: f64) -> Self {
        CopyLockSource { timing_tolerance }
    }

    /// Find each sector's sync word anywhere in the revolution. A missing sector is skipped.
    ///
    /// The sync words also occur by chance inside keystream data, so every occurrence is read.
    /// For each sector the occurrence whose data continues the keystream shared by the most
    /// sectors is kept. A sector whose data fits no keystream is kept only when its sync word
    /// lies in track order between the sectors found around it.
    fn find_sectors(bits: &BitVec, variant: CopyLockVariant) -> Vec<SectorHit> {
        let candidates: Vec<Vec<(SectorHit, Option<u32>)>> = variant
            .syncs()
            .iter()
            .enumerate()
            .map(|(sector, word)| {
                sync_candidates(bits, *word)
                    .into_iter()
                    .map(|pos| {
                        let hit = SectorHit::read(bits, sector, pos);
                        let seed = hit.implied_seed();
                        (hit, seed)
                    })
                    .collect()
            })
            .collect();

        // Count the sectors that agree on each seed.
        let mut votes: Vec<(u32, usize)> = Vec::new();
        for sector in &candidates {
            let mut seen: Vec<u32> = Vec::new();
            for seed in sector.iter().filter_map(|(_, seed)| *seed) {
                if seen.contains(&seed) {
                    continue;
                }
                seen.push(seed);
                match votes.iter_mut().find(|(s, _)| *s == seed) {
                    Some((_, count)) => *count += 1,
                    None => votes.push((seed, 1)),
                }
            }
        }
        let mut seed: Option<(u32, usize)> = None;
        for (s, count) in &votes {
            if seed.map_or(true, |(_, best)| *count > best) {
                seed = Some((*s, *count));
            }
        }
        let Some((seed, _)) = seed
        else {
            log::trace!("CopyLockSource::find_sectors(): No {} sector carries keystream data", variant);
            return Vec::new();
        };

        let mut slots: Vec<Option<SectorHit>> = Vec::with_capacity(COPYLOCK_SECTOR_CT);
        let mut unkeyed: Vec<Vec<SectorHit>> = Vec::with_capacity(COPYLOCK_SECTOR_CT);
        for sector in candidates {
            let (keyed, rest): (Vec<_>, Vec<_>) = sector.into_iter().partition(|(_, s)| *s == Some(seed));
            slots.push(keyed.into_iter().next().map(|(hit, _)| hit));
            unkeyed.push(rest.into_iter().map(|(hit, _)| hit).collect());
        }

        let len = bits.len();
        let keyed: Vec<(usize, usize, usize)> = slots
            .iter()
            .flatten()
            .map(|hit| (hit.sector, hit.pos, hit.end()))
            .collect();
        for (sector, rest) in unkeyed.into_iter().enumerate() {
            if slots[sector].is_some() {
                continue;
            }
            let prev = keyed.iter().rev().find(|(s, _, _)| *s < sector);
            let next = keyed.iter().find(|(s, _, _)| *s > sector);

            let fits = |hit: &SectorHit| match (prev, next) {
                (Some((_, _, p_end)), Some((_, n_pos, _))) => {
                    let gap = track_distance(*p_end, *n_pos, len);
                    track_distance(*p_end, hit.pos, len) < gap && track_distance(*p_end, hit.end(), len) <= gap
                }
                (Some((ps, _, p_end)), None) => {
                    track_distance(*p_end, hit.pos, len) <= MAX_SYNC_DISTANCE * (sector - *ps)
                }
                (None, Some((ns, n_pos, _))) => {
                    track_distance(hit.end(), *n_pos, len) <= MAX_SYNC_DISTANCE * (*ns - sector)
                }
                (None, None) => false,
            };
            let found = rest.into_iter().filter(|hit| fits(hit)).min_by_key(|hit| match prev {
                Some((_, _, p_end)) => track_distance(*p_end, hit.pos, len),
                None => track_distance(hit.pos, next.map_or(0, |(_, n_pos, _)| *n_pos), len),
            });
            if found.is_none() {
                log::trace!(
                    "CopyLockSource::find_sectors(): No {} sync {:04X} for sector {}",
                    variant,
                    variant.syncs()[sector],
                    sector
                );
            }
            slots[sector] = found;
        }

        slots.into_iter().flatten().collect()
    }

    /// Recover the keystream seed from the first usable sector and check it against the rest.
    fn recover_seed(hits: &[SectorHit]) -> (Option<u32>, bool) {
        let Some(seed) = hits.iter().find_map(SectorHit::implied_seed)
        else {
            return (None, false);
        };

        let verified = hits.len() > 1
            && hits.iter().all(|hit| {
                let (offset, stream) = hit.keystream();
                Lfsr::keystream(seed, offset, stream.len()) == stream
            });
        (Some(seed), verified)
    }

    fn timing_matches(&self, rev: &DecodedRevolution, hits: &[SectorHit]) -> usize {
        let Some(mean) = rev.average_time(0, rev.len()).filter(|m| *m > 0.0) else {
            return 0;
        };
        hits.iter()
            .filter(|hit| expected_timing(hit.sector) != 100.0)
            .filter(|hit| {
                rev.average_time(hit.pos.saturating_sub(TIMING_WINDOW), hit.pos + TIMING_WINDOW)
                    .is_some_and(|t| {
                        let pct = t / mean * 100.0;
                        log::trace!(
                            "CopyLockSource::timing_matches(): Sector {} timing {:.1}%",
                            hit.sector,
                            pct
                        );
                        (pct - expected_timing(hit.sector)).abs() <= self.timing_tolerance
                    })
            })
            .count()
    }

    /// Examine one revolution.
    pub fn detect(&self, rev: &DecodedRevolution) -> Option<(CopyLockInfo, TrackRegion)> {
        let standard = Self::find_sectors(&rev.bits, CopyLockVariant::Standard);
        let old = Self::find_sectors(&rev.bits, CopyLockVariant::Old);
        let (variant, hits) = if old.len() > standard.len() {
            (CopyLockVariant::Old, old)
        }
        else {
            (CopyLockVariant::Standard, standard)
        };

        let start = hits.iter().map(|h| h.pos).min()?;
        let end = hits.iter().map(|h| h.pos + MFM_BYTE_LEN).max()?;
        let region = TrackRegion::new(start, end);

        let signature = hits
            .iter()
            .any(|h| h.sector == COPYLOCK_SIGNATURE_SECTOR && h.data.starts_with(COPYLOCK_SIGNATURE));
        let (seed, seed_verified) = Self::recover_seed(&hits);

        let info = CopyLockInfo {
            variant,
            sectors: hits.iter().map(|h| h.sector as u8).collect(),
            timing_matches: self.timing_matches(rev, &hits),
            signature,
            seed,
            seed_verified,
        };
        Some((info, region))
    }
}

impl EvidenceSource for CopyLockSource {
    fn name(&self) -> &'static str {
        "copylock"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Vec<ProtectionEvidence> {
        let mut best: Option<(ConfidenceTier, u8, CopyLockInfo, TrackRegion)> = None;
        for rev in ctx.revolutions {
            let Some((info, region)) = self.detect(rev) else {
                continue;
            };
            let Some((tier, confidence)) = info.grade() else {
                continue;
            };
            let better = match &best {
                Some((_, c, i, _)) => (confidence, info.sync_ct()) > (*c, i.sync_ct()),
                None => true,
            };
            if better {
                best = Some((tier, confidence, info, region));
            }
        }

        let Some((tier, confidence, info, region)) = best else {
            return Vec::new();
        };

        log::debug!(
            "CopyLockSource::analyze(): Track {}: {} variant, {} syncs, signature: {}, seed: {:?}",
            ctx.ch,
            info.variant,
            info.sync_ct(),
            info.signature,
            info.seed
        );

        vec![ProtectionEvidence {
            scheme: ProtectionScheme::CopyLock,
            confidence,
            tier,
            location: EvidenceLocation {
                ch: ctx.ch,
                sector: None,
                bits: Some(region),
            },
            payload: EvidencePayload::CopyLock(info),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bitstream_codec::{mfm::encode_mfm, push_raw_u16},
        types::{DiskCh, TrackDataEncoding},
    };

    const SEED: u32 = 0x2B5A1C;

    fn sector_data(sector: usize, signature: bool) -> Vec<u8> {
        let offset = keystream_offset(sector);
        if sector == COPYLOCK_SIGNATURE_SECTOR && signature {
            let mut data = COPYLOCK_SIGNATURE.to_vec();
            data.extend(Lfsr::keystream(SEED, offset, COPYLOCK_SECTOR_BYTES - COPYLOCK_SIGNATURE.len()));
            data
        }
        else {
            Lfsr::keystream(SEED, offset, COPYLOCK_SECTOR_BYTES)
        }
    }

    fn copylock_track(sectors: usize, signature: bool, syncs: &[u16; COPYLOCK_SECTOR_CT]) -> (BitVec, Vec<usize>) {
        copylock_layout(sectors, signature, syncs, 0, None)
    }

    /// Lay out CopyLock sectors after `lead` gap bytes, padded to at least 100,000 cells.
    /// A `damaged` sector has one data byte altered.
    fn copylock_layout(
        sectors: usize,
        signature: bool,
        syncs: &[u16; COPYLOCK_SECTOR_CT],
        lead: usize,
        damaged: Option<usize>,
    ) -> (BitVec, Vec<usize>) {
        let mut bits = encode_mfm(&vec![0u8; lead], false);
        let mut positions = Vec::new();
        let mut prev = false;
        for (sector, sync) in syncs.iter().enumerate().take(sectors) {
            bits.extend(encode_mfm(&[0u8; 24], prev).iter());
            positions.push(bits.len());
            push_raw_u16(&mut bits, *sync);
            let mut data = sector_data(sector, signature);
            if damaged == Some(sector) {
                data[100] ^= 0x01;
            }
            bits.extend(encode_mfm(&data, sync & 1 != 0).iter());
            prev = data[data.len() - 1] & 1 != 0;
        }
        let pad = 100_000usize.saturating_sub(bits.len()) / MFM_BYTE_LEN;
        bits.extend(encode_mfm(&vec![0u8; pad], prev).iter());
        (bits, positions)
    }

    /// Rotate a track so that it begins at cell `cut`.
    fn rotate(bits: &BitVec, cut: usize) -> BitVec {
        bits.iter().skip(cut).chain(bits.iter().take(cut)).collect()
    }

    fn analyze(revs: &[DecodedRevolution]) -> Vec<ProtectionEvidence> {
        let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs, &[]);
        CopyLockSource::new(3.0).analyze(&ctx)
    }

    fn rev(bits: BitVec) -> DecodedRevolution {
        DecodedRevolution::from_bits(DiskCh::new(0, 0), bits, 2000.0)
    }

    fn info(evidence: &ProtectionEvidence) -> &CopyLockInfo {
        match &evidence.payload {
            EvidencePayload::CopyLock(info) => info,
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn lfsr_keystream() {
        assert_eq!(Lfsr::keystream(SEED, 0, 8), vec![0x56, 0xAD, 0x5A, 0xB5, 0x6B, 0xD6, 0xAD, 0x5A]);

        let mut lfsr = Lfsr::new(SEED);
        for _ in 0..1000 {
            let before = lfsr;
            lfsr.advance();
            let mut back = lfsr;
            back.retreat();
            assert_eq!(back, before);
        }
    }

    #[test]
    fn lfsr_state_recovery() {
        let stream = Lfsr::keystream(SEED, 0, 64);
        assert_eq!(Lfsr::recover(&stream), Some(SEED));
        assert_eq!(Lfsr::recover(&stream[..7]), None);

        // Too short to pin every bit, but whatever is found must reproduce the sample.
        let partial = Lfsr::recover(&stream[..12]).unwrap();
        assert_eq!(Lfsr::keystream(partial, 0, 12), stream[..12].to_vec());

        let mut corrupt = stream.clone();
        corrupt[40] ^= 0x10;
        assert_eq!(Lfsr::recover(&corrupt), None);
        assert_eq!(Lfsr::recover(&[0u8; 16]), None);
    }

    #[test]
    fn keystream_offsets() {
        assert_eq!(keystream_offset(0), 0);
        assert_eq!(keystream_offset(6), 3072);
        assert_eq!(keystream_offset(7), 3568);
    }

    #[test]
    fn full_track_with_signature_is_certain() {
        let (bits, positions) = copylock_track(11, true, &STANDARD_SYNCS);
        let evidence = analyze(&[rev(bits)]);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
        assert_eq!(evidence[0].confidence, 95);
        assert_eq!(evidence[0].location.bits.map(|r| r.start), Some(positions[0]));

        let info = info(&evidence[0]);
        assert_eq!(info.variant, CopyLockVariant::Standard);
        assert_eq!(info.sync_ct(), 11);
        assert!(info.signature);
        assert_eq!(info.seed, Some(SEED));
        assert!(info.seed_verified);
    }

    #[test]
    fn sectors_far_from_index_are_found() {
        let (bits, positions) = copylock_layout(11, true, &STANDARD_SYNCS, 1500, None);
        assert_eq!(positions[0], (1500 + 24) * MFM_BYTE_LEN);

        let evidence = analyze(&[rev(bits)]);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
        assert_eq!(evidence[0].location.bits.map(|r| r.start), Some(positions[0]));

        let info = info(&evidence[0]);
        assert_eq!(info.sync_ct(), 11);
        assert_eq!(info.seed, Some(SEED));
        assert!(info.seed_verified);
    }

    #[test]
    fn track_wrapping_the_index_is_found() {
        let (bits, positions) = copylock_track(11, true, &STANDARD_SYNCS);
        // Start the revolution in the gap before sector 6, so sectors 6-10 precede 0-5.
        let cut = positions[6] - 8 * MFM_BYTE_LEN;
        let bits = rotate(&bits, cut);

        let hits = CopyLockSource::find_sectors(&bits, CopyLockVariant::Standard);
        assert_eq!(hits.len(), 11);
        assert_eq!(hits[6].pos, 8 * MFM_BYTE_LEN);
        assert_eq!(hits[0].pos, bits.len() - cut + positions[0]);
        assert!(hits[10].pos < hits[0].pos);

        let evidence = analyze(&[rev(bits)]);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
        let info = info(&evidence[0]);
        assert_eq!(info.sync_ct(), 11);
        assert_eq!(info.seed, Some(SEED));
        assert!(info.seed_verified);
    }

    #[test]
    fn damaged_sector_is_placed_by_its_neighbours() {
        let (bits, positions) = copylock_layout(11, true, &STANDARD_SYNCS, 0, Some(3));
        let hits = CopyLockSource::find_sectors(&bits, CopyLockVariant::Standard);
        assert_eq!(hits.len(), 11);
        assert_eq!(hits[3].sector, 3);
        assert_eq!(hits[3].pos, positions[3]);
        assert_eq!(hits[3].implied_seed(), None);

        let evidence = analyze(&[rev(bits)]);
        let info = info(&evidence[0]);
        assert_eq!(info.sync_ct(), 11);
        assert_eq!(info.seed, Some(SEED));
        // The damaged sector no longer matches the stream.
        assert!(!info.seed_verified);
    }

    #[test]
    fn old_variant_without_signature_is_likely() {
        let (bits, _) = copylock_track(11, false, &OLD_SYNCS);
        let evidence = analyze(&[rev(bits)]);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Likely);
        let info = info(&evidence[0]);
        assert_eq!(info.variant, CopyLockVariant::Old);
        assert!(!info.signature);
    }

    #[test]
    fn sector_timing_raises_tier() {
        let (bits, positions) = copylock_track(8, false, &STANDARD_SYNCS);
        let plain = analyze(&[rev(bits.clone())]);
        assert_eq!(plain[0].tier, ConfidenceTier::Possible);
        assert_eq!(plain[0].confidence, 60);

        let mut timed = rev(bits);
        let p = positions[4];
        for t in &mut timed.bit_times[p - TIMING_WINDOW..p + TIMING_WINDOW] {
            *t = 1900.0;
        }
        let evidence = analyze(&[timed]);
        assert_eq!(evidence[0].tier, ConfidenceTier::Likely);
        assert_eq!(info(&evidence[0]).timing_matches, 1);
    }

    #[test]
    fn partial_track_is_possible() {
        let (bits, _) = copylock_track(5, false, &STANDARD_SYNCS);
        let evidence = analyze(&[rev(bits)]);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].tier, ConfidenceTier::Possible);
        assert_eq!(info(&evidence[0]).sync_ct(), 5);
    }

    #[test]
    fn standard_address_marks_are_not_syncs() {
        let sectors: Vec<_> = (1..=9)
            .map(|s| crate::track_schema::FormatSector::new(crate::types::DiskChsn::new(0, 0, s, 2), vec![s; 512]))
            .collect();
        let bits = crate::track_schema::format_track(TrackDataEncoding::Mfm, &sectors, 84, 100_000);
        assert!(CopyLockSource::find_sectors(&bits, CopyLockVariant::Standard).is_empty());
        assert!(analyze(&[rev(bits)]).is_empty());
    }

    #[test]
    fn two_syncs_are_not_enough() {
        let (bits, _) = copylock_track(2, false, &STANDARD_SYNCS);
        assert!(analyze(&[rev(bits)]).is_empty());
    }
}
