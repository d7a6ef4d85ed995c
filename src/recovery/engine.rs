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

    src/recovery/engine.rs

    The multi-pass recovery engine.
*/
use std::collections::HashMap;

use crate::{
    config::{RecoveryConfig, MAX_PASS_COUNT},
    flux::{DecodedRevolution, EncodingClassification, EncodingClassifier, FluxDecoder, FluxRevolution},
    recovery::{
        correction::{correct_field, field_valid},
        vote::vote_bytes,
        PassSource,
        RecoveryPass,
        RecoveryResult,
        RecoveryStatus,
    },
    track::{SectorRecord, TrackRecord, TrackRecordBuilder},
    track_schema::{system34::mark_crc, System34Decoder, TrackScan},
    types::{CrcCheck, DiskCh, DiskChsn, SectorCondition, SectorStatus, TrackDataEncoding},
    util::crc_ibm_3740,
    SiftError,
};

/// Everything produced by recovering one track: the assembled record plus the per-revolution
/// intermediate results, which protection analysis consumes.
#[derive(Clone, Debug)]
pub struct TrackRecovery {
    /// [RecoveryStatus::InsufficientPasses] when fewer than `min_passes` revolutions were
    /// supplied, [RecoveryStatus::LowConfidence] when the track confidence is below
    /// `confidence_threshold`. The track is populated either way.
    pub status: RecoveryStatus,
    pub track: TrackRecord,
    pub revolutions: Vec<DecodedRevolution>,
    pub scans: Vec<TrackScan>,
    /// The histogram classification, if the encoding was not given in the configuration.
    pub classification: Option<EncodingClassification>,
}

/// Votes across passes and recovers tracks from multiple revolutions.
///
/// The engine holds only its validated configuration and may be shared between threads.
#[derive(Clone, Debug)]
pub struct RecoveryEngine {
    config: RecoveryConfig,
}

impl RecoveryEngine {
    /// Create an engine. The configuration is validated; out-of-range values are an error.
    pub fn new(config: RecoveryConfig) -> Result<Self, SiftError> {
        config.validate()?;
        Ok(RecoveryEngine { config })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Vote across the supplied passes.
    ///
    /// Fewer passes than `min_passes` yields [RecoveryStatus::InsufficientPasses] with no data.
    /// More than 64 passes is an error.
    pub fn vote(&self, passes: &[RecoveryPass]) -> Result<RecoveryResult, SiftError> {
        if passes.len() > MAX_PASS_COUNT as usize {
            return Err(SiftError::CapacityExceeded {
                what:  "passes",
                limit: MAX_PASS_COUNT as usize,
            });
        }
        let crc_passes = passes.iter().filter(|p| p.crc_ok).count();
        if passes.len() < self.config.min_passes as usize {
            log::debug!(
                "RecoveryEngine::vote(): {} passes supplied, {} required",
                passes.len(),
                self.config.min_passes
            );
            return Ok(RecoveryResult::insufficient(passes.len(), crc_passes));
        }

        let voted = vote_bytes(passes);
        let status = if voted.overall < self.config.confidence_threshold {
            RecoveryStatus::LowConfidence
        }
        else {
            RecoveryStatus::Recovered
        };

        log::trace!(
            "RecoveryEngine::vote(): {} passes, {} bytes, confidence {} -> {}",
            passes.len(),
            voted.data.len(),
            voted.overall,
            status
        );

        Ok(RecoveryResult {
            status,
            data: Some(voted.data),
            confidence: voted.overall,
            byte_confidence: voted.confidence,
            weak: voted.weak,
            passes_used: passes.len(),
            crc_passes,
        })
    }

    /// Pull passes from `source` until `min_passes` have been seen and at least
    /// `required_crc_passes` of them passed CRC, or until `max_passes` is reached or the source
    /// runs dry. Then vote.
    ///
    /// If the passes run out before enough of them passed CRC, the voted data is returned with
    /// [RecoveryStatus::Unconfirmed].
    pub fn recover<S: PassSource + ?Sized>(&self, source: &mut S) -> Result<RecoveryResult, SiftError> {
        let mut passes = Vec::with_capacity(self.config.min_passes as usize);
        let mut crc_ct = 0;

        while passes.len() < self.config.max_passes as usize {
            if passes.len() >= self.config.min_passes as usize && crc_ct >= self.config.required_crc_passes as usize {
                break;
            }
            match source.next_pass() {
                Some(pass) => {
                    if pass.crc_ok {
                        crc_ct += 1;
                    }
                    passes.push(pass);
                }
                None => {
                    log::debug!("RecoveryEngine::recover(): Source exhausted after {} passes", passes.len());
                    break;
                }
            }
        }

        let mut result = self.vote(&passes)?;
        if result.data.is_some() && crc_ct < self.config.required_crc_passes as usize {
            log::debug!(
                "RecoveryEngine::recover(): {} of {} passes passed CRC, {} required",
                crc_ct,
                passes.len(),
                self.config.required_crc_passes
            );
            result.status = RecoveryStatus::Unconfirmed;
        }
        Ok(result)
    }

    /// The outcome of a whole track, from the number of revolutions and the track confidence.
    fn track_status(&self, revolution_ct: usize, confidence: u8) -> RecoveryStatus {
        if revolution_ct < self.config.min_passes as usize {
            RecoveryStatus::InsufficientPasses
        }
        else if confidence < self.config.confidence_threshold {
            RecoveryStatus::LowConfidence
        }
        else {
            RecoveryStatus::Recovered
        }
    }

    /// Decide the encoding and nominal bitcell period for a track.
    fn resolve_encoding(
        &self,
        revolution: &FluxRevolution,
    ) -> Result<(TrackDataEncoding, f64, Option<EncodingClassification>), SiftError> {
        if let Some(encoding) = self.config.encoding_hint {
            return Ok((encoding, self.config.bitcell_ns(encoding), None));
        }

        let classification = EncodingClassifier::new(self.config.peak_capacity).classify_revolution(revolution)?;
        match (classification.encoding, classification.bitcell_ns) {
            (Some(encoding), Some(bitcell)) if encoding.is_decodable() => {
                // Snap to the standard clock of the detected density when there is one.
                let bitcell = classification
                    .density
                    .map(|d| d.base_clock_ns(Some(self.config.rpm)))
                    .unwrap_or(bitcell);
                log::debug!(
                    "RecoveryEngine::resolve_encoding(): Classified as {} with bitcell {}",
                    encoding,
                    crate::format_us!(bitcell)
                );
                Ok((encoding, bitcell, Some(classification)))
            }
            (encoding, _) => {
                // Fall back to transition counts against the configured MFM clock.
                let stats = revolution.stats(self.config.bitcell_ns(TrackDataEncoding::Mfm));
                let fallback = stats.detect_encoding().unwrap_or(TrackDataEncoding::Mfm);
                log::warn!(
                    "RecoveryEngine::resolve_encoding(): Unusable classification {:?}, using {} from transition counts",
                    encoding,
                    fallback
                );
                Ok((fallback, self.config.bitcell_ns(fallback), Some(classification)))
            }
        }
    }

    fn decode_revolution(
        &self,
        revolution: &FluxRevolution,
        bitcell_ns: f64,
        schema: &System34Decoder,
    ) -> Result<(DecodedRevolution, TrackScan), SiftError> {
        let mut decoder = FluxDecoder::new(bitcell_ns, self.config.pll)?;
        let decoded = decoder.decode(revolution);
        let scan = schema.scan_revolution(&decoded)?;
        Ok((decoded, scan))
    }

    /// Recover a track from several captured revolutions.
    ///
    /// Each revolution is decoded independently. Sectors are matched across revolutions by
    /// their ID, so revolutions of differing lengths, or missing some sectors, still combine.
    pub fn recover_track(&self, ch: DiskCh, revolutions: &[FluxRevolution]) -> Result<TrackRecovery, SiftError> {
        let first = revolutions
            .first()
            .ok_or(SiftError::EmptyInput("no revolutions supplied"))?;
        if revolutions.len() > MAX_PASS_COUNT as usize {
            return Err(SiftError::CapacityExceeded {
                what:  "revolutions",
                limit: MAX_PASS_COUNT as usize,
            });
        }

        let (encoding, bitcell_ns, classification) = self.resolve_encoding(first)?;
        let schema = System34Decoder::new(encoding)?.with_sector_capacity(self.config.sector_capacity);

        #[cfg(feature = "parallel")]
        let decoded: Vec<(DecodedRevolution, TrackScan)> = {
            use rayon::prelude::*;
            revolutions
                .par_iter()
                .map(|r| self.decode_revolution(r, bitcell_ns, &schema))
                .collect::<Result<Vec<_>, SiftError>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let decoded: Vec<(DecodedRevolution, TrackScan)> = revolutions
            .iter()
            .map(|r| self.decode_revolution(r, bitcell_ns, &schema))
            .collect::<Result<Vec<_>, SiftError>>()?;

        let (revolutions, scans): (Vec<_>, Vec<_>) = decoded.into_iter().unzip();
        let mut recovery = self.assemble(ch, encoding, revolutions, scans)?;
        recovery.classification = classification;
        Ok(recovery)
    }

    /// Recover a track from revolutions that have already been decoded to bitcells.
    pub fn recover_decoded(
        &self,
        ch: DiskCh,
        encoding: TrackDataEncoding,
        revolutions: Vec<DecodedRevolution>,
    ) -> Result<TrackRecovery, SiftError> {
        if revolutions.is_empty() {
            return Err(SiftError::EmptyInput("no revolutions supplied"));
        }
        let schema = System34Decoder::new(encoding)?.with_sector_capacity(self.config.sector_capacity);
        let scans = revolutions
            .iter()
            .map(|r| schema.scan_revolution(r))
            .collect::<Result<Vec<_>, SiftError>>()?;
        self.assemble(ch, encoding, revolutions, scans)
    }

    fn assemble(
        &self,
        ch: DiskCh,
        encoding: TrackDataEncoding,
        revolutions: Vec<DecodedRevolution>,
        scans: Vec<TrackScan>,
    ) -> Result<TrackRecovery, SiftError> {
        // Match sectors across scans by ID and occurrence, in order of first appearance.
        let mut order: Vec<(DiskChsn, usize)> = Vec::new();
        let mut groups: HashMap<(DiskChsn, usize), Vec<(&SectorRecord, u8)>> = HashMap::new();

        for (revolution, scan) in revolutions.iter().zip(scans.iter()) {
            let quality = 100u8.saturating_sub((revolution.sync_losses.len() * 10).min(100) as u8);
            let mut occurrences: HashMap<DiskChsn, usize> = HashMap::new();
            for sector in &scan.sectors {
                let occurrence = occurrences.entry(sector.id).or_insert(0);
                let key = (sector.id, *occurrence);
                *occurrence += 1;
                groups
                    .entry(key)
                    .or_insert_with(|| {
                        order.push(key);
                        Vec::new()
                    })
                    .push((sector, quality));
            }
        }

        let mut builder = TrackRecordBuilder::new(ch, encoding, self.config.sector_capacity);
        let mut confidence_sum = 0usize;
        let mut confirmed_ct = 0usize;

        for key in &order {
            let Some(records) = groups.get(key)
            else {
                continue;
            };
            let (sector, crc_confirmed) = self.merge_sector(encoding, records);
            if crc_confirmed {
                confidence_sum += sector.confidence as usize;
                confirmed_ct += 1;
            }
            builder.push_sector(sector)?;
        }

        let confidence = if confirmed_ct > 0 { (confidence_sum / confirmed_ct) as u8 } else { 0 };
        let bit_len = revolutions.iter().map(|r| r.len()).sum::<usize>() / revolutions.len().max(1);
        let sync_losses = revolutions.iter().map(|r| r.sync_losses.len()).sum();

        builder.bit_len(bit_len).confidence(confidence).sync_losses(sync_losses);
        let track = builder.build();
        let status = self.track_status(revolutions.len(), confidence);

        log::debug!(
            "RecoveryEngine::assemble(): Track {} {}: {} sectors, {} good, confidence {} -> {}",
            ch,
            encoding,
            track.sector_ct(),
            track.good_sector_ct(),
            track.confidence(),
            status
        );

        Ok(TrackRecovery {
            status,
            track,
            revolutions,
            scans,
            classification: None,
        })
    }

    /// Combine every read of one sector. Returns the merged record and whether any read passed
    /// its data CRC.
    fn merge_sector(&self, encoding: TrackDataEncoding, records: &[(&SectorRecord, u8)]) -> (SectorRecord, bool) {
        // Reads with a complete data field take part in the vote, as payload followed by CRC.
        let passes: Vec<RecoveryPass> = records
            .iter()
            .filter_map(|(record, quality)| {
                record.data_crc.map(|crc| {
                    let mut field = record.data.clone();
                    field.extend_from_slice(&crc.recorded.to_be_bytes());
                    RecoveryPass::new(field, *quality, record.data_crc_valid())
                })
            })
            .collect();

        let good = records.iter().find(|(record, _)| record.data_crc_valid());
        let base = good
            .or_else(|| records.iter().find(|(record, _)| record.id_crc.is_valid()))
            .or_else(|| records.first());
        let mut sector = match base {
            Some((record, _)) => (*record).clone(),
            None => return (SectorRecord::default(), false),
        };

        if let Some((record, _)) = good {
            // A read that passed CRC wins outright. The vote only measures agreement.
            sector.confidence = if passes.len() >= 2 { vote_bytes(&passes).overall } else { 100 };
            if self.config.preserve_weak_bits && passes.len() >= 2 {
                let mut mask = vote_bytes(&passes).weak;
                mask.truncate(record.data.len());
                sector.weak_mask = Some(mask);
            }
            return (sector, true);
        }

        let result = match self.vote(&passes) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("RecoveryEngine::merge_sector(): Vote failed for {}: {}", sector.id, e);
                return (sector, false);
            }
        };
        let Some(mut field) = result.data.clone()
        else {
            sector.confidence = 0;
            return (sector, false);
        };
        let Some(mark) = sector.data_mark
        else {
            return (sector, false);
        };

        let prefix_crc = mark_crc(encoding, mark.byte());
        let mut repaired = field_valid(&field, prefix_crc);
        if !repaired && self.config.crc_correction {
            let alternates = vote_bytes(&passes).alternates;
            if correct_field(&mut field, prefix_crc, &alternates).is_some() {
                log::debug!("RecoveryEngine::merge_sector(): Corrected sector {}", sector.id);
                sector.flag(SectorCondition::Corrected);
                repaired = true;
            }
        }

        let payload_len = field.len().saturating_sub(2);
        let recorded = u16::from_be_bytes([field[payload_len], field[payload_len + 1]]);
        field.truncate(payload_len);
        let calculated = crc_ibm_3740(&field, Some(prefix_crc));
        sector.data_crc = Some(CrcCheck::new(recorded, calculated));
        if repaired {
            sector.status.remove(SectorStatus::CRC_DATA_BAD);
        }
        else {
            sector.status.insert(SectorStatus::CRC_DATA_BAD);
        }
        sector.data = field;
        sector.confidence = result.confidence;
        if self.config.preserve_weak_bits {
            let mut mask = result.weak;
            mask.truncate(payload_len);
            sector.weak_mask = Some(mask);
        }
        (sector, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        track_schema::{format_track, FormatSector},
        types::DataMark,
    };

    fn engine() -> RecoveryEngine {
        RecoveryEngine::new(RecoveryConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RecoveryConfig {
            min_passes: 0,
            ..Default::default()
        };
        assert!(RecoveryEngine::new(config).is_err());
    }

    #[test]
    fn vote_reports_weak_offset() {
        let passes = [
            RecoveryPass::new(vec![0xAA, 0xBB, 0xCC], 100, false),
            RecoveryPass::new(vec![0xAA, 0xBB, 0xCC], 100, false),
            RecoveryPass::new(vec![0xAA, 0xBB, 0xFF], 100, false),
        ];
        let result = engine().vote(&passes).unwrap();
        assert_eq!(result.status, RecoveryStatus::Recovered);
        assert_eq!(result.data, Some(vec![0xAA, 0xBB, 0xCC]));
        assert!(result.confidence >= 75);
        assert_eq!(result.weak_offsets(), vec![2]);
    }

    #[test]
    fn too_few_passes() {
        let passes = vec![RecoveryPass::new(vec![1, 2, 3], 100, true); 2];
        let result = engine().vote(&passes).unwrap();
        assert_eq!(result.status, RecoveryStatus::InsufficientPasses);
        assert!(result.data.is_none());

        let too_many = vec![RecoveryPass::new(vec![1], 100, true); 65];
        assert!(engine().vote(&too_many).is_err());
    }

    #[test]
    fn low_confidence_keeps_data() {
        let passes = [
            RecoveryPass::new(vec![1, 2], 100, false),
            RecoveryPass::new(vec![3, 4], 100, false),
            RecoveryPass::new(vec![5, 6], 100, false),
        ];
        let result = engine().vote(&passes).unwrap();
        assert_eq!(result.status, RecoveryStatus::LowConfidence);
        assert_eq!(result.data, Some(vec![1, 2]));
        assert_eq!(result.confidence, 33);
    }

    #[test]
    fn adaptive_recovery_stops_early() {
        let mut source = (0..10).map(|i| RecoveryPass::new(vec![7; 4], 100, i >= 1));
        let result = engine().recover(&mut source).unwrap();
        // Three passes satisfy the minimum, and two of them passed CRC.
        assert_eq!(result.status, RecoveryStatus::Recovered);
        assert_eq!(result.passes_used, 3);
        assert_eq!(result.crc_passes, 2);

        // No pass ever passes CRC: the maximum is used up and the data is kept, unconfirmed.
        let mut source = (0..10).map(|_| RecoveryPass::new(vec![7; 4], 100, false));
        let result = engine().recover(&mut source).unwrap();
        assert_eq!(result.status, RecoveryStatus::Unconfirmed);
        assert_eq!(result.passes_used, 5);
        assert_eq!(result.crc_passes, 0);
        assert_eq!(result.data, Some(vec![7; 4]));
        assert_eq!(result.confidence, 100);

        let mut source = std::iter::once(RecoveryPass::new(vec![7; 4], 100, true));
        let result = engine().recover(&mut source).unwrap();
        assert_eq!(result.status, RecoveryStatus::InsufficientPasses);
    }

    #[test]
    fn unconfirmed_source_running_dry() {
        // The source ends after the minimum, before any pass confirmed its CRC.
        let mut source = (0..4).map(|_| RecoveryPass::new(vec![7; 4], 100, false));
        let result = engine().recover(&mut source).unwrap();
        assert_eq!(result.status, RecoveryStatus::Unconfirmed);
        assert_eq!(result.passes_used, 4);

        let config = RecoveryConfig {
            required_crc_passes: 0,
            ..Default::default()
        };
        let mut source = (0..10).map(|_| RecoveryPass::new(vec![7; 4], 100, false));
        let result = RecoveryEngine::new(config).unwrap().recover(&mut source).unwrap();
        assert_eq!(result.status, RecoveryStatus::Recovered);
        assert_eq!(result.passes_used, 3);
    }

    fn revolution(sectors: &[FormatSector]) -> DecodedRevolution {
        let bits = format_track(TrackDataEncoding::Mfm, sectors, 22, 100_000);
        DecodedRevolution::from_bits(DiskCh::new(0, 0), bits, 2000.0)
    }

    #[test]
    fn crc_good_pass_wins() {
        let id = DiskChsn::new(0, 0, 1, 2);
        let mut bad = FormatSector::new(id, vec![0x11; 512]);
        bad.data[10] = 0x99;
        bad.bad_crc = true;
        let good = FormatSector::new(id, vec![0x11; 512]);

        let revs = vec![revolution(&[bad.clone()]), revolution(&[bad]), revolution(&[good])];
        let recovery = engine().recover_decoded(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs).unwrap();
        let sector = &recovery.track.sectors()[0];
        assert!(sector.is_valid());
        assert_eq!(sector.data, vec![0x11; 512]);
        assert_eq!(sector.weak_ct(), 1);
        assert!(recovery.track.confidence() > 0);
    }

    #[test]
    fn single_revolution_is_insufficient() {
        let sector = FormatSector::new(DiskChsn::new(0, 0, 1, 2), vec![0x42; 512]);
        let revs = vec![revolution(&[sector])];
        let recovery = engine().recover_decoded(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs).unwrap();
        assert_eq!(recovery.status, RecoveryStatus::InsufficientPasses);
        // The sector read in that revolution is still there.
        assert_eq!(recovery.track.sector_ct(), 1);
        assert!(recovery.track.sectors()[0].is_valid());
        assert_eq!(recovery.track.confidence(), 100);
    }

    #[test]
    fn voted_sector_is_corrected() {
        let id = DiskChsn::new(0, 0, 3, 1);
        let payload: Vec<u8> = (0..=255).collect();
        let good = format_track(TrackDataEncoding::Mfm, &[FormatSector::new(id, payload.clone())], 22, 0);
        let scan = System34Decoder::new(TrackDataEncoding::Mfm).unwrap().scan(&good).unwrap();
        let data_start = scan.sectors[0].data_offset.unwrap() + 64;

        // Damage the same byte in every revolution by inverting one data cell. The CRC-less vote
        // then disagrees with the recorded CRC and is repaired with a single bit flip.
        let mut damaged = good.clone();
        let cell = data_start + 40 * 16 + 1;
        let value = damaged[cell];
        damaged.set(cell, !value);
        let revs: Vec<_> = (0..3)
            .map(|_| DecodedRevolution::from_bits(DiskCh::new(0, 0), damaged.clone(), 2000.0))
            .collect();

        let recovery = engine().recover_decoded(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs).unwrap();
        let sector = &recovery.track.sectors()[0];
        assert!(sector.has(SectorCondition::Corrected));
        assert!(!sector.has(SectorCondition::CrcDataBad));
        assert_eq!(sector.data, payload);
        // No read passed CRC, so the track confidence is zero.
        assert_eq!(recovery.track.confidence(), 0);
        assert_eq!(recovery.status, RecoveryStatus::LowConfidence);
    }

    #[test]
    fn deleted_mark_survives_merge() {
        let id = DiskChsn::new(0, 0, 1, 2);
        let mut sector = FormatSector::new(id, vec![0xE5; 512]);
        sector.mark = DataMark::Deleted;
        let revs = vec![revolution(&[sector.clone()]), revolution(&[sector])];
        let recovery = engine().recover_decoded(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs).unwrap();
        assert!(recovery.track.sectors()[0].has(SectorCondition::Deleted));
        assert_eq!(recovery.track.confidence(), 100);
    }
}
