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

    tests/protection.rs

    Protection analysis over recovered tracks and synthetic protected
    tracks.
*/
mod common;

use bit_vec::BitVec;
use common::*;
use fluxsift::{
    bitstream_codec::{encode, push_raw_u16},
    copy_protection::{
        copylock::{keystream_offset, Lfsr, COPYLOCK_SIGNATURE, STANDARD_SYNCS},
        AnalysisContext,
        ConfidenceTier,
        EvidencePayload,
    },
    prelude::*,
    AnalyzerConfig,
    DiskRpm,
};

const SEED: u32 = 0x3A1F07;

fn analyzer() -> ProtectionAnalyzer {
    ProtectionAnalyzer::new(AnalyzerConfig::default()).unwrap()
}

fn recover_flux(bits: &BitVec) -> fluxsift::recovery::TrackRecovery {
    let ch = DiskCh::new(1, 0);
    mfm_engine()
        .recover_track(ch, &revolutions(ch, bits, MFM_CELL_NS, 0.03, 3))
        .unwrap()
}

/// A CopyLock track holding the first `sectors` sectors, each preceded by a short gap.
fn copylock_track(sectors: usize) -> BitVec {
    let mut bits = BitVec::new();
    let mut prev = false;
    for (sector, sync) in STANDARD_SYNCS.iter().enumerate().take(sectors) {
        bits.extend(encode(TrackDataEncoding::Mfm, &[0u8; 24], prev).iter());
        push_raw_u16(&mut bits, *sync);
        let data = if sector == 6 {
            let mut data = COPYLOCK_SIGNATURE.to_vec();
            data.extend(Lfsr::keystream(SEED, keystream_offset(sector), 496));
            data
        }
        else {
            Lfsr::keystream(SEED, keystream_offset(sector), 512)
        };
        bits.extend(encode(TrackDataEncoding::Mfm, &data, sync & 1 != 0).iter());
        prev = data[511] & 1 != 0;
    }
    let pad = (100_000 - bits.len()) / 16;
    bits.extend(encode(TrackDataEncoding::Mfm, &vec![0u8; pad], prev).iter());
    bits
}

#[test]
fn long_track_is_reported() {
    init();
    let record = analyzer()
        .analyze_recovery(&recover_flux(&pc_track(1, 110_000)), DiskRpm::Rpm300)
        .unwrap();
    assert_eq!(record.good_sector_ct(), 9);
    assert_eq!(record.evidence().len(), 1);

    let evidence = &record.evidence()[0];
    assert_eq!(evidence.scheme, ProtectionScheme::LongTrack);
    assert_eq!(evidence.tier, ConfidenceTier::Likely);
    match evidence.payload {
        EvidencePayload::TrackLength { nominal, deviation, .. } => {
            assert_eq!(nominal, 100_000);
            assert!(deviation > 9.9 && deviation < 10.1);
        }
        ref other => panic!("unexpected payload: {:?}", other),
    }
}

#[test]
fn nominal_track_is_clean() {
    init();
    let record = analyzer()
        .analyze_recovery(&recover_flux(&pc_track(1, 100_000)), DiskRpm::Rpm300)
        .unwrap();
    assert_eq!(record.good_sector_ct(), 9);
    assert!(record.evidence().is_empty());
}

#[test]
fn copylock_through_the_pll() {
    init();
    let bits = copylock_track(11);
    let flux = FluxRevolution::from_ns(DiskCh::new(0, 0), 0, bits_to_flux(&bits, MFM_CELL_NS)).unwrap();
    let decoded = FluxDecoder::new(MFM_CELL_NS, PllConfig::default())
        .unwrap()
        .decode(&flux);
    let revs = vec![decoded];

    let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &revs, &[]);
    let evidence = analyzer().analyze(&ctx).unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].scheme, ProtectionScheme::CopyLock);
    assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
    match &evidence[0].payload {
        EvidencePayload::CopyLock(info) => {
            assert_eq!(info.sync_ct(), 11);
            assert!(info.signature);
            assert_eq!(info.seed, Some(SEED));
            assert!(info.seed_verified);
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[test]
fn partial_copylock_is_possible() {
    init();
    let revs = vec![DecodedRevolution::from_bits(DiskCh::new(0, 0), copylock_track(4), MFM_CELL_NS)];
    let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &revs, &[]);
    let evidence = analyzer().analyze(&ctx).unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].scheme, ProtectionScheme::CopyLock);
    assert_eq!(evidence[0].tier, ConfidenceTier::Possible);
}

#[test]
fn speedlock_regions_are_found() {
    init();
    let mut rev = DecodedRevolution::from_bits(DiskCh::new(0, 0), pc_track(0, 100_000), MFM_CELL_NS);
    for t in &mut rev.bit_times[78_048..79_968] {
        *t = 2200.0;
    }
    for t in &mut rev.bit_times[79_968..81_888] {
        *t = 1800.0;
    }
    let revs = vec![rev];
    let ctx = AnalysisContext::new(DiskCh::new(0, 0), TrackDataEncoding::Mfm, &revs, &[]);
    let evidence = analyzer().analyze(&ctx).unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].scheme, ProtectionScheme::Speedlock);
    assert_eq!(evidence[0].tier, ConfidenceTier::Certain);
}

#[test]
fn tracks_are_analyzed_in_order() {
    init();
    let long = recover_flux(&pc_track(1, 110_000));
    let nominal = recover_flux(&pc_track(1, 100_000));
    let contexts = vec![
        AnalysisContext::from_recovery(&nominal),
        AnalysisContext::from_recovery(&long),
        AnalysisContext::from_recovery(&nominal),
    ];
    let results = analyzer().analyze_tracks(&contexts).unwrap();
    let counts: Vec<usize> = results.iter().map(|r| r.len()).collect();
    assert_eq!(counts, vec![0, 1, 0]);
}

#[test]
fn evidence_capacity_is_an_error() {
    init();
    let mut sectors = pc_sectors(0);
    sectors[3].id = sectors[2].id;
    let bits = fluxsift::track_schema::format_track(TrackDataEncoding::Mfm, &sectors, 84, 110_000);
    let revs = vec![DecodedRevolution::from_bits(DiskCh::new(0, 0), bits, MFM_CELL_NS)];
    let recovery = mfm_engine()
        .recover_decoded(DiskCh::new(0, 0), TrackDataEncoding::Mfm, revs)
        .unwrap();

    let full = analyzer().analyze(&AnalysisContext::from_recovery(&recovery)).unwrap();
    let schemes: Vec<_> = full.iter().map(|e| e.scheme).collect();
    assert_eq!(schemes, vec![ProtectionScheme::LongTrack, ProtectionScheme::DuplicateSectorId]);

    let tight = ProtectionAnalyzer::new(AnalyzerConfig {
        evidence_capacity: 1,
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(
        tight.analyze(&AnalysisContext::from_recovery(&recovery)),
        Err(SiftError::CapacityExceeded { limit: 1, .. })
    ));
}
