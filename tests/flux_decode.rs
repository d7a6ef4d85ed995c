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

    tests/flux_decode.rs

    Flux to bitcell to byte decoding through the PLL.
*/
mod common;

use common::*;
use fluxsift::{bitstream_codec::decode_bytes, bitstream_codec::encode, prelude::*};
use proptest::prelude::*;

fn every_byte() -> Vec<u8> {
    let mut data: Vec<u8> = (0..=255u8).collect();
    // Cells after the last transition are not recoverable; pad past them.
    data.extend_from_slice(&[0x4E, 0x4E]);
    data
}

fn round_trip(encoding: TrackDataEncoding, bitcell_ns: f64, jitter: f64) -> Vec<u8> {
    let bits = encode(encoding, &every_byte(), false);
    let flux = if jitter > 0.0 {
        jittered_flux(&bits, bitcell_ns, jitter, 256)
    }
    else {
        bits_to_flux(&bits, bitcell_ns)
    };
    let revolution = FluxRevolution::from_ns(DiskCh::new(0, 0), 0, flux).unwrap();
    let decoded = FluxDecoder::new(bitcell_ns, PllConfig::default())
        .unwrap()
        .decode(&revolution);
    decode_bytes(&decoded.bits, 0, 256)
}

#[test]
fn every_byte_value_round_trips_mfm() {
    init();
    let expected: Vec<u8> = (0..=255u8).collect();
    assert_eq!(round_trip(TrackDataEncoding::Mfm, MFM_CELL_NS, 0.0), expected);
    assert_eq!(round_trip(TrackDataEncoding::Mfm, MFM_CELL_NS, 0.04), expected);
}

#[test]
fn every_byte_value_round_trips_fm() {
    init();
    let expected: Vec<u8> = (0..=255u8).collect();
    assert_eq!(round_trip(TrackDataEncoding::Fm, FM_CELL_NS, 0.0), expected);
    assert_eq!(round_trip(TrackDataEncoding::Fm, FM_CELL_NS, 0.04), expected);
}

#[test]
fn decoded_track_has_nominal_length() {
    init();
    let bits = pc_track(0, 100_000);
    let revolution = FluxRevolution::from_ns(DiskCh::new(0, 0), 0, bits_to_flux(&bits, MFM_CELL_NS)).unwrap();
    let decoded = FluxDecoder::new(MFM_CELL_NS, PllConfig::default())
        .unwrap()
        .decode(&revolution);

    // The trailing gap byte ends in two empty cells.
    assert_eq!(decoded.len(), 100_000 - 2);
    assert!(decoded.sync_losses.is_empty());
    assert!((decoded.average_bitcell_ns() - MFM_CELL_NS).abs() < 1.0);

    let scan = System34Decoder::new(TrackDataEncoding::Mfm)
        .unwrap()
        .scan_revolution(&decoded)
        .unwrap();
    assert_eq!(scan.good_sector_ct(), 9);
}

proptest! {
    #[test]
    fn identical_flux_decodes_identically(data in prop::collection::vec(any::<u8>(), 1..512), seed in any::<u64>()) {
        let bits = encode(TrackDataEncoding::Mfm, &data, false);
        let flux = jittered_flux(&bits, MFM_CELL_NS, 0.05, seed);
        let mut decoder = FluxDecoder::new(MFM_CELL_NS, PllConfig::default()).unwrap();
        let first = decoder.decode_intervals(&flux);
        let second = decoder.decode_intervals(&flux);
        prop_assert_eq!(&first.bits, &second.bits);
        prop_assert_eq!(&first.bit_times, &second.bit_times);
        prop_assert_eq!(first.sync_losses, second.sync_losses);
    }

    #[test]
    fn clean_mfm_flux_recovers_data(data in prop::collection::vec(any::<u8>(), 1..256)) {
        let mut padded = data.clone();
        padded.push(0x4E);
        let bits = encode(TrackDataEncoding::Mfm, &padded, false);
        let mut decoder = FluxDecoder::new(MFM_CELL_NS, PllConfig::default()).unwrap();
        let decoded = decoder.decode_intervals(&bits_to_flux(&bits, MFM_CELL_NS));
        prop_assert_eq!(decode_bytes(&decoded.bits, 0, data.len()), data);
    }
}
