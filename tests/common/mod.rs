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

    tests/common/mod.rs

    Common support routines for tests: logging, and synthesis of flux
    revolutions from bitcell streams.
*/
#![allow(dead_code)]

use bit_vec::BitVec;
use fluxsift::{
    prelude::*,
    track_schema::{format_track, FormatSector},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const MFM_CELL_NS: f64 = 2000.0;
pub const FM_CELL_NS: f64 = 4000.0;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Convert a bitcell stream into the flux intervals that would produce it. Cells after the
/// final transition are lost.
pub fn bits_to_flux(bits: &BitVec, bitcell_ns: f64) -> Vec<f64> {
    let mut intervals = Vec::new();
    let mut cells = 0usize;
    for bit in bits.iter() {
        cells += 1;
        if bit {
            intervals.push(cells as f64 * bitcell_ns);
            cells = 0;
        }
    }
    intervals
}

/// As [bits_to_flux], with each interval displaced by up to `jitter` (a fraction of a
/// bitcell) in either direction. The same seed always yields the same flux.
pub fn jittered_flux(bits: &BitVec, bitcell_ns: f64, jitter: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    bits_to_flux(bits, bitcell_ns)
        .into_iter()
        .map(|interval| interval + rng.gen_range(-jitter..=jitter) * bitcell_ns)
        .collect()
}

/// Build `count` jittered revolutions of the same bitstream.
pub fn revolutions(ch: DiskCh, bits: &BitVec, bitcell_ns: f64, jitter: f64, count: usize) -> Vec<FluxRevolution> {
    (0..count)
        .map(|i| FluxRevolution::from_ns(ch, i, jittered_flux(bits, bitcell_ns, jitter, 0x5EED + i as u64)).unwrap())
        .collect()
}

/// Nine 512-byte MFM sectors on cylinder `c`, each filled with its sector number.
pub fn pc_sectors(c: u16) -> Vec<FormatSector> {
    (1..=9)
        .map(|s| FormatSector::new(DiskChsn::new(c, 0, s, 2), vec![s; 512]))
        .collect()
}

pub fn pc_track(c: u16, bit_len: usize) -> BitVec {
    format_track(TrackDataEncoding::Mfm, &pc_sectors(c), 84, bit_len)
}

pub fn mfm_engine() -> RecoveryEngine {
    RecoveryEngine::new(RecoveryConfig {
        encoding_hint: Some(TrackDataEncoding::Mfm),
        ..Default::default()
    })
    .unwrap()
}
