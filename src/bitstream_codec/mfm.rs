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

    src/bitstream_codec/mfm.rs

    MFM encoding and the System 34 address marker patterns.
*/
use bit_vec::BitVec;

pub const MFM_BYTE_LEN: usize = 16;
pub const MFM_MARKER_LEN: usize = 64;

/// The A1 sync byte written with a missing clock bit.
pub const MFM_SYNC_WORD: u16 = 0x4489;
/// A 0x00 gap byte as MFM bitcells, when preceded by a 0 data bit.
pub const MFM_ZERO_WORD: u16 = 0xAAAA;

/// Encode a byte slice as MFM bitcells.
/// A 1 is encoded as 01. A 0 is encoded as 10 if the previous data bit was 0, otherwise 00.
pub fn encode_mfm(data: &[u8], prev_bit: bool) -> BitVec {
    let mut bitvec = BitVec::with_capacity(data.len() * MFM_BYTE_LEN);
    let mut previous_bit = prev_bit;

    for &byte in data {
        for i in 0..8 {
            let bit = (byte & (0x80 >> i)) != 0;
            if bit {
                // 1 is encoded as 01
                bitvec.push(false);
                bitvec.push(true);
            }
            else {
                // 0 is encoded as 10 if previous bit was 0, otherwise 00
                bitvec.push(!previous_bit);
                bitvec.push(false);
            }
            previous_bit = bit;
        }
    }
    bitvec
}

/// Encode a four byte marker into a 64-bit MFM pattern. A0 bytes ("A1" syncs) are written with
/// their missing clock bit.
pub fn encode_marker(data: &[u8; 4]) -> u64 {
    let mut accum: u64 = 0;
    // A mark is always preceded by a SYNC block of 0's, so we know the previous bit will always
    // be 0.
    let mut previous_bit = false;

    for &byte in data {
        if byte == 0xA1 {
            accum = (accum << 16) | MFM_SYNC_WORD as u64;
            previous_bit = true;
            continue;
        }
        for i in (0..8).rev() {
            let bit = (byte & (1 << i)) != 0;
            if bit {
                // 1 is encoded as 01
                accum = (accum << 2) | 0b01;
            }
            else if !previous_bit {
                accum = (accum << 2) | 0b10;
            }
            else {
                accum <<= 2;
            }
            previous_bit = bit;
        }
    }
    accum
}

/// Return true if the clock cells of `word` obey the MFM clock rule: a clock cell is set only
/// between two zero data cells. `prev_data` is the data bit preceding the word.
pub fn clock_valid(word: u16, prev_data: bool) -> bool {
    let mut prev = prev_data;
    for i in 0..8 {
        let clock = word & (0x8000 >> (i * 2)) != 0;
        let data = word & (0x4000 >> (i * 2)) != 0;
        if clock != (!prev && !data) {
            return false;
        }
        prev = data;
    }
    true
}
