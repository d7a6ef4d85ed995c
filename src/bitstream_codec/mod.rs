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

    src/bitstream_codec/mod.rs

    Bit-level helpers for FM and MFM encoded bitstreams. Both encodings
    interleave a clock cell before each data cell, so decoding is shared;
    encoding differs only in the clock rule.
*/

pub mod fm;
pub mod mfm;

use crate::types::TrackDataEncoding;
use bit_vec::BitVec;

/// Read 16 raw bitcells starting at `index`, MSB first.
pub fn read_raw_u16(bits: &BitVec, index: usize) -> Option<u16> {
    if index + 16 > bits.len() {
        return None;
    }
    let mut word = 0u16;
    for i in 0..16 {
        word = (word << 1) | bits[index + i] as u16;
    }
    Some(word)
}

/// Decode the data byte whose 16 bitcells (clock, data, clock, data...) start at `index`.
pub fn decode_byte(bits: &BitVec, index: usize) -> Option<u8> {
    if index + 16 > bits.len() {
        return None;
    }
    let mut byte = 0u8;
    for i in 0..8 {
        byte = (byte << 1) | bits[index + i * 2 + 1] as u8;
    }
    Some(byte)
}

/// Decode up to `count` bytes starting at bitcell `index`. Decoding stops early at the end of
/// the bitstream; the returned vector then holds fewer than `count` bytes.
pub fn decode_bytes(bits: &BitVec, index: usize, count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        match decode_byte(bits, index + i * 16) {
            Some(byte) => out.push(byte),
            None => break,
        }
    }
    out
}

/// Find the next occurrence of a raw 16-bitcell word at or after `start`.
pub fn find_raw_u16(bits: &BitVec, pattern: u16, start: usize) -> Option<usize> {
    if bits.len() < 16 || start > bits.len() - 16 {
        return None;
    }
    let mut shift_reg: u16 = 0;
    for (i, bit) in bits.iter().enumerate().skip(start) {
        shift_reg = (shift_reg << 1) | bit as u16;
        if i >= start + 15 && shift_reg == pattern {
            return Some(i - 15);
        }
    }
    None
}

/// Encode `data` with the given encoding. `prev_bit` is the last data bit written before
/// `data`, which affects the first MFM clock bit.
///
/// GCR is not supported and produces an empty bitstream.
pub fn encode(encoding: TrackDataEncoding, data: &[u8], prev_bit: bool) -> BitVec {
    match encoding {
        TrackDataEncoding::Mfm => mfm::encode_mfm(data, prev_bit),
        TrackDataEncoding::Fm => fm::encode_fm(data),
        TrackDataEncoding::Gcr => {
            log::warn!("bitstream_codec::encode(): GCR encoding is not supported");
            BitVec::new()
        }
    }
}

/// Append the raw cells of a 16-bit word to a bitstream, MSB first.
pub fn push_raw_u16(bits: &mut BitVec, word: u16) {
    for i in (0..16).rev() {
        bits.push(word & (1 << i) != 0);
    }
}
