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

    src/bitstream_codec/fm.rs

    FM encoding and FM address mark patterns.
*/
use bit_vec::BitVec;

pub const FM_BYTE_LEN: usize = 16;

/// The clock pattern recorded with FM address marks.
pub const FM_MARK_CLOCK: u8 = 0xC7;
/// A 0x00 gap byte as FM bitcells.
pub const FM_ZERO_WORD: u16 = 0xAAAA;

/// Encode a byte slice as FM bitcells. Every data bit is preceded by a set clock bit.
pub fn encode_fm(data: &[u8]) -> BitVec {
    let mut bitvec = BitVec::with_capacity(data.len() * FM_BYTE_LEN);
    for &byte in data {
        for i in 0..8 {
            bitvec.push(true);
            bitvec.push(byte & (0x80 >> i) != 0);
        }
    }
    bitvec
}

/// Interleave a clock byte and a data byte into a 16-bitcell FM word.
pub fn encode_fm_word(data: u8, clock: u8) -> u16 {
    let mut word = 0u16;
    for i in (0..8).rev() {
        word = (word << 1) | ((clock >> i) & 1) as u16;
        word = (word << 1) | ((data >> i) & 1) as u16;
    }
    word
}

/// Split a 16-bitcell FM word into its (data, clock) bytes.
pub fn decode_fm_word(word: u16) -> (u8, u8) {
    let mut data = 0u8;
    let mut clock = 0u8;
    for i in 0..8 {
        clock = (clock << 1) | ((word >> (15 - i * 2)) & 1) as u8;
        data = (data << 1) | ((word >> (14 - i * 2)) & 1) as u8;
    }
    (data, clock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fm_mark_words() {
        assert_eq!(encode_fm_word(0xFE, FM_MARK_CLOCK), 0xF57E);
        assert_eq!(encode_fm_word(0xFB, FM_MARK_CLOCK), 0xF56F);
        assert_eq!(encode_fm_word(0xF8, FM_MARK_CLOCK), 0xF56A);
        assert_eq!(encode_fm_word(0x00, 0xFF), FM_ZERO_WORD);
        assert_eq!(decode_fm_word(0xF57E), (0xFE, FM_MARK_CLOCK));
    }
}
