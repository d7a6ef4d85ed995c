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

    src/util.rs

    CRC and small byte helpers shared by the decoding and recovery layers.
*/

/// The CRC-16-CCITT polynomial used by IBM System 34 style sector headers and data.
pub const CRC_CCITT_POLY: u16 = 0x1021;
/// The CRC register is preset to all ones before the sync bytes are fed in.
pub const CRC_CCITT_INIT: u16 = 0xFFFF;

const CRC_TABLE: [u16; 256] = crc_table();

const fn crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_CCITT_POLY
            }
            else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate a CRC-16-CCITT (CRC-16/IBM-3740) over `data`.
/// An optional starting value may be provided to continue a CRC over several buffers;
/// otherwise the register starts at 0xFFFF.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    data.iter().fold(start.unwrap_or(CRC_CCITT_INIT), |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[(((crc >> 8) as u8) ^ byte) as usize]
    })
}

/// Calculate a CRC-16-CCITT one bit at a time. Used to cross-check the table.
#[allow(dead_code)]
pub(crate) fn crc_ibm_3740_bitwise(data: &[u8], start: Option<u16>) -> u16 {
    let mut crc = start.unwrap_or(CRC_CCITT_INIT);
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _j in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC_CCITT_POLY;
            }
            else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Produce a short hex dump of a byte slice for log output.
pub fn dump_slice(data: &[u8], max_len: usize) -> String {
    let mut out = String::with_capacity(max_len * 3);
    for (i, byte) in data.iter().take(max_len).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    if data.len() > max_len {
        out.push_str(" ...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_check_value() {
        assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
        assert_eq!(crc_ibm_3740_bitwise(b"123456789", None), 0x29B1);
    }

    #[test]
    fn crc_continues_across_buffers() {
        let whole = crc_ibm_3740(b"123456789", None);
        let first = crc_ibm_3740(b"1234", None);
        assert_eq!(crc_ibm_3740(b"56789", Some(first)), whole);
    }

    #[test]
    fn crc_of_marker_and_crc_is_zero() {
        // Appending a CRC big-endian to its data yields a zero remainder.
        let mut data = vec![0xA1, 0xA1, 0xA1, 0xFE, 0x00, 0x00, 0x01, 0x02];
        let crc = crc_ibm_3740(&data, None);
        data.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc_ibm_3740(&data, None), 0);
    }

    #[test]
    fn dump_slice_truncates() {
        assert_eq!(dump_slice(&[0xAA, 0xBB, 0xCC], 2), "AA BB ...");
    }
}
