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

    src/recovery/correction.rs

    Repair of voted sector data that still fails its CRC.
*/
use crate::util::crc_ibm_3740;

/// Upper bound on the combinations of alternate values tried.
const MAX_COMBINATIONS: usize = 4096;
/// Largest payload, in bytes, for which single bit flips are tried.
pub const MAX_FLIP_PAYLOAD: usize = 1024;

/// How a field was repaired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Correction {
    /// Alternate values seen in other passes were substituted at these offsets.
    Alternates(Vec<usize>),
    /// A single bit was inverted.
    BitFlip { offset: usize, bit: u8 },
}

/// Return true if `field` (payload followed by its big-endian CRC) checks out. A correct CRC
/// leaves a zero remainder.
#[inline]
pub fn field_valid(field: &[u8], prefix_crc: u16) -> bool {
    crc_ibm_3740(field, Some(prefix_crc)) == 0
}

/// Try to repair `field` in place. `prefix_crc` is the CRC of the bytes preceding the field
/// (sync and mark). `alternates` lists the losing values seen at each weak offset.
///
/// Alternate values are tried first, then single bit flips if the payload is small enough.
/// On failure the field is left unchanged.
pub fn correct_field(field: &mut [u8], prefix_crc: u16, alternates: &[(usize, Vec<u8>)]) -> Option<Correction> {
    if field.len() < 2 {
        return None;
    }
    if let Some(offsets) = try_alternates(field, prefix_crc, alternates) {
        log::debug!(
            "correct_field(): Repaired with alternates at offsets {:?}",
            offsets
        );
        return Some(Correction::Alternates(offsets));
    }
    if field.len() - 2 <= MAX_FLIP_PAYLOAD {
        if let Some((offset, bit)) = try_bit_flips(field, prefix_crc) {
            log::debug!("correct_field(): Repaired with bit flip at {}:{}", offset, bit);
            return Some(Correction::BitFlip { offset, bit });
        }
    }
    None
}

fn try_alternates(field: &mut [u8], prefix_crc: u16, alternates: &[(usize, Vec<u8>)]) -> Option<Vec<usize>> {
    let choices: Vec<(usize, u8, &[u8])> = alternates
        .iter()
        .filter(|(offset, alts)| *offset < field.len() && !alts.is_empty())
        .map(|(offset, alts)| (*offset, field[*offset], alts.as_slice()))
        .collect();
    if choices.is_empty() {
        return None;
    }

    // Odometer over the choices at each offset; digit 0 is the voted value.
    let mut digits = vec![0usize; choices.len()];
    for _ in 0..MAX_COMBINATIONS {
        let mut carry = true;
        for (digit, (_, _, alts)) in digits.iter_mut().zip(choices.iter()) {
            if !carry {
                break;
            }
            *digit += 1;
            if *digit > alts.len() {
                *digit = 0;
            }
            else {
                carry = false;
            }
        }
        if carry {
            // Every combination has been tried.
            break;
        }

        for (digit, (offset, original, alts)) in digits.iter().zip(choices.iter()) {
            field[*offset] = if *digit == 0 { *original } else { alts[*digit - 1] };
        }
        if field_valid(field, prefix_crc) {
            return Some(
                digits
                    .iter()
                    .zip(choices.iter())
                    .filter(|(d, _)| **d != 0)
                    .map(|(_, (offset, _, _))| *offset)
                    .collect(),
            );
        }
    }

    for (offset, original, _) in &choices {
        field[*offset] = *original;
    }
    None
}

fn try_bit_flips(field: &mut [u8], prefix_crc: u16) -> Option<(usize, u8)> {
    for offset in 0..field.len() {
        for bit in 0..8u8 {
            field[offset] ^= 1 << bit;
            if field_valid(field, prefix_crc) {
                return Some((offset, bit));
            }
            field[offset] ^= 1 << bit;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_field(payload: &[u8], prefix_crc: u16) -> Vec<u8> {
        let crc = crc_ibm_3740(payload, Some(prefix_crc));
        let mut field = payload.to_vec();
        field.extend_from_slice(&crc.to_be_bytes());
        field
    }

    #[test]
    fn repairs_with_alternate_value() {
        let prefix = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFB], None);
        let good = valid_field(&[0x10; 64], prefix);
        let mut bad = good.clone();
        bad[7] = 0x55;
        bad[9] = 0x66;

        let alternates = vec![(7, vec![0x33, 0x10]), (9, vec![0x10])];
        let fix = correct_field(&mut bad, prefix, &alternates);
        assert_eq!(fix, Some(Correction::Alternates(vec![7, 9])));
        assert_eq!(bad, good);
    }

    #[test]
    fn repairs_single_bit() {
        let prefix = crc_ibm_3740(&[0xFB], None);
        let good = valid_field(&(0..=255u8).collect::<Vec<_>>(), prefix);
        let mut bad = good.clone();
        bad[100] ^= 0x08;

        let fix = correct_field(&mut bad, prefix, &[]);
        assert_eq!(fix, Some(Correction::BitFlip { offset: 100, bit: 3 }));
        assert_eq!(bad, good);
    }

    #[test]
    fn leaves_unrepairable_field_untouched() {
        let prefix = crc_ibm_3740(&[0xFB], None);
        let mut bad = valid_field(&[0u8; 2048], prefix);
        bad[0] ^= 0x01;
        bad[1] ^= 0x01;
        let before = bad.clone();
        assert_eq!(correct_field(&mut bad, prefix, &[(0, vec![0x02])]), None);
        assert_eq!(bad, before);
    }
}
