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

    src/types/chs.rs

    Defines the physical track address (DiskCh) and the sector ID (DiskChsn)
    types.
*/
use crate::MAXIMUM_SECTOR_SIZE;
use std::fmt::Display;

/// A structure representing a sector ID as recorded in a sector header:
///  - Cylinder (c)
///  - Head (h)
///  - Sector ID (s)
///  - Sector Size (n)
///
/// Note that the values recorded in a sector header need not match the physical track the
/// sector was read from.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskChsn {
    c: u16,
    h: u8,
    s: u8,
    n: u8,
}

impl Default for DiskChsn {
    fn default() -> Self {
        Self { c: 0, h: 0, s: 1, n: 2 }
    }
}

impl From<(u16, u8, u8, u8)> for DiskChsn {
    fn from((c, h, s, n): (u16, u8, u8, u8)) -> Self {
        Self { c, h, s, n }
    }
}

impl Display for DiskChsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} s:{:3} n:{}]", self.c, self.h, self.s, self.n)
    }
}

impl DiskChsn {
    /// Create a new DiskChsn structure from the four sector ID components.
    pub fn new(c: u16, h: u8, s: u8, n: u8) -> Self {
        Self { c, h, s, n }
    }

    /// Create a DiskChsn from the four raw bytes of a sector header.
    pub fn from_id_bytes(bytes: [u8; 4]) -> Self {
        Self {
            c: bytes[0] as u16,
            h: bytes[1],
            s: bytes[2],
            n: bytes[3],
        }
    }

    /// Return the four raw bytes of a sector header for this ID.
    pub fn id_bytes(&self) -> [u8; 4] {
        [self.c as u8, self.h, self.s, self.n]
    }

    /// Return the cylinder (c) field.
    #[inline]
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return the sector id (s) field.
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
    /// Return a `DiskCh` structure representing the cylinder and head components of a DiskChsn.
    #[inline]
    pub fn ch(&self) -> DiskCh {
        DiskCh::new(self.c, self.h)
    }
    /// Return the size (n) field.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
    /// Return the size of the 'n' parameter in bytes.
    /// The formula for calculating size from n is (128 * 2^n)
    /// We enforce a maximum size of 8192 bytes for a single sector.
    #[inline]
    pub fn n_size(&self) -> usize {
        Self::n_to_bytes(self.n)
    }

    /// Convert the value of the sector size field (n) into bytes.
    #[inline]
    pub fn n_to_bytes(n: u8) -> usize {
        if n > 6 {
            MAXIMUM_SECTOR_SIZE
        }
        else {
            128usize << n
        }
    }

    /// Return true if the size field exceeds the largest size a controller can transfer.
    #[inline]
    pub fn n_oversized(&self) -> bool {
        self.n > 6
    }
}

/// A structure representing a physical track address: cylinder (c) and head (h).
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskCh {
    pub(crate) c: u16,
    pub(crate) h: u8,
}

impl From<(u16, u8)> for DiskCh {
    fn from((c, h): (u16, u8)) -> Self {
        Self { c, h }
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{} h:{}]", self.c, self.h)
    }
}

impl DiskCh {
    /// Create a new DiskCh structure from a Cylinder (c) and Head (h) specifier.
    pub fn new(c: u16, h: u8) -> Self {
        Self { c, h }
    }
    /// Return the cylinder (c) field.
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    pub fn h(&self) -> u8 {
        self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_size_is_clamped() {
        assert_eq!(DiskChsn::new(0, 0, 1, 0).n_size(), 128);
        assert_eq!(DiskChsn::new(0, 0, 1, 2).n_size(), 512);
        assert_eq!(DiskChsn::new(0, 0, 1, 6).n_size(), 8192);
        assert_eq!(DiskChsn::new(0, 0, 1, 7).n_size(), 8192);
        assert_eq!(DiskChsn::new(0, 0, 1, 255).n_size(), 8192);
        assert!(DiskChsn::new(0, 0, 1, 7).n_oversized());
    }

    #[test]
    fn id_bytes_round_trip() {
        let id = DiskChsn::new(39, 1, 9, 2);
        assert_eq!(DiskChsn::from_id_bytes(id.id_bytes()), id);
    }
}
