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

    src/types/flags.rs

    Defines sector status flags, and the tagged enum view over them.
*/

use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};
use strum::{EnumIter, IntoEnumIterator};

bitflags! {
    /// Status flags recorded against a decoded sector. Each flag is independent; a sector may
    /// have any combination of them.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct SectorStatus: u16 {
        #[doc = "The CRC of the sector header did not match the recorded CRC"]
        const CRC_ID_BAD    = 0b0000_0000_0000_0001;
        #[doc = "The CRC of the sector data did not match the recorded CRC"]
        const CRC_DATA_BAD  = 0b0000_0000_0000_0010;
        #[doc = "No data address mark was found following the sector header"]
        const MISSING_DATA  = 0b0000_0000_0000_0100;
        #[doc = "The sector header repeats the ID of an earlier sector on the same track"]
        const DUPLICATE_ID  = 0b0000_0000_0000_1000;
        #[doc = "The sector size field is larger than any controller can transfer"]
        const SIZE_MISMATCH = 0b0000_0000_0001_0000;
        #[doc = "The bitstream ended before the sector data was complete"]
        const TRUNCATED     = 0b0000_0000_0010_0000;
        #[doc = "The sync pattern preceding a marker was incomplete or unusually short"]
        const WEAK_SYNC     = 0b0000_0000_0100_0000;
        #[doc = "The data address mark was a seldom-used variant"]
        const UNUSUAL_MARK  = 0b0000_0000_1000_0000;
        #[doc = "The sector has a deleted data address mark"]
        const DELETED       = 0b0000_0001_0000_0000;
        #[doc = "The sector data CRC was repaired during multi-pass recovery"]
        const CORRECTED     = 0b0000_0010_0000_0000;
    }
}

/// A tagged view over a single [SectorStatus] flag, allowing exhaustive handling of each
/// condition a sector may have.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorCondition {
    CrcIdBad,
    CrcDataBad,
    MissingData,
    DuplicateId,
    SizeMismatch,
    Truncated,
    WeakSync,
    UnusualMark,
    Deleted,
    Corrected,
}

impl From<SectorCondition> for SectorStatus {
    fn from(condition: SectorCondition) -> Self {
        use SectorCondition::*;
        match condition {
            CrcIdBad => SectorStatus::CRC_ID_BAD,
            CrcDataBad => SectorStatus::CRC_DATA_BAD,
            MissingData => SectorStatus::MISSING_DATA,
            DuplicateId => SectorStatus::DUPLICATE_ID,
            SizeMismatch => SectorStatus::SIZE_MISMATCH,
            Truncated => SectorStatus::TRUNCATED,
            WeakSync => SectorStatus::WEAK_SYNC,
            UnusualMark => SectorStatus::UNUSUAL_MARK,
            Deleted => SectorStatus::DELETED,
            Corrected => SectorStatus::CORRECTED,
        }
    }
}

impl Display for SectorCondition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use SectorCondition::*;
        match self {
            CrcIdBad => write!(f, "CRC-ID-bad"),
            CrcDataBad => write!(f, "CRC-data-bad"),
            MissingData => write!(f, "missing-data"),
            DuplicateId => write!(f, "duplicate-id"),
            SizeMismatch => write!(f, "size-mismatch"),
            Truncated => write!(f, "truncated"),
            WeakSync => write!(f, "weak-sync"),
            UnusualMark => write!(f, "unusual-mark"),
            Deleted => write!(f, "deleted"),
            Corrected => write!(f, "corrected"),
        }
    }
}

impl SectorStatus {
    /// Return true if the sector carries a flag that means its data cannot be trusted as read.
    pub fn is_error(&self) -> bool {
        self.intersects(
            SectorStatus::CRC_ID_BAD | SectorStatus::CRC_DATA_BAD | SectorStatus::MISSING_DATA | SectorStatus::TRUNCATED,
        )
    }

    /// Iterate over the conditions set in this status.
    pub fn conditions(&self) -> impl Iterator<Item = SectorCondition> + '_ {
        SectorCondition::iter().filter(move |c| self.contains(SectorStatus::from(*c)))
    }

    pub fn has(&self, condition: SectorCondition) -> bool {
        self.contains(SectorStatus::from(condition))
    }
}

impl Display for SectorStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ok");
        }
        let names: Vec<String> = self.conditions().map(|c| c.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_condition_maps_to_a_distinct_flag() {
        let mut all = SectorStatus::empty();
        for condition in SectorCondition::iter() {
            let flag = SectorStatus::from(condition);
            assert_eq!(flag.bits().count_ones(), 1);
            assert!(!all.contains(flag));
            all |= flag;
        }
        assert_eq!(all, SectorStatus::all());
    }

    #[test]
    fn conditions_round_trip() {
        let status = SectorStatus::CRC_DATA_BAD | SectorStatus::DUPLICATE_ID;
        let conditions: Vec<_> = status.conditions().collect();
        assert_eq!(conditions, vec![SectorCondition::CrcDataBad, SectorCondition::DuplicateId]);
        assert!(status.is_error());
        assert_eq!(status.to_string(), "CRC-data-bad,duplicate-id");
    }
}
