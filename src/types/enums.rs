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

    src/types/enums.rs

    Defines common enum types
*/
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// The type of data encoding used by a track.
/// fluxsift recognizes three families of data encodings:
/// * Fm: Frequency Modulation encoding. Used by older 8" diskettes, and 'duplication mark' tracks
///   on some 3.5" and 5.25" diskettes.
/// * Mfm: Modified Frequency Modulation encoding. Used by almost all PC 5.25" and 3.5" diskettes,
///   Amiga 3.5" diskettes, and Macintosh 1.44MB 3.5" diskettes.
/// * Gcr: Group Code Recording encoding. Used by Apple and Commodore diskettes. GCR tracks can be
///   classified from their flux timings, but fluxsift does not decode GCR sectors.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackDataEncoding {
    #[doc = "Frequency Modulation encoding. Used by older 8&quot; diskettes, and duplication tracks on some 5.25&quot; diskettes."]
    Fm,
    #[default]
    #[doc = "Modified Frequency Modulation encoding. Used by almost all 5.25&quot; and 3.5&quot; diskettes."]
    Mfm,
    #[doc = "Group Code Recording encoding. Used by Apple and Commodore diskettes."]
    Gcr,
}

impl TrackDataEncoding {
    /// Return true if fluxsift can decode sectors from a track of this encoding.
    pub fn is_decodable(&self) -> bool {
        matches!(self, TrackDataEncoding::Fm | TrackDataEncoding::Mfm)
    }
}

impl Display for TrackDataEncoding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TrackDataEncoding::Fm => write!(f, "FM"),
            TrackDataEncoding::Mfm => write!(f, "MFM"),
            TrackDataEncoding::Gcr => write!(f, "GCR"),
        }
    }
}

/// The density of data recording on a disk track.
///
/// * `Standard` density: typically referring to FM encoding, typically used by 8" diskettes.
/// * `Double` density: typically referring to MFM encoding at 250/300Kbps. Appeared on 5.25" and 3.5" diskettes.
/// * `High` density: typically referring to MFM encoding at 500Kbps. Appeared on 5.25" and 3.5" diskettes.
/// * `Extended` density: typically referring to MFM encoding at 1Mbps. Appeared on 3.5" diskettes.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackDensity {
    Standard,
    #[default]
    Double,
    High,
    Extended,
}

impl Display for TrackDensity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use TrackDensity::*;
        match self {
            Standard => write!(f, "Standard"),
            Double => write!(f, "Double"),
            High => write!(f, "High"),
            Extended => write!(f, "Extended"),
        }
    }
}

impl TrackDensity {
    /// Return the base number of bitcells for a given disk density.
    /// It is ideal to provide the disk RPM to get the most accurate bitcell count as high
    /// density 5.25 disks have different bitcell counts than high density 3.5 disks.
    ///
    /// The value provided is only an estimate for the ideal bitcell count. The actual bitcell
    /// count may vary depending on variances in the disk drive used to write the diskette.
    pub fn bitcells(&self, rpm: Option<DiskRpm>) -> usize {
        use TrackDensity::*;
        match (self, rpm) {
            (Standard, _) => 50_000,
            (Double, _) => 100_000,
            (High, Some(DiskRpm::Rpm360)) => 166_666,
            (High, Some(DiskRpm::Rpm300) | None) => 200_000,
            (Extended, _) => 400_000,
        }
    }

    /// Return a value in nanoseconds representing the base clock of a PLL for a given density.
    /// A `DiskRpm` may be provided for double density disks, as the clock is adjusted for
    /// double-density disks read in high-density 360RPM drives.
    pub fn base_clock_ns(&self, rpm: Option<DiskRpm>) -> f64 {
        match (self, rpm) {
            (TrackDensity::Standard, _) => 4000.0,
            (TrackDensity::Double, None | Some(DiskRpm::Rpm300)) => 2000.0,
            (TrackDensity::Double, Some(DiskRpm::Rpm360)) => 1666.0,
            (TrackDensity::High, _) => 1000.0,
            (TrackDensity::Extended, _) => 500.0,
        }
    }

    /// Attempt to determine the disk density from the base clock of a PLL, in nanoseconds.
    pub fn from_base_clock_ns(clock: f64) -> Option<TrackDensity> {
        match clock {
            375.0..625.0 => Some(TrackDensity::Extended),
            750.0..1250.0 => Some(TrackDensity::High),
            1500.0..2500.0 => Some(TrackDensity::Double),
            3000.0..5000.0 => Some(TrackDensity::Standard),
            _ => None,
        }
    }
}

/// TrackDataRate defines the data rate of a track - for MFM and FM encoding, this is the
/// bit rate / 2.
/// TrackDataRate defines standard data rate categories, while storing a clock adjustment factor to
/// make possible calculation of the exact data rate if required.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackDataRate {
    RateNonstandard(u32),
    Rate125Kbps(f64),
    Rate250Kbps(f64),
    Rate300Kbps(f64),
    Rate500Kbps(f64),
    Rate1000Kbps(f64),
}

impl Default for TrackDataRate {
    fn default() -> Self {
        TrackDataRate::Rate250Kbps(1.0)
    }
}

impl From<TrackDataRate> for u32 {
    fn from(rate: TrackDataRate) -> Self {
        use TrackDataRate::*;
        match rate {
            Rate125Kbps(f) => (125_000.0 * f) as u32,
            Rate250Kbps(f) => (250_000.0 * f) as u32,
            Rate300Kbps(f) => (300_000.0 * f) as u32,
            Rate500Kbps(f) => (500_000.0 * f) as u32,
            Rate1000Kbps(f) => (1_000_000.0 * f) as u32,
            RateNonstandard(rate) => rate,
        }
    }
}

/// Implement a conversion from a u32 to a TrackDataRate.
/// An 8-15% rate deviance is allowed for standard rates, otherwise a RateNonstandard is returned.
impl From<u32> for TrackDataRate {
    fn from(rate: u32) -> Self {
        use TrackDataRate::*;
        match rate {
            93_750..143_750 => Rate125Kbps(rate as f64 / 125_000.0),
            212_000..271_000 => Rate250Kbps(rate as f64 / 250_000.0),
            271_000..345_000 => Rate300Kbps(rate as f64 / 300_000.0),
            425_000..575_000 => Rate500Kbps(rate as f64 / 500_000.0),
            850_000..1_150_000 => Rate1000Kbps(rate as f64 / 1_000_000.0),
            _ => RateNonstandard(rate),
        }
    }
}

impl Display for TrackDataRate {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        use TrackDataRate::*;
        match self {
            RateNonstandard(rate) => write!(fmt, "*{}Kbps", rate / 1000),
            Rate125Kbps(f) => write!(fmt, "125Kbps (x{:.2})", f),
            Rate250Kbps(f) => write!(fmt, "250Kbps (x{:.2})", f),
            Rate300Kbps(f) => write!(fmt, "300Kbps (x{:.2})", f),
            Rate500Kbps(f) => write!(fmt, "500Kbps (x{:.2})", f),
            Rate1000Kbps(f) => write!(fmt, "1000Kbps (x{:.2})", f),
        }
    }
}

impl TrackDataRate {
    /// Return the nominal bitcell period in nanoseconds for this data rate. FM and MFM both
    /// record two bitcells per data bit.
    pub fn bitcell_ns(&self) -> f64 {
        let rate = u32::from(*self);
        if rate == 0 {
            return 0.0;
        }
        1.0e9 / (rate as f64 * 2.0)
    }
}

/// A `DiskRpm` may represent the standard rotation speed of a disk, or the actual
/// rotation speed of a disk drive while capturing a disk. Double density 5.25" disk drives rotate
/// at 300RPM, but a double-density disk read in a high-density 5.25" drive may rotate at 360RPM.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskRpm {
    /// A 300 RPM base rotation rate.
    #[default]
    Rpm300,
    /// A 360 RPM base rotation rate.
    Rpm360,
}

impl From<DiskRpm> for f64 {
    /// Convert a DiskRpm to a floating-point RPM value.
    fn from(rpm: DiskRpm) -> Self {
        match rpm {
            DiskRpm::Rpm300 => 300.0,
            DiskRpm::Rpm360 => 360.0,
        }
    }
}

impl Display for DiskRpm {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DiskRpm::Rpm300 => write!(f, "300RPM"),
            DiskRpm::Rpm360 => write!(f, "360RPM"),
        }
    }
}

/// The type of data address mark following a sector header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataMark {
    /// A normal data address mark (0xFB).
    Normal,
    /// A deleted data address mark (0xF8).
    Deleted,
    /// A data mark using one of the seldom-seen variants (0xF9, 0xFA).
    Unusual(u8),
}

impl DataMark {
    pub fn byte(&self) -> u8 {
        match self {
            DataMark::Normal => 0xFB,
            DataMark::Deleted => 0xF8,
            DataMark::Unusual(b) => *b,
        }
    }
}

impl Display for DataMark {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DataMark::Normal => write!(f, "DAM"),
            DataMark::Deleted => write!(f, "DDAM"),
            DataMark::Unusual(b) => write!(f, "DAM({:02X})", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_rate_bitcell_period() {
        assert_eq!(TrackDataRate::Rate250Kbps(1.0).bitcell_ns(), 2000.0);
        assert_eq!(TrackDataRate::Rate500Kbps(1.0).bitcell_ns(), 1000.0);
        assert_eq!(TrackDataRate::Rate125Kbps(1.0).bitcell_ns(), 4000.0);
    }

    #[test]
    fn density_from_base_clock() {
        assert_eq!(TrackDensity::from_base_clock_ns(2000.0), Some(TrackDensity::Double));
        assert_eq!(TrackDensity::from_base_clock_ns(1000.0), Some(TrackDensity::High));
        assert_eq!(TrackDensity::from_base_clock_ns(100.0), None);
    }
}
