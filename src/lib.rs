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

    src/lib.rs

    fluxsift recovers sector data from floppy flux captures and reports
    evidence of copy protection found along the way.
*/

//! # fluxsift
//!
//! fluxsift is a library for turning raw flux-transition timing captures of floppy media into
//! validated sector data, and for identifying copy-protection schemes that live in the same
//! captures.
//!
//! The pipeline, leaves first:
//!
//! * [`flux::FluxDecoder`] recovers a bitcell stream from a single revolution of flux intervals
//!   with an adaptive PLL clock. [`flux::EncodingClassifier`] inspects interval histograms to
//!   guess the modulation in use.
//! * [`track_schema::System34Decoder`] scans a bitcell stream for address marks and decodes
//!   CHRN-identified sectors, verifying CRCs as it goes.
//! * [`recovery::RecoveryEngine`] votes across several passes over the same track to resolve
//!   weak and marginal bits.
//! * [`copy_protection::ProtectionAnalyzer`] produces a ranked list of protection evidence from
//!   decoded tracks and their timing.
//!
//! Nothing in the library performs I/O. Captured flux is supplied by the caller, and results are
//! plain read-only structures.

pub mod bitstream_codec;
mod bounded;
pub mod config;
pub mod copy_protection;
pub mod flux;
pub mod recovery;
pub mod track;
pub mod track_schema;
pub mod types;
pub mod util;

use thiserror::Error;

pub use crate::{
    bounded::BoundedVec,
    config::{AnalyzerConfig, PllConfig, RecoveryConfig},
    copy_protection::{ProtectionAnalyzer, ProtectionEvidence, ProtectionScheme},
    flux::{DecodedRevolution, EncodingClassifier, FluxDecoder, FluxRevolution},
    recovery::{RecoveryEngine, RecoveryStatus},
    track::{SectorRecord, TrackRecord},
    track_schema::System34Decoder,
    types::{DiskCh, DiskChsn, DiskRpm, SectorCondition, SectorStatus, TrackDataEncoding, TrackDataRate, TrackDensity},
};

pub const MAXIMUM_SECTOR_SIZE: usize = 8192;
pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// The default maximum number of sectors accepted on a single track.
pub const DEFAULT_SECTOR_CAPACITY: usize = 64;
/// The default maximum number of protection evidence entries accepted for a single track.
pub const DEFAULT_EVIDENCE_CAPACITY: usize = 8;
/// The default maximum number of histogram peaks considered during encoding classification.
pub const DEFAULT_PEAK_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum SiftError {
    #[error("No input data was provided: {0}")]
    EmptyInput(&'static str),
    #[error("Configuration value '{field}' out of range: {value} (expected {expected})")]
    ConfigError {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("Capacity exceeded: more than {limit} {what}")]
    CapacityExceeded { what: &'static str, limit: usize },
    #[error("Invalid parameters were specified to a library function")]
    ParameterError,
}

pub type SiftResult<T> = Result<T, SiftError>;

pub mod prelude {
    pub use crate::{
        config::{AnalyzerConfig, PllConfig, RecoveryConfig},
        copy_protection::{AnalysisContext, ProtectionAnalyzer, ProtectionEvidence, ProtectionScheme},
        flux::{DecodedRevolution, EncodingClassifier, FluxDecoder, FluxRevolution},
        recovery::{RecoveryEngine, RecoveryPass, RecoveryResult, RecoveryStatus},
        track::{SectorRecord, TrackRecord},
        track_schema::System34Decoder,
        types::{DiskCh, DiskChsn, SectorCondition, SectorStatus, TrackDataEncoding, TrackDataRate},
        SiftError,
        SiftResult,
    };
}
