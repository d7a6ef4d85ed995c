/*
    fstool
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

    crates/fstool/src/args.rs

    Command line argument parsers shared between fstool commands.
*/
use bpaf::*;
use std::{path::PathBuf, str::FromStr};

use fluxsift::{DiskCh, DiskRpm, TrackDataEncoding};

use crate::{
    analyze::args::{analyze_parser, AnalyzeParams},
    recover::args::{recover_parser, RecoverParams},
};

/// The modulation to decode with. `Auto` defers to histogram classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingArg {
    Auto,
    Mfm,
    Fm,
}

impl FromStr for EncodingArg {
    type Err = &'static str;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "auto" => Ok(EncodingArg::Auto),
            "mfm" => Ok(EncodingArg::Mfm),
            "fm" => Ok(EncodingArg::Fm),
            _ => Err("Invalid encoding; expected 'auto', 'mfm', or 'fm'"),
        }
    }
}

impl EncodingArg {
    pub fn hint(&self) -> Option<TrackDataEncoding> {
        match self {
            EncodingArg::Auto => None,
            EncodingArg::Mfm => Some(TrackDataEncoding::Mfm),
            EncodingArg::Fm => Some(TrackDataEncoding::Fm),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Command {
    Version,
    Recover(RecoverParams),
    Analyze(AnalyzeParams),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Version => write!(f, "version"),
            Command::Recover(_) => write!(f, "recover"),
            Command::Analyze(_) => write!(f, "analyze"),
        }
    }
}

#[derive(Debug)]
pub struct AppParams {
    pub global: GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub silent: bool,
}

/// The options every track-level command takes.
#[derive(Debug, Clone)]
pub struct TrackOptions {
    pub in_file: PathBuf,
    pub ch: DiskCh,
    pub encoding: EncodingArg,
    pub rate: Option<u32>,
    pub rpm: DiskRpm,
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let silent = long("silent")
        .help("Suppress all output except required output")
        .switch();

    construct!(GlobalOptions { silent })
}

pub(crate) fn in_file_parser() -> impl Parser<PathBuf> {
    long("in_file")
        .short('i')
        .argument::<PathBuf>("IN_FILE")
        .help("Path to a flux interval file: one revolution per line, intervals in nanoseconds")
}

pub(crate) fn command_parser() -> impl Parser<AppParams> {
    let global = global_options_parser();

    let version = pure(Command::Version)
        .to_options()
        .command("version")
        .help("Display version information and exit");

    let recover = construct!(Command::Recover(recover_parser()))
        .to_options()
        .command("recover")
        .help("Recover sector data from a multi-revolution flux capture");
    let analyze = construct!(Command::Analyze(analyze_parser()))
        .to_options()
        .command("analyze")
        .help("Recover a track and report copy protection evidence");

    let command = construct!([version, recover, analyze]);

    construct!(AppParams { global, command })
}

pub(crate) fn track_options_parser() -> impl Parser<TrackOptions> {
    let in_file = in_file_parser();
    let cylinder = cylinder_parser();
    let head = head_parser();
    let ch = construct!(cylinder, head).map(|(c, h)| DiskCh::new(c, h));
    let encoding = encoding_parser();
    let rate = rate_parser();
    let rpm = rpm_parser();

    construct!(TrackOptions {
        in_file,
        ch,
        encoding,
        rate,
        rpm
    })
}

pub(crate) fn cylinder_parser() -> impl Parser<u16> {
    long("cylinder")
        .short('c')
        .argument::<u16>("CYLINDER")
        .help("Specify the physical cylinder the capture was taken from")
        .fallback(0)
}

pub(crate) fn head_parser() -> impl Parser<u8> {
    long("head")
        .short('h')
        .argument::<u8>("HEAD")
        .help("Specify the physical head the capture was taken from")
        .guard(|&head| head == 0 || head == 1, "Head must be either 0 or 1")
        .fallback(0)
}

pub(crate) fn encoding_parser() -> impl Parser<EncodingArg> {
    long("encoding")
        .short('e')
        .argument::<EncodingArg>("ENCODING")
        .help("Track encoding: 'auto', 'mfm', or 'fm'")
        .fallback(EncodingArg::Auto)
}

pub(crate) fn rate_parser() -> impl Parser<Option<u32>> {
    long("rate")
        .short('r')
        .argument::<u32>("BITS_PER_SEC")
        .help("Nominal data rate in bits per second, eg. 250000")
        .optional()
}

pub(crate) fn rpm_parser() -> impl Parser<DiskRpm> {
    long("rpm")
        .argument::<u32>("RPM")
        .help("Drive rotation speed, 300 or 360")
        .guard(|&rpm| rpm == 300 || rpm == 360, "RPM must be either 300 or 360")
        .map(|rpm| if rpm == 360 { DiskRpm::Rpm360 } else { DiskRpm::Rpm300 })
        .fallback(DiskRpm::Rpm300)
}

pub(crate) fn passes_parser() -> impl Parser<Option<u8>> {
    long("passes")
        .short('p')
        .argument::<u8>("PASSES")
        .help("Minimum number of revolutions required to vote, 2 to 64")
        .guard(|&p| (2..=64).contains(&p), "Passes must be between 2 and 64")
        .optional()
}
