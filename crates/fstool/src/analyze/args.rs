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

    crates/fstool/src/analyze/args.rs
*/
use bpaf::*;

use crate::args::{passes_parser, track_options_parser, TrackOptions};

#[derive(Debug, Clone)]
pub struct AnalyzeParams {
    pub track: TrackOptions,
    pub passes: Option<u8>,
    pub sectors: Option<u8>,
}

pub(crate) fn analyze_parser() -> impl Parser<AnalyzeParams> {
    let track = track_options_parser();
    let passes = passes_parser();
    let sectors = long("sectors")
        .short('s')
        .argument::<u8>("SECTORS")
        .help("Expected sector count, numbered from 1. Enables missing sector detection")
        .optional();

    construct!(AnalyzeParams { track, passes, sectors })
}
