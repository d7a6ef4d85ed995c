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

    crates/fstool/src/analyze/mod.rs

    The 'analyze' command: recovers a track and ranks copy protection
    evidence found on it.
*/
pub(crate) mod args;

use anyhow::{Context, Error};

use fluxsift::{
    copy_protection::{AnalysisContext, ExpectedLayout},
    AnalyzerConfig,
    ProtectionAnalyzer,
};

use crate::{args::GlobalOptions, recover::recover_capture};
use args::AnalyzeParams;

pub(crate) fn run(global: &GlobalOptions, params: &AnalyzeParams) -> Result<(), Error> {
    let recovery = recover_capture(&params.track, params.passes)?;
    let analyzer = ProtectionAnalyzer::new(AnalyzerConfig::default()).context("Invalid analyzer configuration")?;

    let mut ctx = AnalysisContext::from_recovery(&recovery).with_rpm(params.track.rpm);
    if let Some(sector_ct) = params.sectors {
        ctx = ctx.with_expected_layout(ExpectedLayout { sector_ct, first_id: 1 });
    }
    let evidence = analyzer.analyze(&ctx).context("Protection analysis failed")?;

    if !global.silent {
        println!(
            "Track {}: {} of {} sectors recovered, {} bits ({})",
            recovery.track.ch(),
            recovery.track.good_sector_ct(),
            recovery.track.sector_ct(),
            recovery.track.bit_len(),
            recovery.status
        );
        println!("Evidence sources: {}", analyzer.source_names().join(", "));
    }

    if evidence.is_empty() {
        println!("No copy protection evidence found.");
        return Ok(());
    }

    for (rank, entry) in evidence.iter().enumerate() {
        println!("{:2}. {}", rank + 1, entry);
    }
    Ok(())
}
