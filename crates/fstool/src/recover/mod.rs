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

    crates/fstool/src/recover/mod.rs

    The 'recover' command: multi-pass sector recovery from a flux capture.
*/
pub(crate) mod args;

use anyhow::{Context, Error};

use fluxsift::{
    recovery::TrackRecovery,
    RecoveryConfig,
    RecoveryEngine,
    SectorRecord,
    TrackDataRate,
};

use crate::{
    args::{GlobalOptions, TrackOptions},
    flux_file::read_flux_file,
};
use args::RecoverParams;

/// Build an engine for the given track options and recover the capture they name.
pub(crate) fn recover_capture(opts: &TrackOptions, passes: Option<u8>) -> Result<TrackRecovery, Error> {
    let revolutions = read_flux_file(&opts.in_file, opts.ch)?;

    let mut config = RecoveryConfig {
        encoding_hint: opts.encoding.hint(),
        rpm: opts.rpm,
        ..RecoveryConfig::default()
    };
    if let Some(rate) = opts.rate {
        config.data_rate = TrackDataRate::from(rate);
    }
    if let Some(passes) = passes {
        config.min_passes = passes;
        config.max_passes = config.max_passes.max(passes);
    }

    let engine = RecoveryEngine::new(config).context("Invalid recovery configuration")?;
    let recovery = engine
        .recover_track(opts.ch, &revolutions)
        .with_context(|| format!("Failed to recover track {}", opts.ch))?;
    Ok(recovery)
}

pub(crate) fn run(global: &GlobalOptions, params: &RecoverParams) -> Result<(), Error> {
    let recovery = recover_capture(&params.track, params.passes)?;
    let track = &recovery.track;

    if !global.silent {
        if let Some(class) = &recovery.classification {
            match class.encoding {
                Some(encoding) => println!("Detected encoding: {}", encoding),
                None => println!("Encoding could not be detected"),
            }
        }
        println!(
            "Track {}: {} encoding, {} bits, {} revolutions, {} sync losses",
            track.ch(),
            track.encoding(),
            track.bit_len(),
            recovery.revolutions.len(),
            track.sync_losses()
        );
    }

    for sector in track.sectors() {
        print_sector(sector, params.dump);
    }

    println!(
        "{} of {} sectors recovered, track confidence {}%: {}",
        track.good_sector_ct(),
        track.sector_ct(),
        track.confidence(),
        recovery.status
    );
    Ok(())
}

fn print_sector(sector: &SectorRecord, dump: bool) {
    let data_crc = match &sector.data_crc {
        Some(crc) => crc.to_string(),
        None => "none".to_string(),
    };
    println!(
        "  {} id crc: {} data crc: {} conf: {:3}% weak: {:4} status: {}",
        sector.id,
        sector.id_crc,
        data_crc,
        sector.confidence,
        sector.weak_ct(),
        sector.status
    );

    if dump {
        for (row, chunk) in sector.data.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            println!("    {:04X}: {}", row * 16, hex.join(" "));
        }
    }
}
