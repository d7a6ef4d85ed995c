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

    crates/fstool/src/flux_file.rs

    Reads flux interval text files. Each non-empty line holds one revolution
    as whitespace or comma separated intervals in nanoseconds. Lines starting
    with '#' are comments.
*/
use anyhow::{anyhow, bail, Context, Error};
use std::path::Path;

use fluxsift::{DiskCh, FluxRevolution};

pub(crate) fn read_flux_file(path: &Path, ch: DiskCh) -> Result<Vec<FluxRevolution>, Error> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let revolutions = parse_flux_text(&text, ch).with_context(|| format!("Failed to parse {}", path.display()))?;
    log::debug!(
        "read_flux_file(): Read {} revolutions from {}",
        revolutions.len(),
        path.display()
    );
    Ok(revolutions)
}

pub(crate) fn parse_flux_text(text: &str, ch: DiskCh) -> Result<Vec<FluxRevolution>, Error> {
    let mut revolutions = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let deltas = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>()
                    .map_err(|e| anyhow!("line {}: bad interval '{}': {}", line_no + 1, s, e))
            })
            .collect::<Result<Vec<f64>, Error>>()?;

        if let Some(bad) = deltas.iter().find(|d| !d.is_finite() || **d <= 0.0) {
            bail!("line {}: interval {} is not a positive duration", line_no + 1, bad);
        }

        let index = revolutions.len();
        revolutions.push(FluxRevolution::from_ns(ch, index, deltas)?);
    }

    if revolutions.is_empty() {
        bail!("no revolutions found");
    }
    Ok(revolutions)
}
