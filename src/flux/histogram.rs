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

    src/flux/histogram.rs

    Interval histograms used to determine the density, data rate and encoding
    of a flux track.
*/

//! This module defines a [FluxHistogram] structure which is used to determine
//! the density, data rate and encoding of a flux track so that the PLL may
//! be properly initialized for decoding.

use crate::{bounded::BoundedVec, SiftError};
use histogram::{Bucket, Histogram};

/// A local maximum of a [FluxHistogram].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HistogramPeak {
    pub count: u64,
    pub start: u64,
    pub end:   u64,
}

impl HistogramPeak {
    /// Return the midpoint of the peak's bucket, in nanoseconds.
    pub fn center(&self) -> f64 {
        (self.start as f64 + self.end as f64) / 2.0
    }
}

pub struct FluxHistogram {
    histogram: Option<Histogram>,
    sample_ct: usize,
}

impl FluxHistogram {
    /// Produce a [FluxHistogram] over a fraction of the flux deltas in the revolution.
    /// # Arguments
    /// * `deltas` - A slice of flux delta times in nanoseconds
    /// * `fraction` - The fraction of the deltas to use in the histogram
    pub fn new(deltas: &[f64], fraction: f64) -> Self {
        // Max value power of 2^16 = 65536ns.
        // Grouping power of 3 produces sharp spikes without false maxima
        let mut histogram = match Histogram::new(3, 16) {
            Ok(h) => h,
            Err(e) => {
                log::error!("FluxHistogram::new(): Failed to create histogram: {:?}", e);
                return FluxHistogram {
                    histogram: None,
                    sample_ct: 0,
                };
            }
        };

        let take_count = (deltas.len() as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
        log::debug!("FluxHistogram::new(): Taking {} flux deltas", take_count);
        for delta in deltas.iter().take(take_count) {
            if *delta >= 0.0 {
                _ = histogram.increment(*delta as u64);
            }
        }

        FluxHistogram {
            histogram: Some(histogram),
            sample_ct: take_count,
        }
    }

    pub fn sample_ct(&self) -> usize {
        self.sample_ct
    }

    /// Locate local maxima in the histogram by bucket.
    /// A bucket is a maximum if its count is no less than its predecessor, greater than its
    /// successor, and at least `threshold` (a fraction of the total count, default 0.5%).
    ///
    /// Peaks are returned in bucket order. If more than `capacity` peaks are found,
    /// [SiftError::CapacityExceeded] is returned.
    pub fn find_local_maxima(&self, threshold: Option<f64>, capacity: usize) -> Result<Vec<HistogramPeak>, SiftError> {
        let mut peaks = BoundedVec::new(capacity, "histogram peaks");
        let Some(histogram) = &self.histogram
        else {
            return Ok(Vec::new());
        };

        let mut previous_bucket: Option<Bucket> = None;
        let mut current_bucket: Option<Bucket> = None;

        // Calculate total count for threshold
        let total_count: u64 = histogram.into_iter().map(|bucket| bucket.count()).sum();
        let threshold = (total_count as f64 * threshold.unwrap_or(0.005)).round() as u64;

        for bucket in histogram.into_iter() {
            if let (Some(prev), Some(curr)) = (previous_bucket.as_ref(), current_bucket.as_ref()) {
                // Identify local maximum and apply threshold check
                if curr.count() > 0
                    && curr.count() >= prev.count()
                    && curr.count() > bucket.count()
                    && curr.count() >= threshold
                {
                    peaks.push(HistogramPeak {
                        count: curr.count(),
                        start: curr.start(),
                        end:   curr.end(),
                    })?;
                }
            }
            // Update previous and current buckets
            previous_bucket = current_bucket.take();
            current_bucket = Some(bucket.clone());
        }

        for peak in peaks.iter() {
            log::trace!(
                "FluxHistogram::find_local_maxima(): Peak at range: {}..={} ct: {}",
                peak.start,
                peak.end,
                peak.count
            );
        }
        Ok(peaks.into_vec())
    }
}
