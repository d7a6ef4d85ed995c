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

    src/flux/classifier.rs

    Infer the modulation of a track from the peaks of its interval histogram.
*/
use crate::{
    flux::{FluxHistogram, FluxRevolution, HistogramPeak},
    types::{TrackDataEncoding, TrackDensity},
    SiftError,
    DEFAULT_PEAK_CAPACITY,
};

/// Peak position ratios, relative to the shortest peak, that identify each encoding.
const MFM_TEMPLATE: [f64; 2] = [1.5, 2.0];
const GCR_TEMPLATE: [f64; 2] = [2.0, 3.0];
const FM_TEMPLATE: f64 = 2.0;

/// The result of classifying a histogram.
#[derive(Clone, Debug, Default)]
pub struct EncodingClassification {
    /// The matched encoding, or `None` if no template matched within tolerance.
    pub encoding: Option<TrackDataEncoding>,
    /// Up to three dominant peaks, in order of interval length.
    pub peaks: Vec<HistogramPeak>,
    /// The bitcell period implied by the shortest peak, in nanoseconds.
    pub bitcell_ns: Option<f64>,
    pub density: Option<TrackDensity>,
}

/// Classifies flux interval histograms against MFM, FM and GCR timing templates.
/// Classification is deterministic: the same histogram always yields the same result.
#[derive(Copy, Clone, Debug)]
pub struct EncodingClassifier {
    tolerance: f64,
    threshold: f64,
    peak_capacity: usize,
}

impl Default for EncodingClassifier {
    fn default() -> Self {
        EncodingClassifier {
            tolerance: 0.10,
            threshold: 0.005,
            peak_capacity: DEFAULT_PEAK_CAPACITY,
        }
    }
}

impl EncodingClassifier {
    pub fn new(peak_capacity: usize) -> Self {
        EncodingClassifier {
            peak_capacity,
            ..Default::default()
        }
    }

    /// Set the relative tolerance applied to template ratios (default 0.10).
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn classify_revolution(&self, revolution: &FluxRevolution) -> Result<EncodingClassification, SiftError> {
        self.classify(&revolution.histogram(1.0))
    }

    pub fn classify(&self, histogram: &FluxHistogram) -> Result<EncodingClassification, SiftError> {
        let mut peaks = histogram.find_local_maxima(Some(self.threshold), self.peak_capacity)?;

        // Keep the three tallest peaks, then restore interval order.
        peaks.sort_by(|a, b| b.count.cmp(&a.count).then(a.start.cmp(&b.start)));
        peaks.truncate(3);
        peaks.sort_by_key(|p| p.start);

        let mut result = EncodingClassification {
            encoding: None,
            peaks: peaks.clone(),
            bitcell_ns: None,
            density: None,
        };

        if peaks.len() < 2 {
            log::debug!(
                "EncodingClassifier::classify(): Only {} peak(s) found in {} samples, encoding unknown",
                peaks.len(),
                histogram.sample_ct()
            );
            return Ok(result);
        }

        let base = peaks[0].center();
        let ratios: Vec<f64> = peaks.iter().skip(1).map(|p| p.center() / base).collect();

        let encoding = if ratios.len() == 2 && self.matches(&ratios, &MFM_TEMPLATE) {
            Some(TrackDataEncoding::Mfm)
        }
        else if ratios.len() == 2 && self.matches(&ratios, &GCR_TEMPLATE) {
            Some(TrackDataEncoding::Gcr)
        }
        else if self.close(ratios[0], FM_TEMPLATE) {
            Some(TrackDataEncoding::Fm)
        }
        else {
            None
        };

        log::debug!(
            "EncodingClassifier::classify(): base: {} ratios: {:?} -> {:?}",
            crate::format_us!(base),
            ratios,
            encoding
        );

        result.bitcell_ns = match encoding {
            // The shortest MFM interval spans two bitcells.
            Some(TrackDataEncoding::Mfm) => Some(base / 2.0),
            Some(_) => Some(base),
            None => None,
        };
        result.density = result.bitcell_ns.and_then(TrackDensity::from_base_clock_ns);
        result.encoding = encoding;
        Ok(result)
    }

    fn matches(&self, ratios: &[f64], template: &[f64]) -> bool {
        ratios.iter().zip(template.iter()).all(|(r, t)| self.close(*r, *t))
    }

    fn close(&self, ratio: f64, target: f64) -> bool {
        (ratio - target).abs() <= target * self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas_from_pattern(pattern: &[f64], count: usize) -> Vec<f64> {
        pattern.iter().cycle().take(count).copied().collect()
    }

    fn classify(deltas: &[f64]) -> EncodingClassification {
        EncodingClassifier::default()
            .classify(&FluxHistogram::new(deltas, 1.0))
            .unwrap()
    }

    #[test]
    fn classifies_mfm() {
        let deltas = deltas_from_pattern(&[4000.0, 6000.0, 4000.0, 8000.0, 4000.0, 6000.0], 6000);
        let result = classify(&deltas);
        assert_eq!(result.encoding, Some(TrackDataEncoding::Mfm));
        assert_eq!(result.peaks.len(), 3);
        assert_eq!(result.density, Some(TrackDensity::Double));
    }

    #[test]
    fn classifies_fm() {
        let deltas = deltas_from_pattern(&[4000.0, 4000.0, 8000.0], 6000);
        let result = classify(&deltas);
        assert_eq!(result.encoding, Some(TrackDataEncoding::Fm));
        assert_eq!(result.density, Some(TrackDensity::Standard));
    }

    #[test]
    fn classifies_gcr() {
        let deltas = deltas_from_pattern(&[4000.0, 4000.0, 8000.0, 12000.0], 6000);
        let result = classify(&deltas);
        assert_eq!(result.encoding, Some(TrackDataEncoding::Gcr));
    }

    #[test]
    fn unknown_when_no_template_matches() {
        let deltas = deltas_from_pattern(&[4000.0, 5000.0], 6000);
        assert_eq!(classify(&deltas).encoding, None);

        let deltas = deltas_from_pattern(&[4000.0], 6000);
        assert_eq!(classify(&deltas).encoding, None);
    }

    #[test]
    fn classification_is_deterministic() {
        let deltas = deltas_from_pattern(&[4000.0, 6000.0, 8000.0], 3000);
        let hist = FluxHistogram::new(&deltas, 1.0);
        let classifier = EncodingClassifier::default();
        let a = classifier.classify(&hist).unwrap();
        let b = classifier.classify(&hist).unwrap();
        assert_eq!(a.encoding, b.encoding);
        assert_eq!(a.peaks, b.peaks);
    }
}
