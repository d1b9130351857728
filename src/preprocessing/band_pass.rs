//! Band-pass pre-filter
//!
//! Optional band limiting applied after decoding, before tone analysis.
//! Radio recordings often carry hum below the paging band and hiss above it.
//!
//! Implemented as a cascade of two RBJ biquads (high-pass at the low corner,
//! low-pass at the high corner), both Butterworth (Q = 0.707).
//!
//! # Example
//!
//! ```no_run
//! use radio_tones::preprocessing::band_pass::band_pass;
//!
//! let samples = vec![0.0f32; 8000];
//! let filtered = band_pass(&samples, 8000, 200.0, 3400.0)?;
//! # Ok::<(), radio_tones::AnalysisError>(())
//! ```

use crate::error::AnalysisError;

/// Butterworth quality factor
const BUTTERWORTH_Q: f32 = 0.707;

/// Second-order IIR section (Direct Form II transposed)
#[derive(Debug, Clone)]
struct Biquad {
    z1: f32,
    z2: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    fn from_coefficients(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            z1: 0.0,
            z2: 0.0,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn high_pass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * BUTTERWORTH_Q);

        Self::from_coefficients(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    fn low_pass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * BUTTERWORTH_Q);

        Self::from_coefficients(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    fn process(&mut self, sample: f32) -> f32 {
        let output = self.b0 * sample + self.z1;
        self.z1 = self.b1 * sample + self.z2 - self.a1 * output;
        self.z2 = self.b2 * sample - self.a2 * output;
        output
    }
}

/// Band-limit `samples` to `[low_hz, high_hz]`
///
/// A `low_hz` of 0 skips the high-pass stage; a `high_hz` at or above Nyquist
/// skips the low-pass stage.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate, negative
/// corners or `high_hz <= low_hz`
pub fn band_pass(
    samples: &[f32],
    sample_rate: u32,
    low_hz: f32,
    high_hz: f32,
) -> Result<Vec<f32>, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput(
            "Sample rate must be > 0".to_string(),
        ));
    }

    if low_hz < 0.0 || high_hz <= low_hz {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid band: low={} Hz, high={} Hz",
            low_hz, high_hz
        )));
    }

    let sr = sample_rate as f32;
    let nyquist = sr / 2.0;

    let mut stages = Vec::with_capacity(2);
    if low_hz > 0.0 && low_hz < nyquist {
        stages.push(Biquad::high_pass(low_hz, sr));
    }
    if high_hz < nyquist {
        stages.push(Biquad::low_pass(high_hz, sr));
    }

    log::debug!(
        "Band-pass {:.0}-{:.0} Hz at {} Hz: {} stages",
        low_hz,
        high_hz,
        sample_rate,
        stages.len()
    );

    Ok(samples
        .iter()
        .map(|&x| stages.iter_mut().fold(x, |acc, stage| stage.process(acc)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_passband_preserved() {
        let input = sine(1000.0, 8000, 8000);
        let output = band_pass(&input, 8000, 200.0, 3000.0).unwrap();
        // Skip the filter warm-up
        let ratio = rms(&output[800..]) / rms(&input[800..]);
        assert!(ratio > 0.85, "1 kHz should pass, ratio {:.3}", ratio);
    }

    #[test]
    fn test_stopband_attenuated() {
        let hum = sine(50.0, 8000, 8000);
        let output = band_pass(&hum, 8000, 300.0, 3000.0).unwrap();
        let ratio = rms(&output[800..]) / rms(&hum[800..]);
        assert!(ratio < 0.1, "50 Hz hum should be cut, ratio {:.3}", ratio);
    }

    #[test]
    fn test_full_band_is_identity() {
        let input = sine(440.0, 8000, 1000);
        let output = band_pass(&input, 8000, 0.0, 4000.0).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_invalid_band() {
        assert!(band_pass(&[0.0], 0, 200.0, 3000.0).is_err());
        assert!(band_pass(&[0.0], 8000, 3000.0, 200.0).is_err());
        assert!(band_pass(&[0.0], 8000, -1.0, 200.0).is_err());
    }
}
