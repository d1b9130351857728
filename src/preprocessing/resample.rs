//! Sample rate conversion
//!
//! Call recordings arrive at whatever rate the capture device used (8 kHz
//! trunked radio, 22.05/44.1/48 kHz scanner captures). The detector's
//! frequency resolution and tolerances are tuned for 8 kHz audio, where a
//! 2048-point window gives ~3.9 Hz bins, so decoded audio is brought to
//! [`ANALYSIS_SAMPLE_RATE`] before analysis.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AnalysisError;

/// Rate the detection parameters are tuned for
pub const ANALYSIS_SAMPLE_RATE: u32 = 8000;

/// Input frames per resampler call
const CHUNK_SIZE: usize = 1024;

fn resampler_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::ProcessingError(format!("Resampling failed: {}", e))
}

/// Resample mono `samples` from `source_rate` to `target_rate`
///
/// Band-limited sinc interpolation, so content above the target Nyquist is
/// removed rather than folded into the tone band. The output is aligned with
/// the input (resampler delay removed) and holds
/// `round(len * target_rate / source_rate)` samples.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero rate and
/// `AnalysisError::ProcessingError` if the resampler rejects the ratio
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, AnalysisError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "Sample rates must be > 0: {} -> {}",
            source_rate, target_rate
        )));
    }

    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).map_err(resampler_error)?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let out = resampler.process(&[chunk], None).map_err(resampler_error)?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let out = resampler
            .process_partial(Some(&[remainder]), None)
            .map_err(resampler_error)?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter tail
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resampler_error)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);

    log::debug!(
        "Resampled {} samples at {} Hz to {} samples at {} Hz",
        samples.len(),
        source_rate,
        output.len(),
        target_rate
    );

    Ok(output)
}
