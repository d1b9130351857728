//! Channel mixing utilities (multichannel to mono conversion)

use crate::error::AnalysisError;

/// Channel mixing mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelMixMode {
    /// Average of all channels
    #[default]
    Average,
    /// Keep only the channel with the most energy (recorders that leave one
    /// channel dead would otherwise lose 6 dB)
    Dominant,
}

/// Convert stereo to mono
///
/// # Arguments
///
/// * `left` - Left channel samples
/// * `right` - Right channel samples
/// * `mode` - Mixing mode
///
/// # Returns
///
/// Mono samples
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the channels differ in length
pub fn stereo_to_mono(
    left: &[f32],
    right: &[f32],
    mode: ChannelMixMode,
) -> Result<Vec<f32>, AnalysisError> {
    if left.len() != right.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "Channel length mismatch: left={}, right={}",
            left.len(),
            right.len()
        )));
    }

    let mut interleaved = Vec::with_capacity(left.len() * 2);
    for (&l, &r) in left.iter().zip(right) {
        interleaved.push(l);
        interleaved.push(r);
    }
    downmix_interleaved(&interleaved, 2, mode)
}

/// Downmix interleaved samples with `channels` channels to mono
///
/// A trailing partial frame is dropped.
pub fn downmix_interleaved(
    samples: &[f32],
    channels: usize,
    mode: ChannelMixMode,
) -> Result<Vec<f32>, AnalysisError> {
    if channels == 0 {
        return Err(AnalysisError::InvalidInput(
            "Channel count must be > 0".to_string(),
        ));
    }

    if channels == 1 {
        return Ok(samples.to_vec());
    }

    let frames = samples.chunks_exact(channels);
    let mono = match mode {
        ChannelMixMode::Average => frames
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect(),
        ChannelMixMode::Dominant => {
            let mut energy = vec![0.0f64; channels];
            for frame in samples.chunks_exact(channels) {
                for (e, &s) in energy.iter_mut().zip(frame) {
                    *e += (s as f64) * (s as f64);
                }
            }
            let loudest = energy
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |acc, (i, &e)| if e > acc.1 { (i, e) } else { acc })
                .0;
            log::debug!("Dominant channel mix: keeping channel {} of {}", loudest, channels);
            frames.map(|frame| frame[loudest]).collect()
        }
    };

    Ok(mono)
}
