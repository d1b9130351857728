//! Adaptive per-call noise floor and frame gating
//!
//! Radio calls differ wildly in background noise, so instead of a fixed
//! magnitude threshold each call gets its own floor:
//!
//! 1. Frame peak = largest magnitude inside the target band, per frame
//! 2. Convert frame peaks to dB relative to the loudest frame peak
//! 3. Noise floor = median of all frame levels at or below the 20th percentile
//! 4. A frame is silent when it is below the absolute threshold (-28 dB) or
//!    less than `min_snr_db` above the noise floor

use super::stft::Spectrogram;
use crate::config::DetectionConfig;

/// Global peaks below this are treated as digital silence
const MIN_GLOBAL_PEAK: f32 = 1e-20;

/// Noise floor estimate and per-frame gating decision
#[derive(Debug, Clone)]
pub struct FrameGate {
    /// Largest in-band magnitude over the whole call
    pub global_peak: f32,

    /// Frame peak levels in dB relative to `global_peak`
    pub frame_levels_db: Vec<f32>,

    /// Estimated noise floor in dB relative to `global_peak`
    pub noise_floor_db: f32,

    /// `true` for frames excluded from peak tracking
    pub silent: Vec<bool>,
}

impl FrameGate {
    /// Number of frames that passed the gate
    pub fn active_frames(&self) -> usize {
        self.silent.iter().filter(|&&s| !s).count()
    }
}

/// Value at fraction `p` of the sorted data (nearest rank)
pub(crate) fn percentile(sorted: &[f32], p: f32) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f32 * p.clamp(0.0, 1.0)).round() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Median of already sorted data
pub(crate) fn median(sorted: &[f32]) -> Option<f32> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Estimate the noise floor and gate frames
///
/// # Returns
///
/// `None` when the call holds no usable signal: no frames, no bins inside the
/// band, or a global peak below 1e-20. Callers report "no tones" in that case.
pub fn estimate_noise_floor(spectrogram: &Spectrogram, config: &DetectionConfig) -> Option<FrameGate> {
    let (first_bin, last_bin) =
        spectrogram.band_bins(config.min_frequency_hz, config.max_frequency_hz)?;

    let frame_peaks: Vec<f32> = spectrogram
        .frames
        .iter()
        .map(|frame| {
            frame.magnitudes[first_bin..=last_bin]
                .iter()
                .copied()
                .fold(0.0f32, f32::max)
        })
        .collect();

    if frame_peaks.is_empty() {
        log::debug!("No frame peaks, nothing to gate");
        return None;
    }

    let global_peak = frame_peaks.iter().copied().fold(0.0f32, f32::max);
    if global_peak < MIN_GLOBAL_PEAK {
        log::debug!("Global peak {:.3e} is negligible, treating call as silent", global_peak);
        return None;
    }

    let frame_levels_db: Vec<f32> = frame_peaks
        .iter()
        .map(|&p| 20.0 * (p.max(MIN_GLOBAL_PEAK) / global_peak).log10())
        .collect();

    let mut sorted = frame_levels_db.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let cutoff = percentile(&sorted, config.noise_percentile).unwrap_or(f32::NEG_INFINITY);
    let quiet: Vec<f32> = sorted.iter().copied().filter(|&db| db <= cutoff).collect();
    let noise_floor_db = median(&quiet).unwrap_or(config.fallback_noise_floor_db);

    let gate_db = noise_floor_db + config.min_snr_db;
    let silent: Vec<bool> = frame_levels_db
        .iter()
        .map(|&db| db < config.silence_threshold_db || db < gate_db)
        .collect();

    let gate = FrameGate {
        global_peak,
        frame_levels_db,
        noise_floor_db,
        silent,
    };

    log::debug!(
        "Noise floor {:.1} dB (p{:.0} cutoff {:.1} dB), {}/{} frames active",
        noise_floor_db,
        config.noise_percentile * 100.0,
        cutoff,
        gate.active_frames(),
        gate.silent.len()
    );

    Some(gate)
}
