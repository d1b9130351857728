//! # Radio Tones
//!
//! Paging tone detection for radio call recordings. Finds sustained alerting
//! tones in decoded call audio, classifies them against operator-defined tone
//! sets and strips them out before the call goes to speech-to-text.
//!
//! ## Features
//!
//! - **Tone Detection**: STFT peak tracking gated by a per-call adaptive noise floor
//! - **Tone Set Matching**: A/B two-tone sequential paging and long tones, with tolerance in Hz or as a ratio
//! - **Tone Stripping**: Cuts detected tones out and re-encodes the remaining speech
//! - **Batch Processing**: Bounded worker pool with per-call failure isolation
//!
//! ## Quick Start
//!
//! ```no_run
//! use radio_tones::{detect_tones, parse_tone_sets};
//!
//! // Load audio samples (mono, f32, normalized)
//! let samples: Vec<f32> = vec![]; // Your audio data
//! let sample_rate = 8000;
//!
//! let tone_sets = parse_tone_sets(r#"[{"id": "1", "label": "Station 1",
//!     "aTone": {"frequency": 350.0}, "bTone": {"frequency": 1050.0},
//!     "tolerance": 10.0, "minDuration": 0.6}]"#)?;
//!
//! let sequence = detect_tones(&samples, sample_rate, &tone_sets)?;
//! for tone in &sequence.tones {
//!     println!("{:.1} Hz {:.2}-{:.2}s {:?}", tone.frequency, tone.start_time, tone.end_time, tone.tone_type);
//! }
//! println!("Matched: {:?}", sequence.matched_labels());
//! # Ok::<(), radio_tones::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio Input → STFT → Noise Floor Gate → Peak Tracking → Merging → Tone Set Matching → Output
//! ```
//!
//! Detection is a pure function of the samples, the sample rate and the tone
//! sets. Diagnostics go through the [`log`] facade.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod preprocessing;
pub mod strip;

// Re-export main types
pub use analysis::matcher::{match_tone_set, match_tone_sets, matches_tone_set};
pub use analysis::result::{Tone, ToneSequence, ToneType};
pub use analysis::tone_set::{parse_tone_sets, serialize_tone_sets, ToneSet, ToneSpec};
pub use config::{DetectionConfig, StripConfig};
pub use error::AnalysisError;
pub use features::tracking::MergedDetection;
pub use strip::strip_tones;

use analysis::matcher::classify_tone;
use features::spectral::{analyze_frames, estimate_noise_floor};
use features::tracking::{merge_detections, track_peaks};

/// Run the detection pipeline up to merged tone candidates
///
/// Both passes share this: tone-set matching uses
/// [`DetectionConfig::tone_matching`], transcription stripping uses
/// [`DetectionConfig::transcription`].
///
/// # Returns
///
/// Candidates no shorter than `config.min_duration_secs`, ordered by start
/// time. Audio shorter than one analysis window, a zero sample rate, non-finite
/// samples or a silent call all give an empty list.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if `config` is invalid
pub fn find_tone_candidates(
    samples: &[f32],
    sample_rate: u32,
    config: &DetectionConfig,
) -> Result<Vec<MergedDetection>, AnalysisError> {
    config.validate()?;

    log::debug!(
        "Detecting tones: {} samples at {} Hz, band {:.0}-{:.0} Hz",
        samples.len(),
        sample_rate,
        config.min_frequency_hz,
        config.max_frequency_hz
    );

    if sample_rate == 0 {
        log::warn!("Sample rate is 0, reporting no tones");
        return Ok(Vec::new());
    }

    if samples.len() < config.frame_size {
        log::debug!(
            "Audio shorter than one {}-sample window, reporting no tones",
            config.frame_size
        );
        return Ok(Vec::new());
    }

    if samples.iter().any(|s| !s.is_finite()) {
        log::warn!("Audio contains non-finite samples, reporting no tones");
        return Ok(Vec::new());
    }

    let spectrogram = analyze_frames(samples, sample_rate, config.frame_size, config.hop_size)?;

    let Some(gate) = estimate_noise_floor(&spectrogram, config) else {
        return Ok(Vec::new());
    };

    let raw = track_peaks(&spectrogram, &gate, config);
    let candidates: Vec<MergedDetection> = merge_detections(&raw, config)
        .into_iter()
        .filter(|m| m.duration_secs() >= config.min_duration_secs)
        .collect();

    log::debug!("{} tone candidates", candidates.len());
    Ok(candidates)
}

/// Detect tones and match them against `tone_sets`
///
/// Uses [`DetectionConfig::tone_matching`].
///
/// # Arguments
///
/// * `samples` - Mono audio samples, normalized to [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz
/// * `tone_sets` - Tone sets to classify against (may be empty)
///
/// # Errors
///
/// Never fails with the built-in configuration; the `Result` mirrors
/// [`detect_tones_with_config`].
///
/// # Example
///
/// ```
/// use radio_tones::detect_tones;
///
/// let samples = vec![0.0f32; 8000 * 5]; // 5 seconds of silence
/// let sequence = detect_tones(&samples, 8000, &[])?;
/// assert!(!sequence.has_tones);
/// assert!((sequence.duration - 5.0).abs() < 1e-9);
/// # Ok::<(), radio_tones::AnalysisError>(())
/// ```
pub fn detect_tones(
    samples: &[f32],
    sample_rate: u32,
    tone_sets: &[ToneSet],
) -> Result<ToneSequence, AnalysisError> {
    detect_tones_with_config(samples, sample_rate, tone_sets, &DetectionConfig::tone_matching())
}

/// Detect tones with explicit detection parameters
///
/// Tone times are clipped to the audio duration. With
/// `config.match_tone_sets` disabled every tone is unclassified and no tone
/// set is reported as matched.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if `config` is invalid
pub fn detect_tones_with_config(
    samples: &[f32],
    sample_rate: u32,
    tone_sets: &[ToneSet],
    config: &DetectionConfig,
) -> Result<ToneSequence, AnalysisError> {
    let total_secs = if sample_rate == 0 {
        0.0
    } else {
        samples.len() as f64 / sample_rate as f64
    };

    let candidates = find_tone_candidates(samples, sample_rate, config)?;
    if candidates.is_empty() {
        return Ok(ToneSequence::empty(total_secs));
    }

    let tones: Vec<Tone> = candidates
        .iter()
        .map(|c| {
            let mut tone = Tone::new(
                c.frequency,
                c.start_secs,
                c.end_secs.min(total_secs),
                ToneType::Unclassified,
            );
            if config.match_tone_sets {
                tone.tone_type = classify_tone(tone.frequency, tone.duration, tone_sets);
            }
            tone
        })
        .collect();

    let matched: Vec<ToneSet> = if config.match_tone_sets {
        match_tone_sets(&tones, tone_sets).into_iter().cloned().collect()
    } else {
        Vec::new()
    };

    if !matched.is_empty() {
        log::debug!(
            "Matched tone sets: {:?}",
            matched.iter().map(|s| s.label.as_str()).collect::<Vec<_>>()
        );
    }

    Ok(ToneSequence::from_tones(tones, total_secs, matched))
}

/// Detect every tone worth removing before transcription
///
/// Uses [`DetectionConfig::transcription`]: 200-5000 Hz band, 0.5 s minimum
/// duration, 25 Hz merge tolerance and no tone-set matching, so every tone is
/// [`ToneType::Unclassified`].
///
/// # Errors
///
/// Never fails with the built-in configuration
pub fn detect_all_tones_for_transcription(
    samples: &[f32],
    sample_rate: u32,
) -> Result<Vec<Tone>, AnalysisError> {
    let sequence =
        detect_tones_with_config(samples, sample_rate, &[], &DetectionConfig::transcription())?;
    Ok(sequence.tones)
}
