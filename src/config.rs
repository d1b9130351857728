//! Configuration parameters for tone detection and tone stripping

use crate::error::AnalysisError;

/// Tone detection configuration parameters
///
/// One parametrized pipeline serves both the tone-set matching pass and the
/// transcription stripping pass; use [`DetectionConfig::tone_matching`] or
/// [`DetectionConfig::transcription`] for the two standard parameter sets.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    // STFT parameters
    /// Frame size for STFT (default: 2048)
    pub frame_size: usize,

    /// Hop size for STFT (default: 512)
    pub hop_size: usize,

    // Target band
    /// Lowest frequency considered for frame peaks and spectral peaks (default: 0.0 Hz)
    pub min_frequency_hz: f32,

    /// Highest frequency considered (default: 5000.0 Hz)
    pub max_frequency_hz: f32,

    // Noise floor and gating
    /// Percentile of frame peak levels used to locate the noise floor (default: 0.2)
    pub noise_percentile: f32,

    /// Frame level below which a frame is always silent, dB relative to the call peak (default: -28.0)
    pub silence_threshold_db: f32,

    /// Minimum distance above the noise floor for a frame to be non-silent (default: 6.0 dB)
    pub min_snr_db: f32,

    /// Noise floor used when no frame falls at or below the percentile (default: -60.0 dB)
    pub fallback_noise_floor_db: f32,

    // Peak tracking
    /// Normalized magnitude a bin must exceed to count as a peak (default: 0.02)
    pub magnitude_floor: f32,

    /// Width of the frequency buckets detections are keyed by (default: 10.0 Hz)
    pub bucket_width_hz: f32,

    /// Maximum distance between a peak and an open detection it extends (default: 15.0 Hz)
    pub peak_join_tolerance_hz: f32,

    // Merging
    /// Minimum detection duration in seconds (default: 0.6)
    pub min_duration_secs: f64,

    /// Maximum frequency difference for two detections to merge (default: 20.0 Hz)
    pub merge_tolerance_hz: f64,

    /// Slack allowed when testing time overlap during merging (default: 0.1 s)
    pub merge_time_tolerance_secs: f64,

    /// Jump from the recent frequency median that forces a new candidate (default: 18.0 Hz)
    pub force_split_hz: f64,

    // Matching
    /// Classify merged detections against tone sets (default: true)
    pub match_tone_sets: bool,
}

impl DetectionConfig {
    /// Parameters for the tone-set matching pass
    pub fn tone_matching() -> Self {
        Self::default()
    }

    /// Parameters for finding tones to strip before transcription
    ///
    /// Wider low cut (200 Hz), shorter minimum duration, looser merging, no matching.
    pub fn transcription() -> Self {
        Self {
            min_frequency_hz: 200.0,
            min_duration_secs: 0.5,
            merge_tolerance_hz: 25.0,
            match_tone_sets: false,
            ..Self::default()
        }
    }

    /// Check that the parameters describe a usable pipeline
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frame_size < 4 {
            return Err(AnalysisError::InvalidInput(format!(
                "Frame size must be >= 4, got {}",
                self.frame_size
            )));
        }

        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(AnalysisError::InvalidInput(format!(
                "Hop size must be in 1..={}, got {}",
                self.frame_size, self.hop_size
            )));
        }

        if self.min_frequency_hz < 0.0 || self.max_frequency_hz <= self.min_frequency_hz {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid band: min={} Hz, max={} Hz",
                self.min_frequency_hz, self.max_frequency_hz
            )));
        }

        if !(0.0..=1.0).contains(&self.noise_percentile) {
            return Err(AnalysisError::InvalidInput(format!(
                "Noise percentile must be in [0, 1], got {}",
                self.noise_percentile
            )));
        }

        if self.bucket_width_hz <= 0.0 {
            return Err(AnalysisError::InvalidInput(
                "Bucket width must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_frequency_hz: 0.0,
            max_frequency_hz: 5000.0,
            noise_percentile: 0.2,
            silence_threshold_db: -28.0,
            min_snr_db: 6.0,
            fallback_noise_floor_db: -60.0,
            magnitude_floor: 0.02,
            bucket_width_hz: 10.0,
            peak_join_tolerance_hz: 15.0,
            min_duration_secs: 0.6,
            merge_tolerance_hz: 20.0,
            merge_time_tolerance_secs: 0.1,
            force_split_hz: 18.0,
            match_tone_sets: true,
        }
    }
}

/// Tone stripping configuration
#[derive(Debug, Clone)]
pub struct StripConfig {
    /// Audio removed on each side of a tone in seconds (default: 0.1)
    pub buffer_secs: f64,

    /// Output sample rate of the voice codec (default: 16000 Hz)
    pub output_sample_rate: u32,

    /// Output bitrate in bits per second (default: 16000)
    pub bitrate: u32,

    /// Output smaller than this fraction of the input is treated as a failed
    /// encode (default: 0.01)
    pub min_output_ratio: f64,

    /// Encoder executable (default: "ffmpeg")
    pub encoder_path: String,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            buffer_secs: 0.1,
            output_sample_rate: 16000,
            bitrate: 16000,
            min_output_ratio: 0.01,
            encoder_path: "ffmpeg".to_string(),
        }
    }
}
