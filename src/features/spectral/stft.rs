//! Windowed magnitude spectra
//!
//! Slices PCM into overlapping Hann-tapered windows and produces one magnitude
//! spectrum per window.
//!
//! # Algorithm
//!
//! 1. Window `i` covers samples `[i * hop, i * hop + frame_size)`; windows that
//!    would run past the end of the buffer are dropped (no padding)
//! 2. Multiply by a Hann taper
//! 3. FFT, keep bins `0..=frame_size / 2`
//! 4. Normalize magnitudes by the window length
//!
//! # Example
//!
//! ```no_run
//! use radio_tones::features::spectral::stft::analyze_frames;
//!
//! let samples = vec![0.0f32; 8000 * 5];
//! let spectrogram = analyze_frames(&samples, 8000, 2048, 512)?;
//! println!("{} frames, {:.2} Hz per bin", spectrogram.frames.len(), spectrogram.bin_width_hz());
//! # Ok::<(), radio_tones::AnalysisError>(())
//! ```

use crate::error::AnalysisError;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Magnitude spectrum of one analysis window
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    /// Window index (window starts at `index * hop_size` samples)
    pub index: usize,

    /// Magnitudes for bins `0..=frame_size / 2`, normalized by window length
    pub magnitudes: Vec<f32>,
}

/// Ordered magnitude spectra for a whole call
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Frames in time order
    pub frames: Vec<SpectralFrame>,

    /// Sample rate of the analyzed audio
    pub sample_rate: u32,

    /// Window length in samples
    pub frame_size: usize,

    /// Hop between windows in samples
    pub hop_size: usize,
}

impl Spectrogram {
    /// Frequency spacing between bins in Hz
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate as f32 / self.frame_size as f32
    }

    /// Center frequency of bin `bin` in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz()
    }

    /// Start time of window `index` in seconds
    pub fn frame_start_secs(&self, index: usize) -> f64 {
        (index * self.hop_size) as f64 / self.sample_rate as f64
    }

    /// Span of one analysis window in seconds
    pub fn window_duration_secs(&self) -> f64 {
        self.frame_size as f64 / self.sample_rate as f64
    }

    /// Inclusive bin range whose center frequencies lie in `[low_hz, high_hz]`
    ///
    /// Returns `None` when no bin falls inside the band.
    pub fn band_bins(&self, low_hz: f32, high_hz: f32) -> Option<(usize, usize)> {
        let nyquist_bin = self.frame_size / 2;
        let width = self.bin_width_hz();
        let first = (low_hz / width).ceil().max(0.0) as usize;
        let last = ((high_hz / width).floor() as usize).min(nyquist_bin);
        if first > last {
            None
        } else {
            Some((first, last))
        }
    }
}

/// Hann taper of length `n` (symmetric)
fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect()
}

/// Compute magnitude spectra for every complete window
///
/// # Arguments
///
/// * `samples` - Mono audio samples, normalized to [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - Window length (typically 2048)
/// * `hop_size` - Hop between windows (typically 512)
///
/// # Returns
///
/// A [`Spectrogram`]; it has no frames when the audio is shorter than one window
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate, frame size or hop size
pub fn analyze_frames(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
) -> Result<Spectrogram, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput(
            "Sample rate must be > 0".to_string(),
        ));
    }

    if frame_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Frame size must be > 0".to_string(),
        ));
    }

    if hop_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Hop size must be > 0".to_string(),
        ));
    }

    let num_frames = if samples.len() >= frame_size {
        (samples.len() - frame_size) / hop_size + 1
    } else {
        0
    };

    log::debug!(
        "Computing spectra: {} samples at {} Hz, frame={}, hop={}, {} frames",
        samples.len(),
        sample_rate,
        frame_size,
        hop_size,
        num_frames
    );

    let window = hann_window(frame_size);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_size);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); frame_size];
    let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];
    let norm = 1.0 / frame_size as f32;
    let num_bins = frame_size / 2 + 1;

    let mut frames = Vec::with_capacity(num_frames);
    for index in 0..num_frames {
        let start = index * hop_size;
        let chunk = &samples[start..start + frame_size];

        for ((slot, &x), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
            *slot = Complex::new(x * w, 0.0);
        }

        fft.process_with_scratch(&mut buffer, &mut scratch);

        let magnitudes = buffer[..num_bins].iter().map(|c| c.norm() * norm).collect();
        frames.push(SpectralFrame { index, magnitudes });
    }

    Ok(Spectrogram {
        frames,
        sample_rate,
        frame_size,
        hop_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_frame_count_drops_partial_windows() {
        let samples = vec![0.0f32; 2048 + 512 * 3 + 100];
        let spec = analyze_frames(&samples, 8000, 2048, 512).unwrap();
        assert_eq!(spec.frames.len(), 4);
        assert_eq!(spec.frames[3].index, 3);
        assert_eq!(spec.frames[0].magnitudes.len(), 1025);
    }

    #[test]
    fn test_short_audio_has_no_frames() {
        let samples = vec![0.5f32; 1000];
        let spec = analyze_frames(&samples, 8000, 2048, 512).unwrap();
        assert!(spec.frames.is_empty());
    }

    #[test]
    fn test_sine_peak_bin() {
        // 1000 Hz at 8 kHz with 2048 bins: 1000 / 3.90625 = bin 256 exactly
        let samples = sine(1000.0, 0.5, 8000, 8000);
        let spec = analyze_frames(&samples, 8000, 2048, 512).unwrap();
        let frame = &spec.frames[2];
        let (peak_bin, peak_mag) = frame
            .magnitudes
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert_eq!(peak_bin, 256);
        // Hann-windowed sine: |X| / N ~= A / 4
        assert!(
            (peak_mag - 0.125).abs() < 0.01,
            "Expected peak magnitude ~0.125, got {:.4}",
            peak_mag
        );
    }

    #[test]
    fn test_band_bins() {
        let samples = vec![0.0f32; 2048];
        let spec = analyze_frames(&samples, 8000, 2048, 512).unwrap();
        assert_eq!(spec.band_bins(0.0, 5000.0), Some((0, 1024)));
        let (first, last) = spec.band_bins(200.0, 1000.0).unwrap();
        assert!(spec.bin_frequency(first) >= 200.0);
        assert!(spec.bin_frequency(last) <= 1000.0);
        assert_eq!(spec.band_bins(1.0, 2.0), None);
    }

    #[test]
    fn test_invalid_parameters() {
        let samples = vec![0.0f32; 4096];
        assert!(analyze_frames(&samples, 0, 2048, 512).is_err());
        assert!(analyze_frames(&samples, 8000, 0, 512).is_err());
        assert!(analyze_frames(&samples, 8000, 2048, 0).is_err());
    }
}
