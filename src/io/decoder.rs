//! Audio decoding using Symphonia
//!
//! Turns a compressed call recording into mono PCM at the analysis sample
//! rate (8 kHz unless configured otherwise). The detector only ever sees
//! [`DecodedAudio`]; anything able to produce it can stand in for
//! [`SymphoniaDecoder`] through the [`AudioDecoder`] trait.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AnalysisError;
use crate::preprocessing::band_pass::band_pass;
use crate::preprocessing::channel_mixer::{downmix_interleaved, ChannelMixMode};
use crate::preprocessing::resample::{resample, ANALYSIS_SAMPLE_RATE};

/// Decode timeout used by the call pipelines
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Mono PCM audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Source of mono PCM for the detector
pub trait AudioDecoder: Send + Sync {
    /// Decode a complete recording
    ///
    /// `hint` is a file extension ("mp3", "m4a", ...) used to speed up probing.
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<DecodedAudio, AnalysisError>;
}

/// Symphonia-backed decoder with resampling and optional band limiting
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    band: Option<(f32, f32)>,
    mix_mode: ChannelMixMode,
    target_rate: Option<u32>,
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self {
            band: None,
            mix_mode: ChannelMixMode::default(),
            target_rate: Some(ANALYSIS_SAMPLE_RATE),
        }
    }
}

impl SymphoniaDecoder {
    /// Decoder producing unfiltered mono audio at 8 kHz
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample decoded audio to `sample_rate` instead of 8 kHz
    pub fn with_target_rate(mut self, sample_rate: u32) -> Self {
        self.target_rate = Some(sample_rate);
        self
    }

    /// Keep the recording's own sample rate
    pub fn native_rate(mut self) -> Self {
        self.target_rate = None;
        self
    }

    /// Band-limit decoded audio to `[low_hz, high_hz]`
    pub fn with_band_pass(mut self, low_hz: f32, high_hz: f32) -> Self {
        self.band = Some((low_hz, high_hz));
        self
    }

    /// Choose how multichannel recordings are folded to mono
    pub fn with_mix_mode(mut self, mode: ChannelMixMode) -> Self {
        self.mix_mode = mode;
        self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<DecodedAudio, AnalysisError> {
        log::debug!("Decoding {} bytes (hint: {:?})", bytes.len(), hint);

        let source = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &probe_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AnalysisError::DecodingError("No supported audio tracks found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            AnalysisError::DecodingError("Track does not declare a sample rate".to_string())
        })?;
        let mut decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples: Vec<f32> = Vec::new();
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count();
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend(downmix_interleaved(buffer.samples(), channels, self.mix_mode)?);
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupted packets happen on radio captures; keep going
                    skipped += 1;
                    log::debug!("Skipping undecodable packet: {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} undecodable packets", skipped);
        }

        let (samples, sample_rate) = match self.target_rate {
            Some(target) if target != sample_rate => (resample(&samples, sample_rate, target)?, target),
            _ => (samples, sample_rate),
        };

        let samples = match self.band {
            Some((low, high)) => band_pass(&samples, sample_rate, low, high)?,
            None => samples,
        };

        log::debug!(
            "Decoded {} samples at {} Hz ({:.2}s)",
            samples.len(),
            sample_rate,
            samples.len() as f64 / sample_rate.max(1) as f64
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
        })
    }
}

/// Caps the number of decode threads alive at once
///
/// A timed-out decode cannot be cancelled; its thread keeps running until the
/// decoder returns. Sharing one limiter across calls bounds how many such
/// threads can pile up: once `max` are alive, new decodes are refused instead
/// of spawning more.
#[derive(Debug, Clone)]
pub struct DecodeLimiter {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl DecodeLimiter {
    /// Allow at most `max` concurrent decode threads
    pub fn new(max: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Decode threads currently alive, including abandoned ones
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> Option<DecodePermit> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| DecodePermit(Arc::clone(&self.active)))
    }
}

/// Released when the decode thread exits, including by panic
struct DecodePermit(Arc<AtomicUsize>);

impl Drop for DecodePermit {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decode on a worker thread, giving up after `timeout`
///
/// On timeout the worker is left to finish in the background and its result is
/// discarded. Use [`decode_with_limit`] when many calls are decoded so those
/// abandoned threads stay bounded.
///
/// # Errors
///
/// Returns `AnalysisError::Timeout` when decoding takes longer than `timeout`,
/// otherwise whatever the decoder returned
pub fn decode_with_timeout(
    decoder: Arc<dyn AudioDecoder>,
    bytes: Vec<u8>,
    hint: Option<String>,
    timeout: Duration,
) -> Result<DecodedAudio, AnalysisError> {
    spawn_decode(decoder, bytes, hint, timeout, None)
}

/// [`decode_with_timeout`] holding a slot of `limiter` for the thread's lifetime
///
/// # Errors
///
/// Returns `AnalysisError::ProcessingError` without decoding when `limiter`
/// has no free slot, otherwise as [`decode_with_timeout`]
pub fn decode_with_limit(
    decoder: Arc<dyn AudioDecoder>,
    bytes: Vec<u8>,
    hint: Option<String>,
    timeout: Duration,
    limiter: &DecodeLimiter,
) -> Result<DecodedAudio, AnalysisError> {
    let permit = limiter.try_acquire().ok_or_else(|| {
        AnalysisError::ProcessingError(format!(
            "{} decode threads still running, refusing to start another",
            limiter.active()
        ))
    })?;
    spawn_decode(decoder, bytes, hint, timeout, Some(permit))
}

fn spawn_decode(
    decoder: Arc<dyn AudioDecoder>,
    bytes: Vec<u8>,
    hint: Option<String>,
    timeout: Duration,
    permit: Option<DecodePermit>,
) -> Result<DecodedAudio, AnalysisError> {
    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name("audio-decode".to_string())
        .spawn(move || {
            let _permit = permit;
            let result = decoder.decode(&bytes, hint.as_deref());
            // Receiver may already have timed out
            let _ = tx.send(result);
        })
        .map_err(|e| AnalysisError::ProcessingError(format!("Failed to spawn decoder: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(AnalysisError::Timeout(format!(
            "Audio decoding exceeded {:.1}s",
            timeout.as_secs_f64()
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AnalysisError::DecodingError(
            "Decoder thread exited without a result".to_string(),
        )),
    }
}
