//! Tone stripping for transcription
//!
//! Speech-to-text engines hallucinate words over paging tones. Before a call
//! is transcribed the tones found by
//! [`detect_all_tones_for_transcription`](crate::detect_all_tones_for_transcription)
//! are cut out:
//!
//! 1. Sort tones by start time
//! 2. Expand each tone by a 0.1 s buffer on both sides, clipped to the call
//! 3. Keep the complement of the expanded intervals
//! 4. Let a [`SegmentEncoder`] trim and re-encode the keep segments
//!
//! Stripping must never make a playable call silent: any failure returns the
//! original bytes unchanged.

use crate::analysis::result::Tone;
use crate::config::StripConfig;
use crate::io::encoder::{KeepSegment, SegmentEncoder};

/// Keep segments shorter than this are dropped (one millisecond)
const MIN_SEGMENT_SECS: f64 = 0.001;

/// Complement of the buffered tone intervals within `[0, total_duration_secs]`
pub fn keep_segments(tones: &[Tone], total_duration_secs: f64, buffer_secs: f64) -> Vec<KeepSegment> {
    let mut sorted: Vec<&Tone> = tones.iter().collect();
    sorted.sort_by(|a, b| {
        a.start_time
            .partial_cmp(&b.start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut segments = Vec::new();
    let mut cursor = 0.0f64;

    for tone in sorted {
        let cut_start = (tone.start_time - buffer_secs).clamp(0.0, total_duration_secs);
        let cut_end = (tone.end_time + buffer_secs).clamp(0.0, total_duration_secs);

        if cut_start - cursor >= MIN_SEGMENT_SECS {
            segments.push(KeepSegment {
                start_secs: cursor,
                end_secs: cut_start,
            });
        }
        cursor = cursor.max(cut_end);
    }

    if total_duration_secs - cursor >= MIN_SEGMENT_SECS {
        segments.push(KeepSegment {
            start_secs: cursor,
            end_secs: total_duration_secs,
        });
    }

    segments
}

/// Remove `tones` from `audio`, falling back to the original bytes on any failure
///
/// # Arguments
///
/// * `audio` - Original encoded recording
/// * `tones` - Tones to remove (times in seconds)
/// * `total_duration_secs` - Length of the recording
/// * `encoder` - Trims and re-encodes the keep segments
/// * `config` - Buffer and plausibility parameters
pub fn strip_tones(
    audio: &[u8],
    tones: &[Tone],
    total_duration_secs: f64,
    encoder: &dyn SegmentEncoder,
    config: &StripConfig,
) -> Vec<u8> {
    if tones.is_empty() {
        return audio.to_vec();
    }

    let segments = keep_segments(tones, total_duration_secs, config.buffer_secs);
    if segments.is_empty() {
        log::warn!(
            "Tones cover the whole {:.2}s call; keeping original audio",
            total_duration_secs
        );
        return audio.to_vec();
    }

    let kept: f64 = segments.iter().map(KeepSegment::duration_secs).sum();
    log::debug!(
        "Stripping {} tones: keeping {} segments ({:.2}s of {:.2}s)",
        tones.len(),
        segments.len(),
        kept,
        total_duration_secs
    );

    match encoder.encode_segments(audio, &segments) {
        Ok(encoded) if encoded.is_empty() => {
            log::warn!("Tone stripping produced no output; keeping original audio");
            audio.to_vec()
        }
        Ok(encoded) if (encoded.len() as f64) < audio.len() as f64 * config.min_output_ratio => {
            log::warn!(
                "Tone stripping output implausibly small ({} of {} bytes); keeping original audio",
                encoded.len(),
                audio.len()
            );
            audio.to_vec()
        }
        Ok(encoded) => encoded,
        Err(e) => {
            log::warn!("Tone stripping failed, keeping original audio: {}", e);
            audio.to_vec()
        }
    }
}
