//! Segment re-encoding
//!
//! The tone stripper decides *which* parts of a call to keep; cutting and
//! re-encoding them is delegated to an encoder behind [`SegmentEncoder`].
//! [`FfmpegEncoder`] runs the original recording through an external
//! `ffmpeg` process with an `atrim`/`concat` filter graph and produces
//! low-bitrate mono Opus (VoIP profile) in an Ogg container.
//!
//! The recording is handed over as a scratch file rather than on stdin:
//! MP4/M4A captures often keep their `moov` index at the end of the file and
//! cannot be demuxed from a non-seekable pipe.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::StripConfig;
use crate::error::AnalysisError;

/// A span of the original audio that survives stripping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepSegment {
    /// Segment start in seconds
    pub start_secs: f64,

    /// Segment end in seconds
    pub end_secs: f64,
}

impl KeepSegment {
    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Cuts the keep segments out of a recording and joins them
pub trait SegmentEncoder: Send + Sync {
    /// Encode the concatenation of `segments` of `audio`
    fn encode_segments(&self, audio: &[u8], segments: &[KeepSegment]) -> Result<Vec<u8>, AnalysisError>;
}

/// Build the `-filter_complex` graph trimming and joining `segments`
///
/// Output pad is `[out]`.
///
/// # Errors
///
/// Returns `AnalysisError::EncodingError` when there is nothing to keep or a
/// segment is empty or inverted
pub fn build_filter_graph(segments: &[KeepSegment]) -> Result<String, AnalysisError> {
    if segments.is_empty() {
        return Err(AnalysisError::EncodingError(
            "Filter graph needs at least one segment".to_string(),
        ));
    }

    let mut graph = String::new();
    let mut labels = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if !(seg.start_secs >= 0.0 && seg.end_secs > seg.start_secs) {
            return Err(AnalysisError::EncodingError(format!(
                "Invalid segment {}: {:.3}-{:.3}s",
                i, seg.start_secs, seg.end_secs
            )));
        }
        graph.push_str(&format!(
            "[0:a]atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS[s{}];",
            seg.start_secs, seg.end_secs, i
        ));
        labels.push_str(&format!("[s{}]", i));
    }
    graph.push_str(&format!("{}concat=n={}:v=0:a=1[out]", labels, segments.len()));

    Ok(graph)
}

/// External `ffmpeg` process producing mono Opus
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
    sample_rate: u32,
    bitrate: u32,
}

impl FfmpegEncoder {
    /// Encoder using the binary, sample rate and bitrate from `config`
    pub fn new(config: &StripConfig) -> Self {
        Self {
            binary: config.encoder_path.clone(),
            sample_rate: config.output_sample_rate,
            bitrate: config.bitrate,
        }
    }

    fn arguments(&self, input: &Path, graph: &str) -> Vec<String> {
        let input = input.to_string_lossy();
        let sample_rate = self.sample_rate.to_string();
        let bitrate = self.bitrate.to_string();
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-i",
            input.as_ref(),
            "-filter_complex",
            graph,
            "-map",
            "[out]",
            "-ac",
            "1",
            "-ar",
            sample_rate.as_str(),
            "-c:a",
            "libopus",
            "-b:a",
            bitrate.as_str(),
            "-application",
            "voip",
            "-f",
            "ogg",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl SegmentEncoder for FfmpegEncoder {
    fn encode_segments(&self, audio: &[u8], segments: &[KeepSegment]) -> Result<Vec<u8>, AnalysisError> {
        let graph = build_filter_graph(segments)?;
        log::debug!("Encoding {} segments with {}: {}", segments.len(), self.binary, graph);

        let mut input = tempfile::Builder::new()
            .prefix("radio-tones-")
            .tempfile()
            .map_err(|e| AnalysisError::EncodingError(format!("Creating encoder input file: {}", e)))?;
        input
            .write_all(audio)
            .and_then(|_| input.flush())
            .map_err(|e| AnalysisError::EncodingError(format!("Writing encoder input file: {}", e)))?;

        // `output()` drains stdout and stderr together, so a chatty encoder
        // cannot stall on a full stderr pipe
        let output = Command::new(&self.binary)
            .args(self.arguments(input.path(), &graph))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AnalysisError::EncodingError(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(AnalysisError::EncodingError(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}
