//! Batch tone detection
//!
//! Runs many calls through decode and detection on a bounded `rayon` pool.
//! A failing or panicking call only fails its own outcome. Outcomes are handed
//! to a [`ResultSink`] in chunks, in job order.
//!
//! Decoding runs on its own thread so it can time out. A timed-out decode
//! keeps its thread until the decoder returns; a [`DecodeLimiter`] shared by
//! the batch caps how many such threads exist, and jobs arriving while the cap
//! is reached fail instead of spawning more.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::result::ToneSequence;
use crate::analysis::tone_set::ToneSet;
use crate::config::DetectionConfig;
use crate::error::AnalysisError;
use crate::io::decoder::{decode_with_limit, AudioDecoder, DecodeLimiter, DEFAULT_DECODE_TIMEOUT};

/// One call to analyze
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Caller's identifier, copied to the outcome
    pub id: String,

    /// Encoded call recording
    pub audio: Vec<u8>,

    /// File extension hint for the decoder
    pub hint: Option<String>,
}

/// Result of one job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Identifier of the job
    pub id: String,

    /// Detected tones, or why the call could not be analyzed
    pub result: Result<ToneSequence, String>,

    /// Wall time spent on the job in milliseconds
    pub processing_time_ms: f64,
}

impl BatchOutcome {
    /// `true` when the job produced a tone sequence
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Receives outcomes as the batch progresses
pub trait ResultSink {
    /// Persist one chunk of outcomes
    fn write_batch(&mut self, outcomes: &[BatchOutcome]) -> Result<(), AnalysisError>;
}

/// Collects outcomes in memory
#[derive(Debug, Default)]
pub struct VecSink {
    /// Outcomes in job order
    pub outcomes: Vec<BatchOutcome>,

    /// Number of `write_batch` calls received
    pub writes: usize,
}

impl ResultSink for VecSink {
    fn write_batch(&mut self, outcomes: &[BatchOutcome]) -> Result<(), AnalysisError> {
        self.outcomes.extend_from_slice(outcomes);
        self.writes += 1;
        Ok(())
    }
}

/// Batch runner parameters
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads (default: CPU count minus one, at least 1)
    pub workers: usize,

    /// Outcomes per sink write (default: 50)
    pub write_batch_size: usize,

    /// Per-call decode timeout (default: 10 s)
    pub decode_timeout: Duration,

    /// Decode threads alive at once, timed-out ones included (default: 2 × workers)
    pub max_decode_threads: usize,

    /// Detection parameters (default: tone matching)
    pub config: DetectionConfig,
}

impl Default for BatchOptions {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            workers,
            write_batch_size: 50,
            max_decode_threads: workers * 2,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            config: DetectionConfig::tone_matching(),
        }
    }
}

/// Totals for a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Jobs processed
    pub total: usize,

    /// Jobs with a tone sequence
    pub succeeded: usize,

    /// Jobs that failed to decode, detect, or panicked
    pub failed: usize,

    /// Wall time for the whole batch in milliseconds
    pub elapsed_ms: f64,
}

/// CPU count minus one, at least 1
pub fn default_workers() -> usize {
    let n = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);
    std::cmp::max(1, n.saturating_sub(1))
}

/// Decode and analyze every job
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for zero workers or chunk size or an
/// invalid detection config, `AnalysisError::ProcessingError` if the pool
/// cannot be built, and any error from `sink`. Per-job failures are reported
/// in the outcomes, never here.
pub fn detect_batch(
    jobs: &[BatchJob],
    decoder: Arc<dyn AudioDecoder>,
    tone_sets: &[ToneSet],
    options: &BatchOptions,
    sink: &mut dyn ResultSink,
) -> Result<BatchSummary, AnalysisError> {
    if options.workers == 0 {
        return Err(AnalysisError::InvalidInput(
            "Batch needs at least one worker".to_string(),
        ));
    }
    if options.max_decode_threads == 0 {
        return Err(AnalysisError::InvalidInput(
            "Batch needs at least one decode thread".to_string(),
        ));
    }
    if options.write_batch_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Write batch size must be > 0".to_string(),
        ));
    }
    options.config.validate()?;

    let started = Instant::now();
    log::info!("Batch: {} calls, workers={}", jobs.len(), options.workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .map_err(|e| AnalysisError::ProcessingError(format!("Failed to build worker pool: {}", e)))?;

    let limiter = DecodeLimiter::new(options.max_decode_threads);
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for chunk in jobs.chunks(options.write_batch_size) {
        let outcomes: Vec<BatchOutcome> = pool.install(|| {
            chunk
                .par_iter()
                .map(|job| run_job(job, &decoder, &limiter, tone_sets, options))
                .collect()
        });

        for outcome in &outcomes {
            match &outcome.result {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    log::warn!("Call {} failed: {}", outcome.id, e);
                }
            }
        }

        sink.write_batch(&outcomes)?;
    }

    let summary = BatchSummary {
        total: jobs.len(),
        succeeded,
        failed,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    };
    log::info!(
        "Batch done: {} ok, {} failed in {:.0} ms",
        summary.succeeded,
        summary.failed,
        summary.elapsed_ms
    );
    Ok(summary)
}

fn run_job(
    job: &BatchJob,
    decoder: &Arc<dyn AudioDecoder>,
    limiter: &DecodeLimiter,
    tone_sets: &[ToneSet],
    options: &BatchOptions,
) -> BatchOutcome {
    let started = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let audio = decode_with_limit(
            Arc::clone(decoder),
            job.audio.clone(),
            job.hint.clone(),
            options.decode_timeout,
            limiter,
        )
        .map_err(|e| format!("decode failed: {}", e))?;

        crate::detect_tones_with_config(&audio.samples, audio.sample_rate, tone_sets, &options.config)
            .map_err(|e| format!("detection failed: {}", e))
    }))
    .unwrap_or_else(|_| Err("detection panicked".to_string()));

    BatchOutcome {
        id: job.id.clone(),
        result,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::DecodedAudio;

    /// Decodes `b"tone"` into a long 1 kHz tone, `b"panic"` into a panic and
    /// anything else into a decode error
    struct ScriptedDecoder;

    impl AudioDecoder for ScriptedDecoder {
        fn decode(&self, bytes: &[u8], _hint: Option<&str>) -> Result<DecodedAudio, AnalysisError> {
            match bytes {
                b"tone" => {
                    let sr = 8000u32;
                    let mut samples: Vec<f32> = (0..4000).map(|i| 0.001 * ((i % 7) as f32 - 3.0)).collect();
                    samples.extend((0..12_000).map(|i| {
                        0.5 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin()
                    }));
                    samples.extend((0..40_000).map(|i| 0.001 * ((i % 5) as f32 - 2.0)));
                    Ok(DecodedAudio {
                        samples,
                        sample_rate: sr,
                    })
                }
                b"silence" => Ok(DecodedAudio {
                    samples: vec![0.0; 16_000],
                    sample_rate: 8000,
                }),
                b"panic" => panic!("decoder bug"),
                _ => Err(AnalysisError::DecodingError("unsupported".to_string())),
            }
        }
    }

    fn job(id: &str, audio: &[u8]) -> BatchJob {
        BatchJob {
            id: id.to_string(),
            audio: audio.to_vec(),
            hint: None,
        }
    }

    fn options(write_batch_size: usize) -> BatchOptions {
        BatchOptions {
            workers: 2,
            write_batch_size,
            ..BatchOptions::default()
        }
    }

    #[test]
    fn test_default_workers_at_least_one() {
        assert!(default_workers() >= 1);
        assert_eq!(BatchOptions::default().write_batch_size, 50);
    }

    #[test]
    fn test_batch_isolates_failures_and_keeps_order() {
        let jobs = vec![
            job("a", b"tone"),
            job("b", b"garbage"),
            job("c", b"silence"),
            job("d", b"panic"),
            job("e", b"tone"),
        ];
        let mut sink = VecSink::default();
        let summary =
            detect_batch(&jobs, Arc::new(ScriptedDecoder), &[], &options(2), &mut sink).unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(sink.writes, 3);

        let ids: Vec<&str> = sink.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

        assert!(sink.outcomes[0].result.as_ref().unwrap().has_tones);
        assert!(sink.outcomes[1].result.as_ref().unwrap_err().starts_with("decode failed"));
        assert!(!sink.outcomes[2].result.as_ref().unwrap().has_tones);
        assert!(!sink.outcomes[3].is_ok());
    }

    #[test]
    fn test_hung_decodes_are_bounded() {
        struct HangingDecoder;
        impl AudioDecoder for HangingDecoder {
            fn decode(&self, _bytes: &[u8], _hint: Option<&str>) -> Result<DecodedAudio, AnalysisError> {
                std::thread::sleep(Duration::from_millis(500));
                Err(AnalysisError::DecodingError("too late".to_string()))
            }
        }

        let jobs: Vec<BatchJob> = (0..4).map(|i| job(&i.to_string(), b"x")).collect();
        let opts = BatchOptions {
            workers: 1,
            write_batch_size: 10,
            decode_timeout: Duration::from_millis(10),
            max_decode_threads: 2,
            ..BatchOptions::default()
        };
        let mut sink = VecSink::default();
        let summary = detect_batch(&jobs, Arc::new(HangingDecoder), &[], &opts, &mut sink).unwrap();

        assert_eq!(summary.failed, 4);
        let errors: Vec<&str> = sink
            .outcomes
            .iter()
            .map(|o| o.result.as_ref().unwrap_err().as_str())
            .collect();
        // Two decodes time out and keep their threads; the rest are refused
        assert!(errors[0].contains("Timed out"));
        assert!(errors[1].contains("Timed out"));
        assert!(errors[2].contains("decode threads still running"));
        assert!(errors[3].contains("decode threads still running"));
    }

    #[test]
    fn test_batch_rejects_zero_workers() {
        let mut sink = VecSink::default();
        let opts = BatchOptions {
            workers: 0,
            ..BatchOptions::default()
        };
        let err = detect_batch(&[], Arc::new(ScriptedDecoder), &[], &opts, &mut sink).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_sink_error_propagates() {
        struct FailingSink;
        impl ResultSink for FailingSink {
            fn write_batch(&mut self, _outcomes: &[BatchOutcome]) -> Result<(), AnalysisError> {
                Err(AnalysisError::ProcessingError("disk full".to_string()))
            }
        }

        let err = detect_batch(
            &[job("a", b"silence")],
            Arc::new(ScriptedDecoder),
            &[],
            &options(10),
            &mut FailingSink,
        )
        .unwrap_err();
        assert_eq!(err, AnalysisError::ProcessingError("disk full".to_string()));
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = BatchOutcome {
            id: "x".to_string(),
            result: Err("decode failed".to_string()),
            processing_time_ms: 1.5,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["processingTimeMs"], 1.5);
        assert_eq!(json["result"]["Err"], "decode failed");
    }
}
