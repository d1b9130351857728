//! Example: Detect tones in a batch of call recordings
//!
//! Usage: detect_batch [--jobs N] <tone_sets.json> <call1> <call2> ...
//!
//! Prints one JSON object per call (JSONL) on stdout.

use std::env;
use std::path::Path;
use std::sync::Arc;

use radio_tones::batch::{detect_batch, BatchJob, BatchOptions, BatchOutcome, ResultSink};
use radio_tones::io::SymphoniaDecoder;
use radio_tones::{parse_tone_sets, AnalysisError};

/// Streams outcomes to stdout as they arrive
struct JsonLinesSink;

impl ResultSink for JsonLinesSink {
    fn write_batch(&mut self, outcomes: &[BatchOutcome]) -> Result<(), AnalysisError> {
        for outcome in outcomes {
            let line = match &outcome.result {
                Ok(sequence) => serde_json::json!({
                    "file": outcome.id,
                    "processing_time_ms": outcome.processing_time_ms,
                    "matched": sequence.matched_labels(),
                    "sequence": sequence,
                }),
                Err(e) => serde_json::json!({
                    "file": outcome.id,
                    "processing_time_ms": outcome.processing_time_ms,
                    "error": e,
                }),
            };
            println!("{}", line);
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut options = BatchOptions::default();

    if let Some(pos) = args.iter().position(|a| a == "--jobs") {
        let value = args
            .get(pos + 1)
            .ok_or("--jobs requires a value")?
            .parse::<usize>()?;
        options.workers = value.max(1);
        args.drain(pos..=pos + 1);
    }

    if args.len() < 2 {
        eprintln!("Usage: detect_batch [--jobs N] <tone_sets.json> <call1> <call2> ...");
        std::process::exit(2);
    }

    let tone_sets = parse_tone_sets(&std::fs::read_to_string(&args[0])?)?;
    eprintln!("Loaded {} tone sets", tone_sets.len());

    let mut jobs = Vec::new();
    for path in &args[1..] {
        jobs.push(BatchJob {
            id: path.clone(),
            audio: std::fs::read(path)?,
            hint: Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_string),
        });
    }

    let summary = detect_batch(
        &jobs,
        Arc::new(SymphoniaDecoder::new()),
        &tone_sets,
        &options,
        &mut JsonLinesSink,
    )?;

    eprintln!(
        "Done: {} ok, {} failed, {:.0} ms",
        summary.succeeded, summary.failed, summary.elapsed_ms
    );
    Ok(())
}
