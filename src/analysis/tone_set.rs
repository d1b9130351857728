//! Tone set configuration
//!
//! Operator-defined descriptions of the tones that identify an alert channel.
//! The JSON wire format is camelCase and round-trips losslessly:
//!
//! ```json
//! {"id": "station-7", "label": "Station 7",
//!  "aTone": {"frequency": 350.0, "minDuration": 0.6, "maxDuration": 0.0},
//!  "bTone": {"frequency": 1050.0, "minDuration": 0.6, "maxDuration": 0.0},
//!  "tolerance": 0.02, "minDuration": 0.6}
//! ```

use serde::{Deserialize, Serialize};

use super::result::ToneType;
use crate::error::AnalysisError;

/// Tolerances below this are ratios of [`TOLERANCE_RATIO_SCALE_HZ`]
pub const TOLERANCE_RATIO_LIMIT: f64 = 1.0;

/// Scale applied to ratio tolerances
pub const TOLERANCE_RATIO_SCALE_HZ: f64 = 500.0;

/// Expected frequency and duration range for one tone slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneSpec {
    /// Nominal frequency in Hz
    pub frequency: f64,

    /// Minimum duration in seconds (0 = use the tone set's minimum)
    #[serde(default)]
    pub min_duration: f64,

    /// Maximum duration in seconds (0 = unbounded)
    #[serde(default)]
    pub max_duration: f64,
}

/// An operator-defined tone set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneSet {
    /// Stable identifier
    pub id: String,

    /// Human-readable name
    pub label: String,

    /// First tone of a two-tone page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_tone: Option<ToneSpec>,

    /// Second tone of a two-tone page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_tone: Option<ToneSpec>,

    /// Single long alerting tone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_tone: Option<ToneSpec>,

    /// Frequency tolerance: a ratio of 500 Hz below 1.0, absolute Hz otherwise
    pub tolerance: f64,

    /// Duration floor for slots that do not set their own
    #[serde(default)]
    pub min_duration: f64,
}

impl ToneSet {
    /// Frequency tolerance in Hz
    ///
    /// `0.02` means 2% of 500 Hz (10 Hz); `15` means 15 Hz.
    pub fn tolerance_hz(&self) -> f64 {
        if self.tolerance < TOLERANCE_RATIO_LIMIT {
            self.tolerance * TOLERANCE_RATIO_SCALE_HZ
        } else {
            self.tolerance
        }
    }

    /// Spec configured for `slot`, if any
    pub fn spec(&self, slot: ToneType) -> Option<&ToneSpec> {
        match slot {
            ToneType::A => self.a_tone.as_ref(),
            ToneType::B => self.b_tone.as_ref(),
            ToneType::Long => self.long_tone.as_ref(),
            ToneType::Unclassified => None,
        }
    }

    /// `true` when `frequency` is within tolerance of `spec`
    pub fn frequency_matches(&self, spec: &ToneSpec, frequency: f64) -> bool {
        (frequency - spec.frequency).abs() <= self.tolerance_hz()
    }

    /// `true` when `duration` lies in the spec's `[min, max]` range
    pub fn duration_matches(&self, spec: &ToneSpec, duration: f64) -> bool {
        let min = if spec.min_duration > 0.0 {
            spec.min_duration
        } else {
            self.min_duration
        };
        duration >= min && (spec.max_duration <= 0.0 || duration <= spec.max_duration)
    }

    /// `true` when a tone of `frequency`/`duration` satisfies `slot`
    pub fn slot_matches(&self, slot: ToneType, frequency: f64, duration: f64) -> bool {
        self.spec(slot)
            .map(|spec| {
                self.frequency_matches(spec, frequency) && self.duration_matches(spec, duration)
            })
            .unwrap_or(false)
    }
}

/// Parse a JSON array of tone sets
pub fn parse_tone_sets(json: &str) -> Result<Vec<ToneSet>, AnalysisError> {
    let sets: Vec<ToneSet> = serde_json::from_str(json)?;
    log::debug!("Parsed {} tone sets", sets.len());
    Ok(sets)
}

/// Serialize tone sets to a JSON array
pub fn serialize_tone_sets(sets: &[ToneSet]) -> Result<String, AnalysisError> {
    Ok(serde_json::to_string(sets)?)
}
