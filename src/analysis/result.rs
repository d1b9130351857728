//! Tone detection result types

use serde::{Deserialize, Serialize};

use super::tone_set::ToneSet;

/// Role a detected tone plays in a tone set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneType {
    /// First tone of a sequential two-tone page
    A,
    /// Second tone of a sequential two-tone page
    B,
    /// Single extended alerting tone
    Long,
    /// Matched no type, or more than one type (ambiguous)
    #[default]
    #[serde(rename = "")]
    Unclassified,
}

impl ToneType {
    /// Wire name ("A", "B", "Long" or "")
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneType::A => "A",
            ToneType::B => "B",
            ToneType::Long => "Long",
            ToneType::Unclassified => "",
        }
    }
}

/// A sustained tone found in a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tone {
    /// Frequency in Hz
    pub frequency: f64,

    /// Start time in seconds from the beginning of the call
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// `end_time - start_time`
    pub duration: f64,

    /// Classification against the configured tone sets
    pub tone_type: ToneType,
}

impl Tone {
    /// Build a tone, keeping `0 <= start <= end` and deriving the duration
    pub fn new(frequency: f64, start_time: f64, end_time: f64, tone_type: ToneType) -> Self {
        let start_time = start_time.max(0.0);
        let end_time = end_time.max(start_time);
        Self {
            frequency,
            start_time,
            end_time,
            duration: end_time - start_time,
            tone_type,
        }
    }
}

/// Every tone found in one call, plus the tone sets they satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneSequence {
    /// Detected tones ordered by start time
    pub tones: Vec<Tone>,

    /// Length of the analyzed audio in seconds
    pub duration: f64,

    /// First tone tagged A
    pub a_tone: Option<Tone>,

    /// First tone tagged B
    pub b_tone: Option<Tone>,

    /// First tone tagged Long
    pub long_tone: Option<Tone>,

    /// `true` when at least one tone was detected
    pub has_tones: bool,

    /// First satisfied tone set in configuration order
    pub matched_tone_set: Option<ToneSet>,

    /// Every satisfied tone set in configuration order
    pub matched_tone_sets: Vec<ToneSet>,
}

impl ToneSequence {
    /// The "no tones" result
    pub fn empty(duration: f64) -> Self {
        Self {
            tones: Vec::new(),
            duration,
            a_tone: None,
            b_tone: None,
            long_tone: None,
            has_tones: false,
            matched_tone_set: None,
            matched_tone_sets: Vec::new(),
        }
    }

    /// Assemble a sequence from classified tones and the sets they satisfy
    pub fn from_tones(mut tones: Vec<Tone>, duration: f64, matched_tone_sets: Vec<ToneSet>) -> Self {
        tones.sort_by(|a, b| {
            a.start_time
                .partial_cmp(&b.start_time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let first_of = |kind: ToneType| tones.iter().find(|t| t.tone_type == kind).cloned();

        Self {
            a_tone: first_of(ToneType::A),
            b_tone: first_of(ToneType::B),
            long_tone: first_of(ToneType::Long),
            has_tones: !tones.is_empty(),
            matched_tone_set: matched_tone_sets.first().cloned(),
            matched_tone_sets,
            tones,
            duration,
        }
    }

    /// Labels of every matched tone set
    pub fn matched_labels(&self) -> Vec<&str> {
        self.matched_tone_sets.iter().map(|s| s.label.as_str()).collect()
    }
}
