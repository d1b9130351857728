//! Classification and result modules
//!
//! - Result types (tones, tone sequences)
//! - Tone set configuration
//! - Tone set matching (per tone and per sequence)

pub mod matcher;
pub mod result;
pub mod tone_set;
