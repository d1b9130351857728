//! Audio preprocessing modules
//!
//! Utilities for preparing decoded audio for tone analysis:
//! - Channel mixing (multichannel to mono)
//! - Band-pass pre-filtering
//! - Resampling to the analysis rate

pub mod band_pass;
pub mod channel_mixer;
pub mod resample;
