//! Feature extraction modules
//!
//! This module contains the signal side of tone detection:
//! - Spectral framing and adaptive noise gating
//! - Peak tracking and detection merging

pub mod spectral;
pub mod tracking;
