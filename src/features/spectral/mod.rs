//! Spectral front end
//!
//! - Windowed magnitude spectra (STFT)
//! - Adaptive noise floor and frame gating

pub mod noise_floor;
pub mod stft;

pub use noise_floor::{estimate_noise_floor, FrameGate};
pub use stft::{analyze_frames, SpectralFrame, Spectrogram};
