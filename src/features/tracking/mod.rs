//! Tone tracking modules
//!
//! - Peak tracking (sub-bin refinement, bucketed raw detections)
//! - Detection merging (force-split drift heuristic)

pub mod merge;
pub mod peaks;

pub use merge::{merge_detections, MergedDetection};
pub use peaks::{track_peaks, PeakTracker, RawDetection, SpectralPeak};
