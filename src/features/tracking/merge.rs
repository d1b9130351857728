//! Detection merging with drift-vs-distinct-tone disambiguation
//!
//! A sustained tone often reaches the merger as several raw detections
//! (slight drift, brief fades). They are folded into one candidate when their
//! frequencies are close and their time spans touch. Loose frequency tolerance
//! would also fuse two genuinely different back-to-back tones, so once a
//! candidate exists the merger refuses samples that jump too far from its
//! recent median, or from its seed frequency while it holds a single
//! detection ("force split").

use super::peaks::RawDetection;
use crate::config::DetectionConfig;

/// A consolidated tone candidate (transient, one call only)
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDetection {
    /// Running average of merged frequencies, weighted by merge count
    pub frequency: f64,

    /// Start of the earliest merged detection in seconds
    pub start_secs: f64,

    /// End of the latest merged detection in seconds
    pub end_secs: f64,

    /// Largest magnitude among merged detections
    pub magnitude: f32,

    /// Number of raw detections folded in
    pub merge_count: u32,

    /// Frequencies of the merged raw detections, in merge order
    pub frequency_history: Vec<f64>,
}

impl MergedDetection {
    fn from_raw(raw: &RawDetection) -> Self {
        Self {
            frequency: raw.frequency,
            start_secs: raw.start_secs,
            end_secs: raw.end_secs,
            magnitude: raw.magnitude,
            merge_count: 1,
            frequency_history: vec![raw.frequency],
        }
    }

    /// Length of the candidate in seconds
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Median of the last two history samples, or the seed frequency while
    /// the candidate holds a single detection
    ///
    /// A steady tone usually reaches the merger as one raw detection, so the
    /// seed alone must already anchor the drift check.
    pub fn recent_median(&self) -> Option<f64> {
        match self.frequency_history.as_slice() {
            [.., a, b] => Some((a + b) / 2.0),
            [seed] => Some(*seed),
            [] => None,
        }
    }

    /// `true` when `frequency` is too far from the recent median to be drift
    pub fn forces_split(&self, frequency: f64, force_split_hz: f64) -> bool {
        self.recent_median()
            .map(|median| (frequency - median).abs() > force_split_hz)
            .unwrap_or(false)
    }

    fn accepts(&self, raw: &RawDetection, tolerance_hz: f64, time_tolerance_secs: f64) -> bool {
        (self.frequency - raw.frequency).abs() <= tolerance_hz
            && raw.start_secs <= self.end_secs + time_tolerance_secs
            && raw.end_secs >= self.start_secs - time_tolerance_secs
    }

    fn absorb(&mut self, raw: &RawDetection) {
        let count = self.merge_count as f64;
        self.frequency = (self.frequency * count + raw.frequency) / (count + 1.0);
        self.merge_count += 1;
        self.start_secs = self.start_secs.min(raw.start_secs);
        self.end_secs = self.end_secs.max(raw.end_secs);
        self.magnitude = self.magnitude.max(raw.magnitude);
        self.frequency_history.push(raw.frequency);
    }
}

/// Merge raw detections into tone candidates
///
/// Raw detections shorter than `config.min_duration_secs` are discarded first.
/// Each remaining detection (in start order) joins the first candidate within
/// `merge_tolerance_hz` whose span overlaps within `merge_time_tolerance_secs`,
/// unless that candidate forces a split, in which case it starts a new one.
///
/// # Returns
///
/// Candidates ordered by start time
pub fn merge_detections(raw: &[RawDetection], config: &DetectionConfig) -> Vec<MergedDetection> {
    let mut merged: Vec<MergedDetection> = Vec::new();
    let mut splits = 0usize;

    for det in raw
        .iter()
        .filter(|d| d.duration_secs() >= config.min_duration_secs)
    {
        let target = merged.iter_mut().find(|m| {
            m.accepts(det, config.merge_tolerance_hz, config.merge_time_tolerance_secs)
        });

        match target {
            Some(m) if m.forces_split(det.frequency, config.force_split_hz) => {
                log::debug!(
                    "Force split: {:.1} Hz vs recent median {:.1} Hz",
                    det.frequency,
                    m.recent_median().unwrap_or(m.frequency)
                );
                splits += 1;
                merged.push(MergedDetection::from_raw(det));
            }
            Some(m) => m.absorb(det),
            None => merged.push(MergedDetection::from_raw(det)),
        }
    }

    merged.sort_by(|a, b| {
        a.start_secs
            .partial_cmp(&b.start_secs)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    log::debug!(
        "Merged {} raw detections into {} candidates ({} force splits)",
        raw.len(),
        merged.len(),
        splits
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(frequency: f64, start_secs: f64, end_secs: f64) -> RawDetection {
        RawDetection {
            frequency,
            start_secs,
            end_secs,
            magnitude: 0.1,
        }
    }

    #[test]
    fn test_short_detections_dropped() {
        let config = DetectionConfig::default();
        let merged = merge_detections(&[raw(350.0, 0.0, 0.5), raw(700.0, 0.0, 0.7)], &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].frequency, 700.0);

        let config = DetectionConfig::transcription();
        let merged = merge_detections(&[raw(350.0, 0.0, 0.5)], &config);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_drifting_tone_merges_with_weighted_average() {
        let config = DetectionConfig::default();
        let merged = merge_detections(
            &[raw(350.0, 0.0, 1.0), raw(356.0, 0.95, 2.0), raw(359.0, 2.05, 3.0)],
            &config,
        );
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert_eq!(m.merge_count, 3);
        assert!((m.frequency - (350.0 + 356.0 + 359.0) / 3.0).abs() < 1e-9);
        assert_eq!(m.start_secs, 0.0);
        assert_eq!(m.end_secs, 3.0);
        assert_eq!(m.frequency_history, vec![350.0, 356.0, 359.0]);
    }

    #[test]
    fn test_time_gap_beyond_tolerance_not_merged() {
        let config = DetectionConfig::default();
        let merged = merge_detections(&[raw(350.0, 0.0, 1.0), raw(350.0, 1.2, 2.0)], &config);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_frequency_beyond_tolerance_not_merged() {
        let config = DetectionConfig::default();
        let merged = merge_detections(&[raw(350.0, 0.0, 0.8), raw(372.0, 0.8, 1.6)], &config);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].frequency, 350.0);
        assert_eq!(merged[1].frequency, 372.0);
    }

    #[test]
    fn test_force_split_refuses_jump_within_tolerance() {
        // Stripping tolerance (25 Hz) would accept 372 Hz into the 351 Hz
        // candidate, but its two-sample history pins the median at 351 Hz
        let config = DetectionConfig::transcription();
        let merged = merge_detections(
            &[raw(350.0, 0.0, 0.8), raw(352.0, 0.7, 1.4), raw(372.0, 1.4, 2.2)],
            &config,
        );
        assert_eq!(merged.len(), 2);
        assert!((merged[0].frequency - 351.0).abs() < 1e-9);
        assert_eq!(merged[1].frequency, 372.0);
    }

    #[test]
    fn test_jump_from_seed_splits_with_stripping_tolerance() {
        // 22 Hz is inside the 25 Hz stripping tolerance; the seed frequency
        // alone is enough to refuse it
        let config = DetectionConfig::transcription();
        let merged = merge_detections(&[raw(350.0, 0.0, 0.98), raw(372.0, 0.62, 1.78)], &config);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].frequency, 350.0);
        assert_eq!(merged[1].frequency, 372.0);
        assert!(merged.iter().all(|m| m.merge_count == 1));
    }

    #[test]
    fn test_small_step_from_seed_still_merges() {
        let config = DetectionConfig::transcription();
        let merged = merge_detections(&[raw(350.0, 0.0, 0.8), raw(365.0, 0.8, 1.6)], &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].merge_count, 2);
    }

    #[test]
    fn test_recent_median() {
        let mut m = MergedDetection::from_raw(&raw(350.0, 0.0, 1.0));
        assert_eq!(m.recent_median(), Some(350.0));
        assert!(m.forces_split(372.0, 18.0));
        assert!(!m.forces_split(365.0, 18.0));
        m.absorb(&raw(360.0, 0.5, 1.5));
        m.absorb(&raw(370.0, 1.0, 2.0));
        assert_eq!(m.recent_median(), Some(365.0));
        assert!(m.forces_split(384.0, 18.0));
        assert!(!m.forces_split(383.0, 18.0));
    }
}
