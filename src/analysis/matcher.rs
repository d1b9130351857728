//! Tone set matching
//!
//! Two levels:
//!
//! - **Per tone**: each tone is checked against the A, B and Long slot of every
//!   tone set. A tone satisfying exactly one distinct slot type is tagged with
//!   it; a tone satisfying several types stays unclassified (ambiguous).
//! - **Per sequence**: a tone set matches a call when every configured slot has
//!   a candidate and, for two-tone sets, some A tone is followed closely by a
//!   tone that satisfies the B frequency.
//!
//! # Example
//!
//! ```
//! use radio_tones::analysis::matcher::match_tone_set;
//! use radio_tones::analysis::result::{Tone, ToneType};
//! use radio_tones::analysis::tone_set::{ToneSet, ToneSpec};
//!
//! let set = ToneSet {
//!     id: "1".into(),
//!     label: "Station 1".into(),
//!     a_tone: Some(ToneSpec { frequency: 350.0, min_duration: 0.6, max_duration: 0.0 }),
//!     b_tone: Some(ToneSpec { frequency: 1050.0, min_duration: 0.6, max_duration: 0.0 }),
//!     long_tone: None,
//!     tolerance: 10.0,
//!     min_duration: 0.6,
//! };
//! let tones = vec![
//!     Tone::new(351.0, 0.0, 1.0, ToneType::A),
//!     Tone::new(1049.0, 1.2, 2.2, ToneType::B),
//! ];
//! assert_eq!(match_tone_set(&tones, std::slice::from_ref(&set)).map(|s| s.id.as_str()), Some("1"));
//! ```

use super::result::{Tone, ToneType};
use super::tone_set::ToneSet;

/// Largest |B start − A end| accepted when pairing a B tone with an A tone
pub const PAIR_GAP_SECS: f64 = 0.5;

const SLOTS: [ToneType; 3] = [ToneType::A, ToneType::B, ToneType::Long];

/// Distinct slot types a tone satisfies across all tone sets
///
/// Every set is evaluated independently; a tone may satisfy several sets.
pub fn matched_types(frequency: f64, duration: f64, tone_sets: &[ToneSet]) -> Vec<ToneType> {
    SLOTS
        .iter()
        .copied()
        .filter(|&slot| {
            tone_sets
                .iter()
                .any(|set| set.slot_matches(slot, frequency, duration))
        })
        .collect()
}

/// Tag for a tone: its single matched type, or unclassified
pub fn classify_tone(frequency: f64, duration: f64, tone_sets: &[ToneSet]) -> ToneType {
    match matched_types(frequency, duration, tone_sets).as_slice() {
        [only] => *only,
        _ => ToneType::Unclassified,
    }
}

/// Index of the B tone paired with `tones[a_index]`
///
/// Candidates end no earlier than the A tone and start within
/// ±[`PAIR_GAP_SECS`] of its end; the one with the smallest |gap| wins
/// (ties go to the earlier index).
pub fn find_paired_b(tones: &[Tone], a_index: usize) -> Option<usize> {
    let a = tones.get(a_index)?;

    tones
        .iter()
        .enumerate()
        .filter(|&(j, t)| j != a_index && t.end_time >= a.end_time)
        .map(|(j, t)| (j, (t.start_time - a.end_time).abs()))
        .filter(|&(_, gap)| gap <= PAIR_GAP_SECS)
        .fold(None, |best: Option<(usize, f64)>, (j, gap)| match best {
            Some((_, best_gap)) if best_gap <= gap => best,
            _ => Some((j, gap)),
        })
        .map(|(j, _)| j)
}

/// `true` when the tones of one call satisfy `set`
pub fn matches_tone_set(tones: &[Tone], set: &ToneSet) -> bool {
    let candidates = |slot: ToneType| -> Vec<usize> {
        tones
            .iter()
            .enumerate()
            .filter(|(_, t)| set.slot_matches(slot, t.frequency, t.duration))
            .map(|(i, _)| i)
            .collect()
    };

    let has_a = set.a_tone.is_some();
    let has_b = set.b_tone.is_some();

    if !has_a && !has_b {
        return set.long_tone.is_some() && !candidates(ToneType::Long).is_empty();
    }

    let a_candidates = candidates(ToneType::A);
    if has_a && a_candidates.is_empty() {
        return false;
    }
    if has_b && candidates(ToneType::B).is_empty() {
        return false;
    }
    if set.long_tone.is_some() && candidates(ToneType::Long).is_empty() {
        return false;
    }

    match (&set.a_tone, &set.b_tone) {
        (Some(_), Some(b_spec)) => a_candidates.iter().any(|&a| {
            find_paired_b(tones, a)
                .map(|b| set.frequency_matches(b_spec, tones[b].frequency))
                .unwrap_or(false)
        }),
        _ => true,
    }
}

/// Every tone set satisfied by the call, in configuration order
pub fn match_tone_sets<'a>(tones: &[Tone], tone_sets: &'a [ToneSet]) -> Vec<&'a ToneSet> {
    let matched: Vec<&ToneSet> = tone_sets
        .iter()
        .filter(|set| matches_tone_set(tones, set))
        .collect();

    log::debug!(
        "Tone set matching: {}/{} sets matched over {} tones",
        matched.len(),
        tone_sets.len(),
        tones.len()
    );

    matched
}

/// First tone set satisfied by the call
pub fn match_tone_set<'a>(tones: &[Tone], tone_sets: &'a [ToneSet]) -> Option<&'a ToneSet> {
    tone_sets.iter().find(|set| matches_tone_set(tones, set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tone_set::ToneSpec;

    fn spec(frequency: f64) -> Option<ToneSpec> {
        Some(ToneSpec {
            frequency,
            min_duration: 0.6,
            max_duration: 0.0,
        })
    }

    fn set(id: &str, a: Option<f64>, b: Option<f64>, long: Option<f64>) -> ToneSet {
        ToneSet {
            id: id.to_string(),
            label: format!("Set {}", id),
            a_tone: a.and_then(spec),
            b_tone: b.and_then(spec),
            long_tone: long.and_then(spec),
            tolerance: 10.0,
            min_duration: 0.6,
        }
    }

    fn tone(frequency: f64, start: f64, end: f64) -> Tone {
        Tone::new(frequency, start, end, ToneType::Unclassified)
    }

    #[test]
    fn test_classify_single_type() {
        let sets = vec![set("1", Some(350.0), Some(1050.0), None)];
        assert_eq!(classify_tone(352.0, 1.0, &sets), ToneType::A);
        assert_eq!(classify_tone(1048.0, 1.0, &sets), ToneType::B);
        assert_eq!(classify_tone(700.0, 1.0, &sets), ToneType::Unclassified);
    }

    #[test]
    fn test_classify_ambiguous_across_sets() {
        // 350 Hz is an A tone in one set and a B tone in another
        let sets = vec![
            set("1", Some(350.0), Some(1050.0), None),
            set("2", Some(600.0), Some(350.0), None),
        ];
        assert_eq!(
            matched_types(350.0, 1.0, &sets),
            vec![ToneType::A, ToneType::B]
        );
        assert_eq!(classify_tone(350.0, 1.0, &sets), ToneType::Unclassified);
    }

    #[test]
    fn test_classify_same_type_in_several_sets_is_not_ambiguous() {
        let sets = vec![
            set("1", Some(350.0), None, None),
            set("2", Some(355.0), None, None),
        ];
        assert_eq!(classify_tone(352.0, 1.0, &sets), ToneType::A);
    }

    #[test]
    fn test_long_only_set() {
        let s = set("L", None, None, Some(1000.0));
        assert!(matches_tone_set(&[tone(1003.0, 0.0, 3.0)], &s));
        assert!(!matches_tone_set(&[tone(1100.0, 0.0, 3.0)], &s));
        assert!(!matches_tone_set(&[], &s));
    }

    #[test]
    fn test_a_only_set() {
        let s = set("A", Some(350.0), None, None);
        assert!(matches_tone_set(&[tone(350.0, 0.0, 1.2)], &s));
        assert!(!matches_tone_set(&[tone(350.0, 0.0, 0.4)], &s));
    }

    #[test]
    fn test_two_tone_pairing_within_gap() {
        let s = set("AB", Some(350.0), Some(1050.0), None);
        let tones = vec![tone(350.0, 0.0, 1.0), tone(1050.0, 1.2, 2.2)];
        assert_eq!(find_paired_b(&tones, 0), Some(1));
        assert!(matches_tone_set(&tones, &s));
    }

    #[test]
    fn test_two_tone_gap_too_long() {
        let s = set("AB", Some(350.0), Some(1050.0), None);
        let tones = vec![tone(350.0, 0.0, 1.0), tone(1050.0, 3.0, 4.0)];
        assert_eq!(find_paired_b(&tones, 0), None);
        assert!(!matches_tone_set(&tones, &s));
    }

    #[test]
    fn test_overlapping_b_accepted_with_negative_gap() {
        let tones = vec![tone(350.0, 0.0, 1.0), tone(1050.0, 0.6, 2.0)];
        assert_eq!(find_paired_b(&tones, 0), Some(1));
    }

    #[test]
    fn test_b_ending_before_a_is_not_a_pair() {
        let tones = vec![tone(350.0, 0.0, 2.0), tone(1050.0, 1.6, 1.9)];
        assert_eq!(find_paired_b(&tones, 0), None);
    }

    #[test]
    fn test_closest_follower_must_satisfy_b() {
        // An unrelated 800 Hz tone sits closer to the A tone than the real B
        // tone; the closest follower decides the pairing, so the set fails
        let s = set("AB", Some(350.0), Some(1050.0), None);
        let tones = vec![
            tone(350.0, 0.0, 1.0),
            tone(800.0, 1.05, 2.0),
            tone(1050.0, 1.3, 2.3),
        ];
        assert_eq!(find_paired_b(&tones, 0), Some(1));
        assert!(!matches_tone_set(&tones, &s));
    }

    #[test]
    fn test_any_a_candidate_may_pair() {
        let s = set("AB", Some(350.0), Some(1050.0), None);
        let tones = vec![
            tone(350.0, 0.0, 1.0),
            tone(600.0, 1.1, 2.0),
            tone(352.0, 5.0, 6.0),
            tone(1050.0, 6.2, 7.2),
        ];
        assert!(matches_tone_set(&tones, &s));
    }

    #[test]
    fn test_match_all_vs_first() {
        let sets = vec![
            set("x", Some(700.0), None, None),
            set("1", Some(350.0), None, None),
            set("2", None, None, Some(350.0)),
        ];
        let tones = vec![tone(350.0, 0.0, 2.0)];
        let all: Vec<&str> = match_tone_sets(&tones, &sets)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(all, vec!["1", "2"]);
        assert_eq!(match_tone_set(&tones, &sets).map(|s| s.id.as_str()), Some("1"));
        assert!(match_tone_set(&[], &sets).is_none());
    }
}
