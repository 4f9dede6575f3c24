//! Strategies for deciding which gallery descriptor a probe matches.

use crate::types::Descriptor;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Result of matching a probe descriptor against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the selected entry, or to the closest entry when nothing matched.
    /// `f64::INFINITY` for an empty gallery.
    pub distance: f64,
    /// Gallery index of the matched entry (if any).
    pub index: Option<usize>,
}

impl MatchResult {
    fn no_match(distance: f64) -> Self {
        Self {
            matched: false,
            distance,
            index: None,
        }
    }
}

/// Strategy for comparing a probe descriptor against gallery descriptors.
pub trait Matcher {
    fn compare(&self, probe: &Descriptor, gallery: &[Descriptor], tolerance: f64) -> MatchResult;
}

/// Returns the **first** gallery entry (in load order) whose distance is within
/// tolerance, even when a later entry is closer.
///
/// This is the identification contract: registration order decides ties.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn compare(&self, probe: &Descriptor, gallery: &[Descriptor], tolerance: f64) -> MatchResult {
        let mut closest = f64::INFINITY;

        for (i, known) in gallery.iter().enumerate() {
            let distance = probe.distance(known);
            if distance <= tolerance {
                return MatchResult {
                    matched: true,
                    distance,
                    index: Some(i),
                };
            }
            closest = closest.min(distance);
        }

        MatchResult::no_match(closest)
    }
}

/// Returns the closest gallery entry if it is within tolerance.
/// Equal distances resolve to the earlier entry.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn compare(&self, probe: &Descriptor, gallery: &[Descriptor], tolerance: f64) -> MatchResult {
        let mut best_distance = f64::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, known) in gallery.iter().enumerate() {
            let distance = probe.distance(known);
            if distance < best_distance {
                best_distance = distance;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_distance <= tolerance => MatchResult {
                matched: true,
                distance: best_distance,
                index: Some(idx),
            },
            _ => MatchResult::no_match(best_distance),
        }
    }
}

/// Selectable tie-break policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// First entry within tolerance, in gallery-load order.
    #[default]
    First,
    /// Closest entry within tolerance.
    Nearest,
}

impl MatchPolicy {
    pub fn matcher(self) -> Box<dyn Matcher + Send> {
        match self {
            MatchPolicy::First => Box::new(FirstMatchMatcher),
            MatchPolicy::Nearest => Box::new(NearestMatcher),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "nearest" => Ok(MatchPolicy::Nearest),
            other => Err(format!("unknown match policy '{other}' (expected 'first' or 'nearest')")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(values: &[f64]) -> Descriptor {
        Descriptor::new(values.to_vec())
    }

    #[test]
    fn test_first_match_wins_over_closer_entry() {
        let gallery = vec![d(&[0.0, 0.0]), d(&[0.1, 0.1])];
        // Closer to entry 1, but entry 0 is within tolerance and comes first.
        let probe = d(&[0.09, 0.09]);

        let result = FirstMatchMatcher.compare(&probe, &gallery, 0.6);
        assert!(result.matched);
        assert_eq!(result.index, Some(0));
        assert!((result.distance - probe.distance(&gallery[0])).abs() < 1e-12);
    }

    #[test]
    fn test_first_match_skips_entries_outside_tolerance() {
        let gallery = vec![d(&[5.0, 5.0]), d(&[0.5, 0.0]), d(&[0.0, 0.0])];
        let probe = d(&[0.0, 0.0]);

        let result = FirstMatchMatcher.compare(&probe, &gallery, 0.6);
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let gallery = vec![d(&[3.0, 4.0])];
        let probe = d(&[0.0, 0.0]);

        assert!(FirstMatchMatcher.compare(&probe, &gallery, 5.0).matched);
        assert!(!FirstMatchMatcher.compare(&probe, &gallery, 4.999).matched);
    }

    #[test]
    fn test_first_match_no_match_reports_closest() {
        let gallery = vec![d(&[3.0, 4.0]), d(&[0.0, 2.0])];
        let probe = d(&[0.0, 0.0]);

        let result = FirstMatchMatcher.compare(&probe, &gallery, 0.6);
        assert!(!result.matched);
        assert_eq!(result.index, None);
        assert!((result.distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_gallery_never_matches() {
        let probe = d(&[0.0, 0.0]);
        let first = FirstMatchMatcher.compare(&probe, &[], 0.6);
        let nearest = NearestMatcher.compare(&probe, &[], 0.6);
        assert!(!first.matched);
        assert!(!nearest.matched);
        assert!(first.distance.is_infinite());
    }

    #[test]
    fn test_nearest_picks_closest() {
        let gallery = vec![d(&[0.0, 0.0]), d(&[0.1, 0.1])];
        let probe = d(&[0.09, 0.09]);

        let result = NearestMatcher.compare(&probe, &gallery, 0.6);
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_match_policy_parse() {
        assert_eq!("first".parse::<MatchPolicy>().unwrap(), MatchPolicy::First);
        assert_eq!(" Nearest ".parse::<MatchPolicy>().unwrap(), MatchPolicy::Nearest);
        assert!("best".parse::<MatchPolicy>().is_err());
        assert_eq!(MatchPolicy::default(), MatchPolicy::First);
    }
}
