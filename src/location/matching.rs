//! Fuzzy candidate selection.
//!
//! Scores are case-insensitive similarities in [0, 100]. Two policies exist:
//! `FirstAcceptable` takes the first candidate in service order whose label
//! clears the threshold; `BestScoring` takes the highest-scoring candidate,
//! also considering alternate labels and substring matches.

use tracing::{debug, info};

use super::types::{Candidate, Coordinate};

/// How a provider picks among several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Whole-string ratio on the label; first hit over the threshold wins.
    FirstAcceptable,
    /// Max of ratio and partial ratio over all labels; global best wins.
    BestScoring,
}

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Normalised indel similarity: `200 * LCS / (|a| + |b|)`.
///
/// Case-sensitive; callers lower-case first.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best [`ratio`] of the shorter string against any window of the longer one.
///
/// Windows are every same-length slice plus the partial slices hanging off
/// either end, so a label that embeds the query scores 100.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a.len() == b.len() {
        return best_window(&a, &b).max(best_window(&b, &a));
    }
    if a.len() < b.len() {
        best_window(&a, &b)
    } else {
        best_window(&b, &a)
    }
}

fn best_window(short: &[char], long: &[char]) -> f64 {
    let (m, n) = (short.len(), long.len());
    let mut best: f64 = 0.0;

    for k in 1..m.min(n + 1) {
        best = best
            .max(ratio_chars(short, &long[..k]))
            .max(ratio_chars(short, &long[n - k..]));
    }
    for window in long.windows(m) {
        best = best.max(ratio_chars(short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// Whole-string score used by [`MatchPolicy::FirstAcceptable`].
pub fn label_score(place_name: &str, label: &str) -> f64 {
    ratio(&label.to_lowercase(), &place_name.to_lowercase())
}

/// Substring-tolerant score used by [`MatchPolicy::BestScoring`].
pub fn fuzzy_score(place_name: &str, label: &str) -> f64 {
    let (q, l) = (place_name.to_lowercase(), label.to_lowercase());
    ratio(&l, &q).max(partial_ratio(&q, &l))
}

fn candidate_score(policy: MatchPolicy, place_name: &str, candidate: &Candidate) -> Option<f64> {
    match policy {
        MatchPolicy::FirstAcceptable => {
            if candidate.label.is_empty() {
                return None;
            }
            Some(label_score(place_name, &candidate.label))
        }
        MatchPolicy::BestScoring => std::iter::once(&candidate.label)
            .chain(candidate.alt_labels.iter())
            .filter(|l| !l.is_empty())
            .map(|l| fuzzy_score(place_name, l))
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s)))),
    }
}

/// Pick a coordinate out of a provider's candidates.
///
/// `locate` extracts a candidate's coordinate; a `None` there means the
/// candidate does not count and the scan goes on. A lone candidate is
/// trusted without any similarity check.
pub fn best_match<F>(
    candidates: &[Candidate],
    place_name: &str,
    threshold: f64,
    policy: MatchPolicy,
    locate: F,
) -> Option<Coordinate>
where
    F: Fn(&Candidate) -> Option<Coordinate>,
{
    match candidates {
        [] => None,
        [only] => {
            debug!(place = place_name, label = %only.label, "single candidate, accepting without similarity check");
            locate(only)
        }
        _ => match policy {
            MatchPolicy::FirstAcceptable => first_acceptable(candidates, place_name, threshold, locate),
            MatchPolicy::BestScoring => best_scoring(candidates, place_name, threshold, locate),
        },
    }
}

fn first_acceptable<F>(
    candidates: &[Candidate],
    place_name: &str,
    threshold: f64,
    locate: F,
) -> Option<Coordinate>
where
    F: Fn(&Candidate) -> Option<Coordinate>,
{
    for candidate in candidates {
        let Some(score) = candidate_score(MatchPolicy::FirstAcceptable, place_name, candidate) else {
            continue;
        };
        debug!(place = place_name, label = %candidate.label, score, "compared candidate");
        if score < threshold {
            continue;
        }
        match locate(candidate) {
            Some(coord) => {
                info!(place = place_name, label = %candidate.label, score, "best match");
                return Some(coord);
            }
            None => debug!(place = place_name, label = %candidate.label, "matching candidate has no usable coordinate"),
        }
    }
    None
}

fn best_scoring<F>(
    candidates: &[Candidate],
    place_name: &str,
    threshold: f64,
    locate: F,
) -> Option<Coordinate>
where
    F: Fn(&Candidate) -> Option<Coordinate>,
{
    let mut qualifying: Vec<(f64, &Candidate)> = candidates
        .iter()
        .filter_map(|c| {
            let score = candidate_score(MatchPolicy::BestScoring, place_name, c)?;
            debug!(place = place_name, label = %c.label, score, "compared candidate");
            (score >= threshold).then_some((score, c))
        })
        .collect();

    // Stable sort keeps service order among equal scores.
    qualifying.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    for (score, candidate) in qualifying {
        match locate(candidate) {
            Some(coord) => {
                info!(place = place_name, label = %candidate.label, score, "best match");
                return Some(coord);
            }
            None => debug!(place = place_name, label = %candidate.label, "matching candidate has no usable coordinate"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::types::Geometry;
    use approx::assert_relative_eq;

    fn point(lat: f64, lon: f64) -> Geometry {
        Geometry::Point(Coordinate::new(lat, lon).unwrap())
    }

    fn at(lat: f64, lon: f64) -> Option<Coordinate> {
        Coordinate::new(lat, lon)
    }

    /// A scores ~94.1 against the query, B scores 100.
    fn ordered_pair() -> Vec<Candidate> {
        vec![
            Candidate::new("San Juan Baptista", point(10.0, 20.0)),
            Candidate::new("San Juan Bautista", point(30.0, 40.0)),
        ]
    }

    fn by_geometry(c: &Candidate) -> Option<Coordinate> {
        c.geometry.point()
    }

    #[test]
    fn test_ratio() {
        assert_relative_eq!(ratio("abc", "abc"), 100.0);
        assert_relative_eq!(ratio("", ""), 100.0);
        assert_relative_eq!(ratio("abc", ""), 0.0);
        assert_relative_eq!(ratio("kitten", "sitting"), 61.538, epsilon = 0.001);
        assert_relative_eq!(ratio("san juan baptista", "san juan bautista"), 94.117, epsilon = 0.001);
    }

    #[test]
    fn test_ratio_counts_chars_not_bytes() {
        assert_relative_eq!(ratio("aucara", "aucará"), 83.333, epsilon = 0.001);
    }

    #[test]
    fn test_partial_ratio() {
        assert_relative_eq!(partial_ratio("oaxaca", "oaxaca de juárez"), 100.0);
        assert_relative_eq!(partial_ratio("oaxaca de juárez", "oaxaca"), 100.0);
        assert_relative_eq!(partial_ratio("", ""), 100.0);
        assert_relative_eq!(partial_ratio("abc", ""), 0.0);
        assert!(partial_ratio("lima", "cuzco") < 50.0);
    }

    #[test]
    fn test_scores_ignore_case() {
        assert_relative_eq!(label_score("ANTEQUERA", "antequera"), 100.0);
        assert_relative_eq!(fuzzy_score("Oaxaca", "OAXACA DE JUÁREZ"), 100.0);
    }

    #[test]
    fn test_empty_set_is_absent() {
        for policy in [MatchPolicy::FirstAcceptable, MatchPolicy::BestScoring] {
            assert_eq!(best_match(&[], "Lima", 90.0, policy, by_geometry), None);
        }
    }

    #[test]
    fn test_single_candidate_trusted_regardless_of_name() {
        let only = vec![Candidate::new("Something Else Entirely", point(-14.25, -74.0833))];
        for policy in [MatchPolicy::FirstAcceptable, MatchPolicy::BestScoring] {
            assert_eq!(
                best_match(&only, "Aucará", 99.0, policy, by_geometry),
                at(-14.25, -74.0833)
            );
        }
    }

    #[test]
    fn test_first_acceptable_order_wins() {
        let result = best_match(&ordered_pair(), "San Juan Bautista", 90.0, MatchPolicy::FirstAcceptable, by_geometry);
        assert_eq!(result, at(10.0, 20.0));
    }

    #[test]
    fn test_best_scoring_score_wins() {
        let result = best_match(&ordered_pair(), "San Juan Bautista", 90.0, MatchPolicy::BestScoring, by_geometry);
        assert_eq!(result, at(30.0, 40.0));
    }

    #[test]
    fn test_raising_threshold_drops_match() {
        let candidates = ordered_pair();
        let name = "San Juan Bautista";
        assert_eq!(
            best_match(&candidates, name, 95.0, MatchPolicy::FirstAcceptable, by_geometry),
            at(30.0, 40.0)
        );

        let near_misses = vec![
            Candidate::new("San Juan Baptista", point(10.0, 20.0)),
            Candidate::new("San Juan Batista", point(30.0, 40.0)),
        ];
        for policy in [MatchPolicy::FirstAcceptable, MatchPolicy::BestScoring] {
            assert!(best_match(&near_misses, name, 90.0, policy, by_geometry).is_some());
            assert_eq!(best_match(&near_misses, name, 99.0, policy, by_geometry), None);
        }
    }

    #[test]
    fn test_first_acceptable_skips_empty_labels() {
        let candidates = vec![
            Candidate::new("", point(1.0, 1.0)),
            Candidate::new("Lima", point(-12.04, -77.04)),
        ];
        let result = best_match(&candidates, "Lima", 90.0, MatchPolicy::FirstAcceptable, by_geometry);
        assert_eq!(result, at(-12.04, -77.04));
    }

    #[test]
    fn test_first_acceptable_ignores_alt_labels() {
        let candidates = vec![
            Candidate::new("Ciudad de los Reyes", point(-12.04, -77.04)).with_alt_labels(vec!["Lima".into()]),
            Candidate::new("Callao", point(-12.05, -77.12)),
        ];
        assert_eq!(
            best_match(&candidates, "Lima", 90.0, MatchPolicy::FirstAcceptable, by_geometry),
            None
        );
    }

    #[test]
    fn test_best_scoring_uses_alt_labels() {
        let candidates = vec![
            Candidate::new("Callao", point(-12.05, -77.12)),
            Candidate::new("Ciudad de los Reyes", point(-12.04, -77.04)).with_alt_labels(vec!["Lima".into()]),
        ];
        assert_eq!(
            best_match(&candidates, "Lima", 90.0, MatchPolicy::BestScoring, by_geometry),
            at(-12.04, -77.04)
        );
    }

    #[test]
    fn test_best_scoring_accepts_embedded_name() {
        let candidates = vec![
            Candidate::new("Puebla", point(19.04, -98.2)),
            Candidate::new("Oaxaca de Juárez", point(17.06, -96.72)),
        ];
        assert_eq!(
            best_match(&candidates, "Oaxaca", 90.0, MatchPolicy::BestScoring, by_geometry),
            at(17.06, -96.72)
        );
    }

    #[test]
    fn test_best_scoring_tie_keeps_service_order() {
        let candidates = vec![
            Candidate::new("Lima", point(-12.04, -77.04)),
            Candidate::new("Lima", point(40.74, -84.1)),
        ];
        assert_eq!(
            best_match(&candidates, "Lima", 90.0, MatchPolicy::BestScoring, by_geometry),
            at(-12.04, -77.04)
        );
    }

    #[test]
    fn test_extraction_failure_continues_scan() {
        let candidates = vec![
            Candidate::new("Lima", Geometry::Missing),
            Candidate::new("Lima", point(40.74, -84.1)),
        ];
        for policy in [MatchPolicy::FirstAcceptable, MatchPolicy::BestScoring] {
            assert_eq!(best_match(&candidates, "Lima", 90.0, policy, by_geometry), at(40.74, -84.1));
        }
    }

    #[test]
    fn test_collection_with_point_member() {
        let candidates = vec![
            Candidate::new(
                "Cuicatlán",
                Geometry::Collection(vec![Geometry::Other("Polygon".into()), point(17.8, -96.96)]),
            ),
            Candidate::new("Tehuacán", point(18.46, -97.39)),
        ];
        assert_eq!(
            best_match(&candidates, "Cuicatlán", 90.0, MatchPolicy::FirstAcceptable, by_geometry),
            at(17.8, -96.96)
        );
    }

    #[test]
    fn test_collection_without_point_is_skipped() {
        let candidates = vec![
            Candidate::new(
                "Cuicatlán",
                Geometry::Collection(vec![Geometry::Other("Polygon".into())]),
            ),
            Candidate::new("Tehuacán", point(18.46, -97.39)),
        ];
        assert_eq!(
            best_match(&candidates, "Cuicatlán", 90.0, MatchPolicy::FirstAcceptable, by_geometry),
            None
        );
    }

    #[test]
    fn test_locate_only_called_after_threshold() {
        use std::cell::RefCell;
        let located = RefCell::new(Vec::new());
        let candidates = vec![
            Candidate::new("Tehuacán", point(18.46, -97.39)),
            Candidate::new("Cuicatlán", point(17.8, -96.96)),
        ];
        let result = best_match(&candidates, "Cuicatlán", 90.0, MatchPolicy::FirstAcceptable, |c| {
            located.borrow_mut().push(c.label.clone());
            c.geometry.point()
        });
        assert_eq!(result, at(17.8, -96.96));
        assert_eq!(*located.borrow(), vec!["Cuicatlán".to_string()]);
    }
}
