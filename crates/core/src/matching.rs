//! Pick the report row that best corresponds to values read off a drawing.
//!
//! Numeric evidence wins: a row scores 100 when any of its numbers lies within
//! the tolerance of any candidate number. Only when no row has numeric
//! evidence are rows ranked by fuzzy partial similarity against the raw
//! candidate strings.

use std::sync::LazyLock;

use regex::Regex;

use crate::span::MatchResult;

/// Default absolute tolerance when comparing dimensional values.
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.2;

/// Score awarded for a numeric hit.
pub const NUMERIC_MATCH_SCORE: u8 = 100;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Every integer or decimal token found in `texts`, in order of appearance.
pub fn extract_numbers<S: AsRef<str>>(texts: &[S]) -> Vec<f64> {
    texts
        .iter()
        .flat_map(|t| {
            NUMBER_RE
                .find_iter(t.as_ref())
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// The first run of ASCII digits in `text`, if any.
pub fn first_digit_run(text: &str) -> Option<&str> {
    DIGITS_RE.find(text).map(|m| m.as_str())
}

/// Fuzzy partial similarity in `0..=100`.
///
/// The shorter string is slid over every window of equal length in the longer
/// one; the best normalized Levenshtein similarity wins.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    let needle: String = short.iter().collect();
    let best = long
        .windows(short.len())
        .map(|window| {
            let window: String = window.iter().collect();
            strsim::normalized_levenshtein(&needle, &window)
        })
        .fold(0.0_f64, f64::max);

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

fn has_numeric_hit(candidates: &[f64], row_numbers: &[f64], tolerance: f64) -> bool {
    candidates
        .iter()
        .any(|c| row_numbers.iter().any(|r| (c - r).abs() <= tolerance))
}

/// Index and score of the highest-scoring row; the first row wins ties.
fn pick_best(scores: impl Iterator<Item = u8>) -> Option<(usize, u8)> {
    let mut best: Option<(usize, u8)> = None;
    for (index, score) in scores.enumerate() {
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best
}

/// Select the row most likely to hold the candidate values.
///
/// Returns `None` only when `rows` is empty.
pub fn best_match<C, R>(candidates: &[C], rows: &[R], tolerance: f64) -> Option<MatchResult>
where
    C: AsRef<str>,
    R: AsRef<str>,
{
    let candidate_numbers = extract_numbers(candidates);

    let numeric_scores: Vec<u8> = rows
        .iter()
        .map(|row| {
            let row_numbers = extract_numbers(&[row.as_ref()]);
            if has_numeric_hit(&candidate_numbers, &row_numbers, tolerance) {
                NUMERIC_MATCH_SCORE
            } else {
                0
            }
        })
        .collect();

    let numeric = numeric_scores.iter().any(|&s| s > 0);
    let (index, score) = if numeric {
        pick_best(numeric_scores.into_iter())?
    } else {
        pick_best(rows.iter().map(|row| {
            candidates
                .iter()
                .map(|c| partial_ratio(c.as_ref(), row.as_ref()))
                .max()
                .unwrap_or(0)
        }))?
    };

    Some(MatchResult {
        row: rows[index].as_ref().to_string(),
        index,
        score,
        numeric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // extract_numbers tests
    // ============================================================================

    #[test]
    fn test_extract_numbers_integers_and_decimals() {
        assert_eq!(
            extract_numbers(&["Ø14.76 ±0.1", "R5", "no digits"]),
            vec![14.76, 0.1, 5.0]
        );
    }

    #[test]
    fn test_extract_numbers_trailing_dot_is_integer() {
        assert_eq!(extract_numbers(&["12."]), vec![12.0]);
    }

    #[test]
    fn test_first_digit_run() {
        assert_eq!(first_digit_run("Balloon 12a-3"), Some("12"));
        assert_eq!(first_digit_run("none"), None);
    }

    // ============================================================================
    // partial_ratio tests
    // ============================================================================

    #[test]
    fn test_partial_ratio_substring_is_perfect() {
        assert_eq!(partial_ratio("THREAD", "1 | M6 THREAD | 6.00"), 100);
    }

    #[test]
    fn test_partial_ratio_is_symmetric() {
        assert_eq!(
            partial_ratio("chamfer", "2 | CHAMFER 45"),
            partial_ratio("2 | CHAMFER 45", "chamfer")
        );
    }

    #[test]
    fn test_partial_ratio_empty_inputs() {
        assert_eq!(partial_ratio("", ""), 100);
        assert_eq!(partial_ratio("", "abc"), 0);
    }

    #[test]
    fn test_partial_ratio_is_bounded() {
        let score = partial_ratio("xyz", "abcdef");
        assert!(score <= 100);
        assert!(score < 50);
    }

    // ============================================================================
    // best_match tests
    // ============================================================================

    #[test]
    fn test_best_match_numeric_within_tolerance() {
        let rows = ["1 | Length | 20.00", "2 | Width | 14.80"];
        let result = best_match(&["14.76"], &rows, 0.2).unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.score, 100);
        assert!(result.numeric);
        assert_eq!(result.row, "2 | Width | 14.80");
    }

    #[test]
    fn test_best_match_falls_back_to_fuzzy() {
        let rows = ["Length 20.00"];
        let result = best_match(&["14.76"], &rows, 0.2).unwrap();
        assert!(!result.numeric);
        assert!(result.score < 100);
        assert_eq!(result.index, 0);
    }

    #[test]
    fn test_best_match_fuzzy_prefers_closest_text() {
        let rows = ["Overall length", "Hole diameter", "Surface finish"];
        let result = best_match(&["diameter"], &rows, 0.2).unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.score, 100);
        assert!(!result.numeric);
    }

    #[test]
    fn test_best_match_ties_keep_first_row() {
        let rows = ["A 10.0", "B 10.1"];
        let result = best_match(&["10.05"], &rows, 0.2).unwrap();
        assert_eq!(result.index, 0);
    }

    #[test]
    fn test_best_match_numeric_beats_fuzzy() {
        let rows = ["diameter 3.00", "other 7.70"];
        let result = best_match(&["diameter", "7.72"], &rows, 0.2).unwrap();
        assert_eq!(result.index, 1);
        assert!(result.numeric);
    }

    #[test]
    fn test_best_match_tolerance_boundary() {
        let rows = ["5.5"];
        assert!(best_match(&["5.0"], &rows, 0.5).unwrap().numeric);
        assert!(!best_match(&["5.0"], &rows, 0.4).unwrap().numeric);
    }

    #[test]
    fn test_best_match_empty_rows() {
        let rows: [&str; 0] = [];
        assert!(best_match(&["1.0"], &rows, 0.2).is_none());
    }

    #[test]
    fn test_best_match_no_candidates_scores_zero() {
        let candidates: [&str; 0] = [];
        let result = best_match(&candidates, &["row"], 0.2).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.index, 0);
    }
}
