//! Oscillation detection: exact-match and near-exact-match repetition of a
//! builder patch across iterations.

use std::collections::HashSet;

const SIMILARITY_THRESHOLD: f64 = 0.95;

/// Jaccard similarity over the set of lines in each patch.
pub fn line_similarity(a: &str, b: &str) -> f64 {
    let lines_a: HashSet<&str> = a.lines().collect();
    let lines_b: HashSet<&str> = b.lines().collect();
    if lines_a.is_empty() && lines_b.is_empty() {
        return 1.0;
    }
    let intersection = lines_a.intersection(&lines_b).count();
    let union = lines_a.union(&lines_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Whether `candidate` is a repeat of anything already in `history`: an
/// exact match against any prior patch, or near-exact (≥ 0.95 Jaccard)
/// similarity against the most recent one.
pub fn is_oscillating(candidate: &str, history: &[String]) -> bool {
    if history.iter().any(|past| past == candidate) {
        return true;
    }
    if let Some(last) = history.last() {
        if line_similarity(candidate, last) >= SIMILARITY_THRESHOLD {
            return true;
        }
    }
    false
}
