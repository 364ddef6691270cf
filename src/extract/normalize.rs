// src/extract/normalize.rs
//! Final dedup + truncate. First occurrence of a value wins.

use std::collections::HashSet;

use crate::candidate::NumericCandidate;

/// Default cap on returned candidates.
pub const DEFAULT_LIMIT: usize = 15;

/// Deduplicated, truncated candidates with the `numbers` projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub numbers: Vec<String>,
    pub detailed: Vec<NumericCandidate>,
    /// Distinct values seen before truncation.
    pub unique_total: usize,
}

/// Drop later occurrences of an already seen value, keeping order.
pub fn dedup_candidates(
    candidates: impl IntoIterator<Item = NumericCandidate>,
) -> Vec<NumericCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.value().to_string()))
        .collect()
}

pub fn normalize(
    candidates: impl IntoIterator<Item = NumericCandidate>,
    limit: usize,
) -> Normalized {
    let mut detailed = dedup_candidates(candidates);
    let unique_total = detailed.len();
    detailed.truncate(limit);
    Normalized {
        numbers: detailed.iter().map(|c| c.value().to_string()).collect(),
        detailed,
        unique_total,
    }
}
