//! Keyword-set similarity.

use crate::model::diary::DiaryEntry;
use std::collections::BTreeSet;

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`.
///
/// Returns `0.0` when either set is empty, so two empty sets never match.
pub fn jaccard(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Similarity of two diaries over their lower-cased keyword sets.
pub fn keyword_similarity(left: &DiaryEntry, right: &DiaryEntry) -> f64 {
    jaccard(&left.keyword_set(), &right.keyword_set())
}
