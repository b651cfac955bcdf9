//! Creation-time window partition.
//!
//! Single greedy pass: each unprocessed seed claims every later-or-earlier
//! unprocessed entry whose `created_at` lies within `±window_ms` of the seed.
//! This approximates connected components and depends on input order.

use crate::model::diary::DiaryEntry;

/// Groups candidates by creation-time proximity, dropping singleton groups.
pub fn partition_by_time_window(
    candidates: &[DiaryEntry],
    window_ms: i64,
) -> Vec<Vec<&DiaryEntry>> {
    let mut processed = vec![false; candidates.len()];
    let mut groups = Vec::new();

    for (seed_index, seed) in candidates.iter().enumerate() {
        if processed[seed_index] {
            continue;
        }
        processed[seed_index] = true;

        let start = seed.created_at.saturating_sub(window_ms);
        let end = seed.created_at.saturating_add(window_ms);
        let mut group = vec![seed];

        for (index, other) in candidates.iter().enumerate() {
            if processed[index] {
                continue;
            }
            if (start..=end).contains(&other.created_at) {
                processed[index] = true;
                group.push(other);
            }
        }

        if group.len() >= 2 {
            groups.push(group);
        }
    }

    groups
}
