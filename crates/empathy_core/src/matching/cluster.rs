//! Similarity clustering strategies.

use super::similarity::jaccard;
use crate::model::diary::DiaryEntry;
use log::trace;

/// Splits one time group into similarity clusters.
///
/// Implementations must return disjoint clusters of at most `max_size`
/// entries each. Clusters smaller than two are allowed and dropped by the
/// caller.
pub trait ClusterStrategy: Send + Sync {
    fn cluster<'a>(
        &self,
        group: &[&'a DiaryEntry],
        threshold: f64,
        max_size: usize,
    ) -> Vec<Vec<&'a DiaryEntry>>;
}

/// Seed-ordered greedy clustering.
///
/// Each unprocessed entry becomes a seed and pulls in every later-visited
/// unprocessed entry whose similarity to the seed is `>= threshold`, until
/// the cluster reaches `max_size`. Not globally optimal; earlier seeds win
/// borderline entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySeedStrategy;

impl ClusterStrategy for GreedySeedStrategy {
    fn cluster<'a>(
        &self,
        group: &[&'a DiaryEntry],
        threshold: f64,
        max_size: usize,
    ) -> Vec<Vec<&'a DiaryEntry>> {
        let keyword_sets: Vec<_> = group.iter().map(|diary| diary.keyword_set()).collect();
        let mut processed = vec![false; group.len()];
        let mut clusters = Vec::new();

        for seed_index in 0..group.len() {
            if processed[seed_index] {
                continue;
            }
            processed[seed_index] = true;
            let mut cluster = vec![group[seed_index]];

            for index in 0..group.len() {
                if cluster.len() >= max_size {
                    break;
                }
                if processed[index] {
                    continue;
                }
                let score = jaccard(&keyword_sets[seed_index], &keyword_sets[index]);
                trace!(
                    "event=similarity module=matching seed={} other={} score={:.3}",
                    group[seed_index].id,
                    group[index].id,
                    score
                );
                if score >= threshold {
                    processed[index] = true;
                    cluster.push(group[index]);
                }
            }

            clusters.push(cluster);
        }

        clusters
    }
}
