//! Matching engine: time-window partition, keyword similarity and clustering.
//!
//! # Responsibility
//! - Turn a candidate list into room plans without touching storage.
//! - Keep the clustering step swappable behind [`ClusterStrategy`].
//!
//! # Invariants
//! - Every plan holds between 2 and `max_participants` distinct diaries.
//! - A diary appears in at most one plan per pass.
//! - Output depends on candidate order; callers pass a stable order.

pub mod cluster;
pub mod empathy;
pub mod similarity;
pub mod window;

pub use cluster::{ClusterStrategy, GreedySeedStrategy};
pub use empathy::{aggregate_words, common_empathy_words, rank_by_frequency};
pub use similarity::{jaccard, keyword_similarity};
pub use window::partition_by_time_window;

use crate::config::MatchingConfig;
use crate::model::diary::DiaryEntry;
use crate::model::room::MIN_PARTICIPANTS;
use log::debug;

/// Diaries selected to share one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPlan {
    pub members: Vec<DiaryEntry>,
}

impl RoomPlan {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Plans rooms for one matching pass.
///
/// Candidates are expected to be unmatched, unexpired and keyword-bearing;
/// entries with empty keyword sets never reach the similarity threshold
/// unless it is zero.
pub fn plan_rooms(
    candidates: &[DiaryEntry],
    config: &MatchingConfig,
    strategy: &dyn ClusterStrategy,
) -> Vec<RoomPlan> {
    let max = config.max_participants;
    let time_groups = partition_by_time_window(candidates, config.time_window_ms());
    debug!(
        "event=plan_rooms module=matching status=partitioned candidates={} time_groups={}",
        candidates.len(),
        time_groups.len()
    );

    let mut plans = Vec::new();
    for group in time_groups {
        for cluster in strategy.cluster(&group, config.similarity_threshold, max) {
            if (MIN_PARTICIPANTS..=max).contains(&cluster.len()) {
                plans.push(RoomPlan {
                    members: cluster.into_iter().cloned().collect(),
                });
            }
        }
    }
    plans
}
