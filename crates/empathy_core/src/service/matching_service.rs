//! Matching pass use-case.
//!
//! # Responsibility
//! - Load candidates, plan clusters and hand each plan to [`RoomFactory`].
//! - Keep going when one plan fails; report per-pass counts.
//!
//! # Invariants
//! - A failed or discarded plan leaves its diaries unmatched for the next pass.
//! - Running the pass twice with no new diaries creates no new rooms.

use crate::config::EngineConfig;
use crate::matching::{plan_rooms, ClusterStrategy, GreedySeedStrategy};
use crate::model::room::{ChatRoom, EmpathyWord, RoomId};
use crate::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use crate::repo::RepoResult;
use crate::service::room_factory::{RoomCreation, RoomFactory};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Public summary of one created room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub empathy_words: Vec<EmpathyWord>,
    pub participant_count: usize,
    pub created_at: i64,
}

impl From<&ChatRoom> for RoomSummary {
    fn from(room: &ChatRoom) -> Self {
        Self {
            id: room.id,
            empathy_words: room.empathy_words.clone(),
            participant_count: room.participant_tokens.len(),
            created_at: room.created_at,
        }
    }
}

/// Counts and rooms produced by one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchingOutcome {
    pub candidates: usize,
    pub planned: usize,
    pub rooms: Vec<RoomSummary>,
    pub discarded: usize,
    pub failed: usize,
}

/// Runs matching passes with a configurable clustering strategy.
#[derive(Clone)]
pub struct MatchingService {
    config: EngineConfig,
    strategy: Arc<dyn ClusterStrategy>,
}

impl MatchingService {
    /// Creates a service using the greedy seed strategy.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_strategy(config, Arc::new(GreedySeedStrategy))
    }

    pub fn with_strategy(config: EngineConfig, strategy: Arc<dyn ClusterStrategy>) -> Self {
        Self { config, strategy }
    }

    pub fn room_factory(&self) -> RoomFactory {
        RoomFactory {
            max_participants: self.config.matching.max_participants,
            room_lifetime_ms: self.config.lifetimes.room_ms(),
            notification_lifetime_ms: self.config.lifetimes.notification_ms(),
        }
    }

    /// Runs one matching pass at `now`.
    ///
    /// Only candidate loading can fail the whole pass; per-room failures are
    /// logged and counted.
    pub fn run(&self, conn: &mut Connection, now: i64) -> RepoResult<MatchingOutcome> {
        let started_at = Instant::now();
        info!("event=matching_run module=matching_service status=start");

        let candidates = SqliteDiaryRepository::new(conn).list_match_candidates(now)?;
        let mut outcome = MatchingOutcome {
            candidates: candidates.len(),
            ..MatchingOutcome::default()
        };

        let plans = plan_rooms(&candidates, &self.config.matching, self.strategy.as_ref());
        outcome.planned = plans.len();
        let factory = self.room_factory();

        for plan in &plans {
            match factory.create_room(conn, plan, now) {
                Ok(RoomCreation::Created(room)) => outcome.rooms.push(RoomSummary::from(&room)),
                Ok(RoomCreation::Discarded(_)) => outcome.discarded += 1,
                Err(err) => {
                    outcome.failed += 1;
                    error!(
                        "event=room_create module=matching_service status=error members={} error={}",
                        plan.len(),
                        err
                    );
                }
            }
        }

        info!(
            "event=matching_run module=matching_service status=ok duration_ms={} candidates={} planned={} created={} discarded={} failed={}",
            started_at.elapsed().as_millis(),
            outcome.candidates,
            outcome.planned,
            outcome.rooms.len(),
            outcome.discarded,
            outcome.failed
        );
        Ok(outcome)
    }
}
