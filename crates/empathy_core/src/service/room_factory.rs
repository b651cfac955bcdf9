//! Room creation from one planned diary cluster.
//!
//! # Responsibility
//! - Convert a [`RoomPlan`] into a persisted [`ChatRoom`].
//! - Flip member diaries to matched in the same transaction.
//! - Emit one `matching_success` notification per participant.
//!
//! # Invariants
//! - A committed room always has every participant's diary matched.
//! - A diary is never left matched without a committed room.
//! - Every diary of a created room is matched, including ownerless ones;
//!   ownerless diaries of a discarded cluster stay unmatched.
//! - A diary matched by a concurrent run is dropped from the cluster, never
//!   shared between two rooms.

use crate::matching::{common_empathy_words, RoomPlan};
use crate::model::diary::DiaryEntry;
use crate::model::notification::NotificationKind;
use crate::model::room::{ChatRoom, MIN_PARTICIPANTS};
use crate::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use crate::repo::notification_repo::{NotificationSink, SqliteNotificationRepository};
use crate::repo::room_repo::{RoomMember, RoomRepository, SqliteRoomRepository};
use crate::repo::RepoError;
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persistence failure while creating one room. The room's writes are
/// rolled back and its diaries stay unmatched.
#[derive(Debug)]
pub struct RoomCreationError(pub RepoError);

impl Display for RoomCreationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "room creation failed: {}", self.0)
    }
}

impl Error for RoomCreationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<RepoError> for RoomCreationError {
    fn from(value: RepoError) -> Self {
        Self(value)
    }
}

impl From<rusqlite::Error> for RoomCreationError {
    fn from(value: rusqlite::Error) -> Self {
        Self(value.into())
    }
}

/// Why a plan did not become a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Fewer than two distinct owner tokens remained after dropping
    /// token-less and concurrently matched diaries.
    TooFewParticipants { distinct: usize, conflicts: usize },
}

/// Result of one creation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCreation {
    Created(ChatRoom),
    Discarded(DiscardReason),
}

/// Creates rooms with configured bounds and lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct RoomFactory {
    pub max_participants: usize,
    pub room_lifetime_ms: i64,
    pub notification_lifetime_ms: i64,
}

impl RoomFactory {
    /// Creates one room inside an immediate transaction.
    ///
    /// `Discarded` means nothing was written. `Err` means the transaction was
    /// rolled back.
    pub fn create_room(
        &self,
        conn: &mut Connection,
        plan: &RoomPlan,
        now: i64,
    ) -> Result<RoomCreation, RoomCreationError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let diaries = SqliteDiaryRepository::new(&tx);
        let mut claimed = claim_members(&diaries, &plan.members, now)?;

        if claimed.members.len() < MIN_PARTICIPANTS {
            debug!(
                "event=room_create module=room_factory status=discarded distinct={} conflicts={}",
                claimed.members.len(),
                claimed.conflicts
            );
            return Ok(RoomCreation::Discarded(DiscardReason::TooFewParticipants {
                distinct: claimed.members.len(),
                conflicts: claimed.conflicts,
            }));
        }
        claim_ownerless(&diaries, &plan.members, now, &mut claimed)?;

        let room = ChatRoom::new(
            claimed.members.iter().map(|member| member.token.clone()).collect(),
            common_empathy_words(&claimed.diaries),
            self.max_participants,
            now,
            now.saturating_add(self.room_lifetime_ms),
        );

        {
            let rooms = SqliteRoomRepository::new(&tx);
            rooms.insert_room(&room, &claimed.members)?;

            let sink = SqliteNotificationRepository::new(&tx, self.notification_lifetime_ms);
            let payload = json!({
                "room_id": room.id,
                "empathy_words": room.empathy_words,
                "participants_count": room.participant_tokens.len(),
            });
            for token in &room.participant_tokens {
                sink.create(token, NotificationKind::MatchingSuccess, payload.clone(), now)?;
            }
        }

        tx.commit()?;
        info!(
            "event=room_create module=room_factory status=ok room_id={} participants={} words={} conflicts={}",
            room.id,
            room.participant_tokens.len(),
            room.empathy_words.len(),
            claimed.conflicts
        );
        Ok(RoomCreation::Created(room))
    }
}

struct ClaimedMembers {
    members: Vec<RoomMember>,
    diaries: Vec<DiaryEntry>,
    conflicts: usize,
}

/// Flips ownerless cluster members once the room is known to go ahead.
///
/// They add no participant but still count toward the room's words.
fn claim_ownerless(
    diaries: &dyn DiaryRepository,
    plan_members: &[DiaryEntry],
    now: i64,
    claimed: &mut ClaimedMembers,
) -> Result<(), RepoError> {
    for diary in plan_members.iter().filter(|diary| diary.owner().is_none()) {
        if diaries.mark_matched(diary.id, now)? {
            claimed.diaries.push(diary.clone());
        } else {
            claimed.conflicts += 1;
        }
    }
    Ok(())
}

/// Flips each token-bearing diary to matched and keeps the winners.
///
/// A second diary from an already-seen token is matched too (its owner is
/// in the room) but adds no participant row.
fn claim_members(
    diaries: &dyn DiaryRepository,
    plan_members: &[DiaryEntry],
    now: i64,
) -> Result<ClaimedMembers, RepoError> {
    let mut seen_tokens = HashSet::new();
    let mut claimed = ClaimedMembers {
        members: Vec::new(),
        diaries: Vec::new(),
        conflicts: 0,
    };

    for diary in plan_members {
        let Some(token) = diary.owner() else {
            continue;
        };
        if !diaries.mark_matched(diary.id, now)? {
            claimed.conflicts += 1;
            continue;
        }
        claimed.diaries.push(diary.clone());
        if seen_tokens.insert(token.to_string()) {
            claimed.members.push(RoomMember {
                token: token.to_string(),
                diary_id: Some(diary.id),
            });
        }
    }

    Ok(claimed)
}
