//! Room lifecycle supervision and expiry pruning.
//!
//! # Responsibility
//! - Warn participants of rooms that close within the lead time.
//! - Close expired rooms and notify participants.
//! - Prune expired messages, notifications and diaries.
//!
//! # Invariants
//! - A room's `active` flip and its `room_closed` notifications commit in
//!   one transaction; a room already closed is never closed or notified again.
//! - A failure on one room does not stop the scan for the others.
//! - Warnings are re-evaluated each scan; a room inside the lead window is
//!   warned again on every scan.

use crate::config::EngineConfig;
use crate::model::notification::NotificationKind;
use crate::model::room::ChatRoom;
use crate::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use crate::repo::message_repo::{MessageRepository, SqliteMessageRepository};
use crate::repo::notification_repo::{NotificationSink, SqliteNotificationRepository};
use crate::repo::room_repo::{RoomRepository, SqliteRoomRepository};
use crate::repo::{RepoError, RepoResult};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

/// Outcome of one warning scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningReport {
    pub rooms_warned: usize,
    pub notifications_sent: usize,
    pub failed: usize,
}

/// Outcome of one expiry scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub rooms_closed: usize,
    pub notifications_sent: usize,
    pub failed: usize,
}

/// Outcome of one cleanup pass (expiry scan plus all pruning).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub rooms_closed: usize,
    pub messages_deleted: usize,
    pub notifications_deleted: usize,
    pub diaries_deleted: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.rooms_closed + self.messages_deleted + self.notifications_deleted + self.diaries_deleted
    }
}

/// Lifecycle scans bound to configured lifetimes.
#[derive(Debug, Clone)]
pub struct LifecycleService {
    warning_lead_ms: i64,
    notification_lifetime_ms: i64,
    message_lifetime_ms: i64,
    batch_size: u32,
}

impl LifecycleService {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            warning_lead_ms: config.lifetimes.warning_lead_ms(),
            notification_lifetime_ms: config.lifetimes.notification_ms(),
            message_lifetime_ms: config.lifetimes.message_ms(),
            batch_size: config.storage.prune_batch_size,
        }
    }

    /// Sends `room_expiry_warning` to every participant of each active room
    /// with `0 < expires_at - now <= lead`.
    pub fn warn_expiring(&self, conn: &mut Connection, now: i64) -> RepoResult<WarningReport> {
        let rooms = SqliteRoomRepository::new(conn)
            .list_active_expiring(now, now.saturating_add(self.warning_lead_ms))?;
        let mut report = WarningReport::default();

        for room in &rooms {
            match self.notify_room(conn, room, NotificationKind::RoomExpiryWarning, now) {
                Ok(sent) => {
                    report.rooms_warned += 1;
                    report.notifications_sent += sent;
                }
                Err(err) => {
                    report.failed += 1;
                    error!(
                        "event=room_warning module=lifecycle status=error room_id={} error={}",
                        room.id, err
                    );
                }
            }
        }

        info!(
            "event=room_warning module=lifecycle status=ok rooms={} notifications={} failed={}",
            report.rooms_warned, report.notifications_sent, report.failed
        );
        Ok(report)
    }

    /// Closes every active room with `expires_at <= now`.
    pub fn close_expired(&self, conn: &mut Connection, now: i64) -> RepoResult<ExpiryReport> {
        let rooms = SqliteRoomRepository::new(conn).list_active_expired(now)?;
        let mut report = ExpiryReport::default();

        for room in &rooms {
            match self.close_room(conn, room, now) {
                Ok(Some(sent)) => {
                    report.rooms_closed += 1;
                    report.notifications_sent += sent;
                }
                // Closed by a concurrent scan after we listed it.
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    error!(
                        "event=room_close module=lifecycle status=error room_id={} error={}",
                        room.id, err
                    );
                }
            }
        }

        info!(
            "event=room_close module=lifecycle status=ok closed={} notifications={} failed={}",
            report.rooms_closed, report.notifications_sent, report.failed
        );
        Ok(report)
    }

    pub fn prune_messages(&self, conn: &Connection, now: i64) -> RepoResult<usize> {
        SqliteMessageRepository::new(conn, self.message_lifetime_ms)
            .delete_expired(now, self.batch_size)
    }

    pub fn prune_notifications(&self, conn: &Connection, now: i64) -> RepoResult<usize> {
        SqliteNotificationRepository::new(conn, self.notification_lifetime_ms)
            .delete_expired(now, self.batch_size)
    }

    /// Deletes expired diaries whether or not they were matched.
    pub fn prune_diaries(&self, conn: &Connection, now: i64) -> RepoResult<usize> {
        SqliteDiaryRepository::new(conn).delete_expired(now, self.batch_size)
    }

    /// Runs the expiry scan followed by all pruning steps.
    ///
    /// Each step commits independently; an error in one step is logged and
    /// the remaining steps still run. The first error is returned after all
    /// steps were attempted.
    pub fn cleanup(&self, conn: &mut Connection, now: i64) -> RepoResult<CleanupReport> {
        let started_at = Instant::now();
        let mut report = CleanupReport::default();
        let mut first_error: Option<RepoError> = None;

        match self.close_expired(conn, now) {
            Ok(expiry) => report.rooms_closed = expiry.rooms_closed,
            Err(err) => record_step_error("rooms", err, &mut first_error),
        }
        match self.prune_messages(conn, now) {
            Ok(count) => report.messages_deleted = count,
            Err(err) => record_step_error("messages", err, &mut first_error),
        }
        match self.prune_notifications(conn, now) {
            Ok(count) => report.notifications_deleted = count,
            Err(err) => record_step_error("notifications", err, &mut first_error),
        }
        match self.prune_diaries(conn, now) {
            Ok(count) => report.diaries_deleted = count,
            Err(err) => record_step_error("diaries", err, &mut first_error),
        }

        info!(
            "event=cleanup module=lifecycle status={} duration_ms={} rooms={} messages={} notifications={} diaries={}",
            if first_error.is_some() { "partial" } else { "ok" },
            started_at.elapsed().as_millis(),
            report.rooms_closed,
            report.messages_deleted,
            report.notifications_deleted,
            report.diaries_deleted
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    fn notify_room(
        &self,
        conn: &mut Connection,
        room: &ChatRoom,
        kind: NotificationKind,
        now: i64,
    ) -> RepoResult<usize> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sent = {
            let sink = SqliteNotificationRepository::new(&tx, self.notification_lifetime_ms);
            let payload = json!({
                "room_id": room.id,
                "expires_at": room.expires_at,
            });
            for token in &room.participant_tokens {
                sink.create(token, kind, payload.clone(), now)?;
            }
            room.participant_tokens.len()
        };
        tx.commit()?;
        Ok(sent)
    }

    /// Returns `None` when the room was no longer active.
    fn close_room(
        &self,
        conn: &mut Connection,
        room: &ChatRoom,
        now: i64,
    ) -> RepoResult<Option<usize>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sent = {
            if !SqliteRoomRepository::new(&tx).deactivate(room.id)? {
                return Ok(None);
            }
            let sink = SqliteNotificationRepository::new(&tx, self.notification_lifetime_ms);
            let payload = json!({
                "room_id": room.id,
                "empathy_words": room.empathy_words,
            });
            for token in &room.participant_tokens {
                sink.create(token, NotificationKind::RoomClosed, payload.clone(), now)?;
            }
            room.participant_tokens.len()
        };
        tx.commit()?;
        Ok(Some(sent))
    }
}

fn record_step_error(step: &str, err: RepoError, first_error: &mut Option<RepoError>) {
    error!(
        "event=cleanup module=lifecycle status=error step={} error={}",
        step, err
    );
    first_error.get_or_insert(err);
}
