//! Notification sink and SQLite implementation.
//!
//! # Invariants
//! - Notifications are append-only; the only delete path is expiry pruning.
//! - Every stored notification expires `lifetime_ms` after creation.

use crate::model::notification::{Notification, NotificationKind};
use crate::repo::{
    bool_to_int, delete_expired_in_batches, parse_flag, parse_uuid, ExpiringTable, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    recipient_token,
    kind,
    payload,
    created_at,
    expires_at,
    is_read
FROM notifications";

/// Append-only sink for user-facing lifecycle events.
pub trait NotificationSink {
    fn create(
        &self,
        recipient_token: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
        now: i64,
    ) -> RepoResult<Notification>;
}

/// SQLite-backed notification store.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
    lifetime_ms: i64,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection, lifetime_ms: i64) -> Self {
        Self { conn, lifetime_ms }
    }

    /// Lists notifications for one recipient, newest first.
    pub fn list_for_recipient(&self, recipient_token: &str) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE recipient_token = ?1
             ORDER BY created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([recipient_token])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    /// Counts stored notifications of `kind`.
    pub fn count_by_kind(&self, kind: NotificationKind) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_expired(&self, now: i64, batch_size: u32) -> RepoResult<usize> {
        delete_expired_in_batches(self.conn, ExpiringTable::Notifications, now, batch_size)
    }
}

impl NotificationSink for SqliteNotificationRepository<'_> {
    fn create(
        &self,
        recipient_token: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
        now: i64,
    ) -> RepoResult<Notification> {
        let notification = Notification::new(
            recipient_token,
            kind,
            payload,
            now,
            now.saturating_add(self.lifetime_ms),
        );
        notification.validate()?;

        self.conn.execute(
            "INSERT INTO notifications (
                id,
                recipient_token,
                kind,
                payload,
                created_at,
                expires_at,
                is_read
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                notification.id.to_string(),
                notification.recipient_token.as_str(),
                notification.kind.as_str(),
                serde_json::to_string(&notification.payload)?,
                notification.created_at,
                notification.expires_at,
                bool_to_int(notification.read),
            ],
        )?;

        Ok(notification)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let kind_text: String = row.get("kind")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification kind `{kind_text}` in notifications.kind"
        ))
    })?;
    let payload_text: String = row.get("payload")?;

    Ok(Notification {
        id: parse_uuid(&id_text, "notifications.id")?,
        recipient_token: row.get("recipient_token")?,
        kind,
        payload: serde_json::from_str(&payload_text)?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        read: parse_flag(row.get("is_read")?, "notifications.is_read")?,
    })
}
