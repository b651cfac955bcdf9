//! Chat message storage.
//!
//! Raw storage only: room state and membership are checked by
//! `MessageService`, which is the write path callers use.

use crate::model::message::ChatMessage;
use crate::model::room::RoomId;
use crate::repo::{delete_expired_in_batches, parse_uuid, ExpiringTable, RepoResult};
use rusqlite::{params, Connection};

pub trait MessageRepository {
    fn append_message(
        &self,
        room_id: RoomId,
        sender_token: &str,
        content: &str,
        now: i64,
    ) -> RepoResult<ChatMessage>;
    fn list_room_messages(&self, room_id: RoomId) -> RepoResult<Vec<ChatMessage>>;
    fn delete_expired(&self, now: i64, batch_size: u32) -> RepoResult<usize>;
}

/// SQLite-backed message store.
pub struct SqliteMessageRepository<'conn> {
    conn: &'conn Connection,
    lifetime_ms: i64,
}

impl<'conn> SqliteMessageRepository<'conn> {
    pub fn new(conn: &'conn Connection, lifetime_ms: i64) -> Self {
        Self { conn, lifetime_ms }
    }
}

impl MessageRepository for SqliteMessageRepository<'_> {
    fn append_message(
        &self,
        room_id: RoomId,
        sender_token: &str,
        content: &str,
        now: i64,
    ) -> RepoResult<ChatMessage> {
        let message = ChatMessage::new(
            room_id,
            sender_token,
            content,
            now,
            now.saturating_add(self.lifetime_ms),
        );
        message.validate()?;

        self.conn.execute(
            "INSERT INTO chat_messages (
                id,
                room_id,
                sender_token,
                content,
                created_at,
                expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                message.id.to_string(),
                message.room_id.to_string(),
                message.sender_token.as_str(),
                message.content.as_str(),
                message.created_at,
                message.expires_at,
            ],
        )?;

        Ok(message)
    }

    fn list_room_messages(&self, room_id: RoomId) -> RepoResult<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_id, sender_token, content, created_at, expires_at
             FROM chat_messages
             WHERE room_id = ?1
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([room_id.to_string()])?;
        let mut messages = Vec::new();

        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let room_text: String = row.get("room_id")?;
            messages.push(ChatMessage {
                id: parse_uuid(&id_text, "chat_messages.id")?,
                room_id: parse_uuid(&room_text, "chat_messages.room_id")?,
                sender_token: row.get("sender_token")?,
                content: row.get("content")?,
                created_at: row.get("created_at")?,
                expires_at: row.get("expires_at")?,
            });
        }

        Ok(messages)
    }

    fn delete_expired(&self, now: i64, batch_size: u32) -> RepoResult<usize> {
        delete_expired_in_batches(self.conn, ExpiringTable::Messages, now, batch_size)
    }
}
