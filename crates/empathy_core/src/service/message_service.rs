//! Room message intake.
//!
//! # Responsibility
//! - Accept messages only from participants of an open room.
//! - Notify every other participant with `new_message`.
//!
//! # Invariants
//! - The message row and its notifications commit together or not at all.
//! - Notification payloads carry ids only, never content or sender token.

use crate::config::EngineConfig;
use crate::model::message::ChatMessage;
use crate::model::notification::NotificationKind;
use crate::model::room::RoomId;
use crate::repo::message_repo::{MessageRepository, SqliteMessageRepository};
use crate::repo::notification_repo::{NotificationSink, SqliteNotificationRepository};
use crate::repo::room_repo::{RoomRepository, SqliteRoomRepository};
use crate::repo::RepoError;
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum MessageError {
    RoomNotFound(RoomId),
    /// The room was closed or its lifetime has passed.
    RoomClosed(RoomId),
    NotParticipant(RoomId),
    Repo(RepoError),
}

impl Display for MessageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound(id) => write!(f, "room not found: {id}"),
            Self::RoomClosed(id) => write!(f, "room is closed: {id}"),
            Self::NotParticipant(id) => write!(f, "sender is not a participant of room {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MessageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MessageError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for MessageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Guarded write path for room messages.
#[derive(Debug, Clone, Copy)]
pub struct MessageService {
    message_lifetime_ms: i64,
    notification_lifetime_ms: i64,
}

impl MessageService {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            message_lifetime_ms: config.lifetimes.message_ms(),
            notification_lifetime_ms: config.lifetimes.notification_ms(),
        }
    }

    /// Stores a message from `sender_token` and notifies the other
    /// participants, inside one immediate transaction.
    pub fn send_message(
        &self,
        conn: &mut Connection,
        room_id: RoomId,
        sender_token: &str,
        content: &str,
        now: i64,
    ) -> Result<ChatMessage, MessageError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (message, recipients) = {
            let room = SqliteRoomRepository::new(&tx)
                .get_room(room_id)?
                .ok_or(MessageError::RoomNotFound(room_id))?;
            if !room.active || room.expires_at <= now {
                debug!(
                    "event=message_send module=message_service status=rejected room_id={} reason=closed",
                    room_id
                );
                return Err(MessageError::RoomClosed(room_id));
            }
            if !room.participant_tokens.iter().any(|token| token == sender_token) {
                debug!(
                    "event=message_send module=message_service status=rejected room_id={} reason=not_participant",
                    room_id
                );
                return Err(MessageError::NotParticipant(room_id));
            }

            let message = SqliteMessageRepository::new(&tx, self.message_lifetime_ms)
                .append_message(room_id, sender_token, content, now)?;

            let sink = SqliteNotificationRepository::new(&tx, self.notification_lifetime_ms);
            let payload = json!({
                "room_id": room_id,
                "message_id": message.id,
            });
            let mut recipients = 0;
            for token in room
                .participant_tokens
                .iter()
                .filter(|token| token.as_str() != sender_token)
            {
                sink.create(token, NotificationKind::NewMessage, payload.clone(), now)?;
                recipients += 1;
            }
            (message, recipients)
        };

        tx.commit()?;
        info!(
            "event=message_send module=message_service status=ok room_id={} message_id={} recipients={}",
            room_id, message.id, recipients
        );
        Ok(message)
    }
}
