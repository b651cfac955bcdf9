//! Chat message records.

use super::room::RoomId;
use super::{validate_lifetime, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

/// One message posted in a room. Expires independently of its room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_token: String,
    pub content: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl ChatMessage {
    pub fn new(
        room_id: RoomId,
        sender_token: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            sender_token: sender_token.into(),
            content: content.into(),
            created_at,
            expires_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender_token.trim().is_empty() {
            return Err(ValidationError::BlankToken);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::BlankMessage);
        }
        validate_lifetime(self.created_at, self.expires_at)
    }
}
