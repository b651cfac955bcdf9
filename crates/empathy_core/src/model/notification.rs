//! User-facing notification records.
//!
//! # Invariants
//! - `expires_at` is strictly later than `created_at`.
//! - Notifications are append-only; they are removed only by expiry pruning.

use super::{validate_lifetime, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// Category of a lifecycle event delivered to one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A room was opened for the recipient's diary.
    MatchingSuccess,
    /// The recipient's room closes within the warning lead time.
    RoomExpiryWarning,
    /// The recipient's room has been closed.
    RoomClosed,
    /// Another participant posted in the recipient's room.
    NewMessage,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MatchingSuccess => "matching_success",
            Self::RoomExpiryWarning => "room_expiry_warning",
            Self::RoomClosed => "room_closed",
            Self::NewMessage => "new_message",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "matching_success" => Some(Self::MatchingSuccess),
            "room_expiry_warning" => Some(Self::RoomExpiryWarning),
            "room_closed" => Some(Self::RoomClosed),
            "new_message" => Some(Self::NewMessage),
            _ => None,
        }
    }
}

/// Durable notification addressed to one anonymous token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_token: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub expires_at: i64,
    pub read: bool,
}

impl Notification {
    pub fn new(
        recipient_token: impl Into<String>,
        kind: NotificationKind,
        payload: serde_json::Value,
        created_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_token: recipient_token.into(),
            kind,
            payload,
            created_at,
            expires_at,
            read: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.recipient_token.trim().is_empty() {
            return Err(ValidationError::BlankToken);
        }
        validate_lifetime(self.created_at, self.expires_at)
    }
}
