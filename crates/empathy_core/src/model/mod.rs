//! Domain model for diaries, rooms, messages and notifications.
//!
//! # Responsibility
//! - Define the flat records shared by matching and lifecycle pipelines.
//! - Keep structural invariants checkable before persistence.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Records reference each other by id only; there are no back-pointers.
//! - All timestamps are Unix epoch milliseconds.

pub mod diary;
pub mod keyword;
pub mod message;
pub mod notification;
pub mod room;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Structural validation failures for model records.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `expires_at` must be strictly after `created_at`.
    ExpiryNotAfterCreation { created_at: i64, expires_at: i64 },
    /// Keyword importance must be finite and within `[0, 2]`.
    ImportanceOutOfRange { word: String, score: f64 },
    /// Keyword text is blank after trim.
    BlankKeyword,
    /// Room participant count is outside `[2, max_participants]`.
    ParticipantCount { count: usize, max: usize },
    /// The same token appears twice in one room.
    DuplicateParticipant(String),
    /// Token is blank after trim.
    BlankToken,
    BlankMessage,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpiryNotAfterCreation {
                created_at,
                expires_at,
            } => write!(
                f,
                "expires_at ({expires_at}) must be later than created_at ({created_at})"
            ),
            Self::ImportanceOutOfRange { word, score } => {
                write!(f, "importance score {score} for `{word}` is outside [0, 2]")
            }
            Self::BlankKeyword => write!(f, "keyword must not be blank"),
            Self::ParticipantCount { count, max } => {
                write!(f, "room must have between 2 and {max} participants, got {count}")
            }
            Self::DuplicateParticipant(_) => write!(f, "room participant tokens must be distinct"),
            Self::BlankToken => write!(f, "token must not be blank"),
            Self::BlankMessage => write!(f, "message content must not be blank"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn validate_lifetime(created_at: i64, expires_at: i64) -> Result<(), ValidationError> {
    if expires_at <= created_at {
        return Err(ValidationError::ExpiryNotAfterCreation {
            created_at,
            expires_at,
        });
    }
    Ok(())
}
