//! Chat room model.
//!
//! # Invariants
//! - `participant_tokens` are distinct and count in `[2, max_participants]`.
//! - `active` flips from `true` to `false` exactly once.
//! - `empathy_words` holds at most ten entries, highest importance first.

use super::{validate_lifetime, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable identifier of a chat room.
pub type RoomId = Uuid;

/// Minimum number of distinct participants for a room.
pub const MIN_PARTICIPANTS: usize = 2;

/// Keyword shared by at least two diaries of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpathyWord {
    pub word: String,
    /// Number of diaries that carried the word.
    pub frequency: u32,
    /// Mean extractor importance across those diaries.
    pub importance_score: f64,
}

/// Ephemeral group chat created from one matched diary cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub participant_tokens: Vec<String>,
    pub empathy_words: Vec<EmpathyWord>,
    pub max_participants: usize,
    pub created_at: i64,
    pub expires_at: i64,
    pub active: bool,
}

impl ChatRoom {
    pub fn new(
        participant_tokens: Vec<String>,
        empathy_words: Vec<EmpathyWord>,
        max_participants: usize,
        created_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_tokens,
            empathy_words,
            max_participants,
            created_at,
            expires_at,
            active: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_lifetime(self.created_at, self.expires_at)?;

        let count = self.participant_tokens.len();
        if count < MIN_PARTICIPANTS || count > self.max_participants {
            return Err(ValidationError::ParticipantCount {
                count,
                max: self.max_participants,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for token in &self.participant_tokens {
            if token.trim().is_empty() {
                return Err(ValidationError::BlankToken);
            }
            if !seen.insert(token.as_str()) {
                return Err(ValidationError::DuplicateParticipant(token.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ChatRoom;
    use crate::model::ValidationError;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn validate_enforces_participant_bounds() {
        let single = ChatRoom::new(tokens(&["a"]), Vec::new(), 5, 0, 10);
        assert!(matches!(
            single.validate(),
            Err(ValidationError::ParticipantCount { count: 1, max: 5 })
        ));

        let crowded = ChatRoom::new(tokens(&["a", "b", "c"]), Vec::new(), 2, 0, 10);
        assert!(crowded.validate().is_err());

        let pair = ChatRoom::new(tokens(&["a", "b"]), Vec::new(), 2, 0, 10);
        assert!(pair.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_tokens() {
        let room = ChatRoom::new(tokens(&["a", "a"]), Vec::new(), 5, 0, 10);
        assert!(matches!(
            room.validate(),
            Err(ValidationError::DuplicateParticipant(_))
        ));
    }
}
