//! Diary entry model.
//!
//! # Responsibility
//! - Define the anonymous, short-lived diary record consumed by matching.
//! - Expose the lower-cased keyword set used for similarity.
//!
//! # Invariants
//! - `matched` only ever flips from `false` to `true`.
//! - `expires_at` is strictly later than `created_at`.
//! - A diary without an owner token can never join a room.

use super::keyword::Keyword;
use super::{validate_lifetime, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier of a diary entry.
pub type DiaryId = Uuid;

/// Anonymous diary record with extracted keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: DiaryId,
    /// Anonymous author token; `None` when the issuing layer dropped it.
    pub owner_token: Option<String>,
    pub keywords: Vec<Keyword>,
    pub created_at: i64,
    pub expires_at: i64,
    pub matched: bool,
}

impl DiaryEntry {
    /// Creates an unmatched diary with a generated id.
    pub fn new(
        owner_token: Option<String>,
        keywords: Vec<Keyword>,
        created_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_token,
            keywords,
            created_at,
            expires_at,
            matched: false,
        }
    }

    /// Lower-cased, de-duplicated keyword strings.
    pub fn keyword_set(&self) -> BTreeSet<String> {
        self.keywords.iter().map(Keyword::normalized).collect()
    }

    /// Owner token with blank values treated as missing.
    pub fn owner(&self) -> Option<&str> {
        self.owner_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_lifetime(self.created_at, self.expires_at)?;
        for keyword in &self.keywords {
            keyword.validate()?;
        }
        Ok(())
    }
}
