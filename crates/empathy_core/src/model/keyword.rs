//! Weighted keywords produced by the extractor and stored per diary.

use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Upper bound of an extractor importance score.
pub const MAX_IMPORTANCE: f64 = 2.0;

/// One extracted keyword with its importance weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    /// Extractor weight in `[0, 2]`.
    pub importance_score: f64,
}

impl Keyword {
    pub fn new(word: impl Into<String>, importance_score: f64) -> Self {
        Self {
            word: word.into(),
            importance_score,
        }
    }

    /// Lower-cased form used for similarity and aggregation.
    pub fn normalized(&self) -> String {
        self.word.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.word.trim().is_empty() {
            return Err(ValidationError::BlankKeyword);
        }
        if !self.importance_score.is_finite()
            || !(0.0..=MAX_IMPORTANCE).contains(&self.importance_score)
        {
            return Err(ValidationError::ImportanceOutOfRange {
                word: self.word.clone(),
                score: self.importance_score,
            });
        }
        Ok(())
    }
}
