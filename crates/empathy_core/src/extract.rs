//! Keyword extraction contract.
//!
//! The extraction model lives outside this crate. Callers plug it in through
//! [`KeywordExtractor`]; the core only relies on the weighted output.

use crate::model::keyword::{Keyword, MAX_IMPORTANCE};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Extraction failure reported by an external model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The model could not be reached or loaded.
    Unavailable(String),
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "keyword extraction unavailable: {message}"),
        }
    }
}

impl Error for ExtractionError {}

/// Produces weighted keywords for one diary text.
pub trait KeywordExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<Keyword>, ExtractionError>;
}

/// Runs the extractor and degrades any failure to an empty keyword list.
///
/// Output is cleaned so it always passes `Keyword::validate()`: blank words
/// are dropped and scores are clamped into `[0, 2]`.
pub fn extract_or_empty(extractor: &dyn KeywordExtractor, text: &str) -> Vec<Keyword> {
    match extractor.extract(text) {
        Ok(keywords) => keywords
            .into_iter()
            .filter(|keyword| !keyword.word.trim().is_empty())
            .map(|keyword| Keyword {
                word: keyword.word.trim().to_string(),
                importance_score: clamp_importance(keyword.importance_score),
            })
            .collect(),
        Err(err) => {
            warn!(
                "event=keyword_extract module=extract status=degraded error={}",
                err
            );
            Vec::new()
        }
    }
}

fn clamp_importance(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, MAX_IMPORTANCE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_or_empty, ExtractionError, KeywordExtractor};
    use crate::model::keyword::Keyword;

    struct Failing;

    impl KeywordExtractor for Failing {
        fn extract(&self, _text: &str) -> Result<Vec<Keyword>, ExtractionError> {
            Err(ExtractionError::Unavailable("model not loaded".to_string()))
        }
    }

    struct Noisy;

    impl KeywordExtractor for Noisy {
        fn extract(&self, _text: &str) -> Result<Vec<Keyword>, ExtractionError> {
            Ok(vec![
                Keyword::new(" rain ", 3.5),
                Keyword::new("", 1.0),
                Keyword::new("tea", f64::NAN),
            ])
        }
    }

    #[test]
    fn failure_degrades_to_empty_list() {
        assert!(extract_or_empty(&Failing, "anything").is_empty());
    }

    #[test]
    fn output_is_cleaned_into_valid_keywords() {
        let keywords = extract_or_empty(&Noisy, "anything");
        assert_eq!(
            keywords,
            vec![Keyword::new("rain", 2.0), Keyword::new("tea", 0.0)]
        );
    }
}
