//! Diary intake and daily empathy-word digest.
//!
//! # Responsibility
//! - Attach extracted keywords and lifetime to new diaries.
//! - Summarize today's keywords across all diaries.
//!
//! # Invariants
//! - Extraction failure never blocks diary storage; it yields no keywords.
//! - The service never touches the `matched` flag.

use crate::extract::{extract_or_empty, KeywordExtractor};
use crate::matching::{aggregate_words, rank_by_frequency};
use crate::model::diary::DiaryEntry;
use crate::model::room::EmpathyWord;
use crate::model::DAY_MS;
use crate::repo::diary_repo::DiaryRepository;
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

/// Maximum words returned by the daily digest.
pub const DIGEST_WORD_LIMIT: usize = 20;

/// Use-case service for diary intake.
pub struct DiaryService<R: DiaryRepository> {
    repo: R,
    extractor: Arc<dyn KeywordExtractor>,
    lifetime_ms: i64,
}

impl<R: DiaryRepository> DiaryService<R> {
    pub fn new(repo: R, extractor: Arc<dyn KeywordExtractor>, lifetime_ms: i64) -> Self {
        Self {
            repo,
            extractor,
            lifetime_ms,
        }
    }

    /// Extracts keywords from `text` and stores a new unmatched diary.
    ///
    /// The text itself is not persisted by the core.
    pub fn submit_diary(
        &self,
        owner_token: Option<String>,
        text: &str,
        now: i64,
    ) -> RepoResult<DiaryEntry> {
        let keywords = extract_or_empty(self.extractor.as_ref(), text);
        let diary = DiaryEntry::new(
            owner_token,
            keywords,
            now,
            now.saturating_add(self.lifetime_ms),
        );
        self.repo.create_diary(&diary)?;

        info!(
            "event=diary_submit module=diary_service status=ok diary_id={} keywords={}",
            diary.id,
            diary.keywords.len()
        );
        Ok(diary)
    }

    /// Returns the most frequent keywords of diaries created during the UTC
    /// day containing `now`.
    pub fn todays_empathy_words(&self, now: i64) -> RepoResult<Vec<EmpathyWord>> {
        empathy_digest(&self.repo, now)
    }
}

/// Digest over any diary store; see [`DiaryService::todays_empathy_words`].
pub fn empathy_digest(repo: &dyn DiaryRepository, now: i64) -> RepoResult<Vec<EmpathyWord>> {
    let day_start = utc_day_start(now)?;
    let diaries = repo.list_created_between(day_start, day_start + DAY_MS)?;
    Ok(rank_by_frequency(
        aggregate_words(&diaries),
        DIGEST_WORD_LIMIT,
    ))
}

fn utc_day_start(now: i64) -> RepoResult<i64> {
    let instant: DateTime<Utc> = DateTime::from_timestamp_millis(now)
        .ok_or_else(|| RepoError::InvalidData(format!("timestamp {now} is out of range")))?;
    let midnight = instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| RepoError::InvalidData(format!("no midnight for timestamp {now}")))?;
    Ok(midnight.and_utc().timestamp_millis())
}
