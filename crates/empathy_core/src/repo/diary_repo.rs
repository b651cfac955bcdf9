//! Diary repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Store diaries with their keyword rows.
//! - Serve matching candidates in a deterministic order.
//! - Own the guarded `matched` flip and expiry pruning.
//!
//! # Invariants
//! - `mark_matched` never sets `matched` back to `0`.
//! - Candidate listing excludes matched, expired and keyword-less diaries.

use crate::model::diary::{DiaryEntry, DiaryId};
use crate::model::keyword::Keyword;
use crate::repo::{
    bool_to_int, delete_expired_in_batches, parse_flag, parse_uuid, ExpiringTable, RepoResult,
};
use rusqlite::{params, Connection, Row};

const DIARY_SELECT_SQL: &str = "SELECT
    id,
    owner_token,
    created_at,
    expires_at,
    matched
FROM diaries";

/// Repository interface for diary persistence.
pub trait DiaryRepository {
    fn create_diary(&self, diary: &DiaryEntry) -> RepoResult<DiaryId>;
    fn get_diary(&self, id: DiaryId) -> RepoResult<Option<DiaryEntry>>;
    /// Unmatched, unexpired diaries with at least one keyword, oldest first.
    fn list_match_candidates(&self, now: i64) -> RepoResult<Vec<DiaryEntry>>;
    /// Diaries with `start <= created_at < end`, oldest first.
    fn list_created_between(&self, start: i64, end: i64) -> RepoResult<Vec<DiaryEntry>>;
    /// Flips `matched` to true when the diary is still unmatched and alive.
    ///
    /// Returns `false` when another run already matched it or it expired.
    fn mark_matched(&self, id: DiaryId, now: i64) -> RepoResult<bool>;
    fn delete_expired(&self, now: i64, batch_size: u32) -> RepoResult<usize>;
}

/// SQLite-backed diary repository.
pub struct SqliteDiaryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDiaryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_keywords(&self, diary_id: DiaryId) -> RepoResult<Vec<Keyword>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT word, importance_score
             FROM diary_keywords
             WHERE diary_id = ?1
             ORDER BY position ASC;",
        )?;
        let keywords = stmt
            .query_map([diary_id.to_string()], |row| {
                Ok(Keyword {
                    word: row.get(0)?,
                    importance_score: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    fn query_diaries(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<DiaryEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut diaries = Vec::new();

        while let Some(row) = rows.next()? {
            let mut diary = parse_diary_row(row)?;
            diary.keywords = self.load_keywords(diary.id)?;
            diaries.push(diary);
        }

        Ok(diaries)
    }
}

impl DiaryRepository for SqliteDiaryRepository<'_> {
    fn create_diary(&self, diary: &DiaryEntry) -> RepoResult<DiaryId> {
        diary.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO diaries (
                id,
                owner_token,
                created_at,
                expires_at,
                matched
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                diary.id.to_string(),
                diary.owner_token.as_deref(),
                diary.created_at,
                diary.expires_at,
                bool_to_int(diary.matched),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO diary_keywords (diary_id, position, word, importance_score)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (position, keyword) in diary.keywords.iter().enumerate() {
                stmt.execute(params![
                    diary.id.to_string(),
                    position as i64,
                    keyword.word.as_str(),
                    keyword.importance_score,
                ])?;
            }
        }
        tx.commit()?;

        Ok(diary.id)
    }

    fn get_diary(&self, id: DiaryId) -> RepoResult<Option<DiaryEntry>> {
        let mut diaries = self.query_diaries(
            &format!("{DIARY_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(diaries.pop())
    }

    fn list_match_candidates(&self, now: i64) -> RepoResult<Vec<DiaryEntry>> {
        self.query_diaries(
            &format!(
                "{DIARY_SELECT_SQL}
                 WHERE matched = 0
                   AND expires_at > ?1
                   AND EXISTS (
                       SELECT 1 FROM diary_keywords k WHERE k.diary_id = diaries.id
                   )
                 ORDER BY created_at ASC, id ASC;"
            ),
            [now],
        )
    }

    fn list_created_between(&self, start: i64, end: i64) -> RepoResult<Vec<DiaryEntry>> {
        self.query_diaries(
            &format!(
                "{DIARY_SELECT_SQL}
                 WHERE created_at >= ?1
                   AND created_at < ?2
                 ORDER BY created_at ASC, id ASC;"
            ),
            [start, end],
        )
    }

    fn mark_matched(&self, id: DiaryId, now: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE diaries
             SET matched = 1
             WHERE id = ?1
               AND matched = 0
               AND expires_at > ?2;",
            params![id.to_string(), now],
        )?;
        Ok(changed == 1)
    }

    fn delete_expired(&self, now: i64, batch_size: u32) -> RepoResult<usize> {
        delete_expired_in_batches(self.conn, ExpiringTable::Diaries, now, batch_size)
    }
}

fn parse_diary_row(row: &Row<'_>) -> RepoResult<DiaryEntry> {
    let id_text: String = row.get("id")?;
    Ok(DiaryEntry {
        id: parse_uuid(&id_text, "diaries.id")?,
        owner_token: row.get("owner_token")?,
        keywords: Vec::new(),
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        matched: parse_flag(row.get("matched")?, "diaries.matched")?,
    })
}
