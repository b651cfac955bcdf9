//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from matching and lifecycle services.
//!
//! # Invariants
//! - Write paths call the model `validate()` before SQL mutations.
//! - State bits (`matched`, `active`) are only changed through guarded
//!   `UPDATE ... WHERE` statements that report whether this caller won.
//! - Pruning deletes in bounded, individually committed batches.

pub mod diary_repo;
pub mod message_repo;
pub mod notification_repo;
pub mod room_repo;

use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(Uuid),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Tables that carry an `expires_at` column and are pruned by expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiringTable {
    Diaries,
    Messages,
    Notifications,
}

impl ExpiringTable {
    fn name(self) -> &'static str {
        match self {
            Self::Diaries => "diaries",
            Self::Messages => "chat_messages",
            Self::Notifications => "notifications",
        }
    }
}

/// Deletes rows with `expires_at <= now`, `batch_size` rows per statement.
///
/// Each statement commits on its own, so an interrupted prune leaves only
/// fully deleted rows behind.
pub(crate) fn delete_expired_in_batches(
    conn: &Connection,
    table: ExpiringTable,
    now: i64,
    batch_size: u32,
) -> RepoResult<usize> {
    let table = table.name();
    let sql = format!(
        "DELETE FROM {table}
         WHERE id IN (
            SELECT id FROM {table}
            WHERE expires_at <= ?1
            LIMIT ?2
         );"
    );
    let mut stmt = conn.prepare(&sql)?;
    let batch_size = batch_size.max(1);
    let mut total = 0usize;

    loop {
        let deleted = stmt.execute(params![now, i64::from(batch_size)])?;
        total += deleted;
        if deleted < batch_size as usize {
            break;
        }
    }

    Ok(total)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
