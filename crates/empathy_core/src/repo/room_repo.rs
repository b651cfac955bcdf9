//! Chat room repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist rooms with their ordered participant rows.
//! - Serve lifecycle scans (expiring soon, already expired).
//! - Own the guarded `active` flip.
//!
//! # Invariants
//! - `deactivate` only succeeds for rooms that are still active.
//! - Participant rows keep only an id reference to their source diary.

use crate::model::diary::DiaryId;
use crate::model::room::{ChatRoom, EmpathyWord, RoomId};
use crate::repo::{bool_to_int, parse_flag, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const ROOM_SELECT_SQL: &str = "SELECT
    id,
    empathy_words,
    max_participants,
    created_at,
    expires_at,
    active
FROM chat_rooms";

/// One participant row: the token plus the diary that brought it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub token: String,
    pub diary_id: Option<DiaryId>,
}

/// Repository interface for chat room persistence.
pub trait RoomRepository {
    /// Inserts a validated room and its members. Member tokens must match
    /// `room.participant_tokens` in order.
    fn insert_room(&self, room: &ChatRoom, members: &[RoomMember]) -> RepoResult<RoomId>;
    fn get_room(&self, id: RoomId) -> RepoResult<Option<ChatRoom>>;
    /// Active rooms with `now < expires_at <= until`.
    fn list_active_expiring(&self, now: i64, until: i64) -> RepoResult<Vec<ChatRoom>>;
    /// Active rooms with `expires_at <= now`.
    fn list_active_expired(&self, now: i64) -> RepoResult<Vec<ChatRoom>>;
    /// Active rooms that include `token`.
    fn list_active_for_token(&self, token: &str, now: i64) -> RepoResult<Vec<ChatRoom>>;
    /// Flips `active` to false. Returns `false` when the room was already closed.
    fn deactivate(&self, id: RoomId) -> RepoResult<bool>;
}

/// SQLite-backed chat room repository.
pub struct SqliteRoomRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoomRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_participants(&self, room_id: RoomId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT token
             FROM room_participants
             WHERE room_id = ?1
             ORDER BY position ASC;",
        )?;
        let tokens = stmt
            .query_map([room_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    fn query_rooms(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<ChatRoom>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut rooms = Vec::new();

        while let Some(row) = rows.next()? {
            let mut room = parse_room_row(row)?;
            room.participant_tokens = self.load_participants(room.id)?;
            rooms.push(room);
        }

        Ok(rooms)
    }
}

impl RoomRepository for SqliteRoomRepository<'_> {
    fn insert_room(&self, room: &ChatRoom, members: &[RoomMember]) -> RepoResult<RoomId> {
        room.validate()?;
        let tokens_match = members.len() == room.participant_tokens.len()
            && members
                .iter()
                .zip(&room.participant_tokens)
                .all(|(member, token)| &member.token == token);
        if !tokens_match {
            return Err(RepoError::InvalidData(
                "room members do not match participant tokens".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO chat_rooms (
                id,
                empathy_words,
                max_participants,
                created_at,
                expires_at,
                active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                room.id.to_string(),
                serde_json::to_string(&room.empathy_words)?,
                room.max_participants as i64,
                room.created_at,
                room.expires_at,
                bool_to_int(room.active),
            ],
        )?;

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO room_participants (room_id, position, token, diary_id)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (position, member) in members.iter().enumerate() {
            stmt.execute(params![
                room.id.to_string(),
                position as i64,
                member.token.as_str(),
                member.diary_id.map(|id| id.to_string()),
            ])?;
        }

        Ok(room.id)
    }

    fn get_room(&self, id: RoomId) -> RepoResult<Option<ChatRoom>> {
        let mut rooms = self.query_rooms(
            &format!("{ROOM_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(rooms.pop())
    }

    fn list_active_expiring(&self, now: i64, until: i64) -> RepoResult<Vec<ChatRoom>> {
        self.query_rooms(
            &format!(
                "{ROOM_SELECT_SQL}
                 WHERE active = 1
                   AND expires_at > ?1
                   AND expires_at <= ?2
                 ORDER BY expires_at ASC, id ASC;"
            ),
            [now, until],
        )
    }

    fn list_active_expired(&self, now: i64) -> RepoResult<Vec<ChatRoom>> {
        self.query_rooms(
            &format!(
                "{ROOM_SELECT_SQL}
                 WHERE active = 1
                   AND expires_at <= ?1
                 ORDER BY expires_at ASC, id ASC;"
            ),
            [now],
        )
    }

    fn list_active_for_token(&self, token: &str, now: i64) -> RepoResult<Vec<ChatRoom>> {
        self.query_rooms(
            &format!(
                "{ROOM_SELECT_SQL}
                 WHERE active = 1
                   AND expires_at > ?2
                   AND id IN (SELECT room_id FROM room_participants WHERE token = ?1)
                 ORDER BY created_at DESC, id ASC;"
            ),
            params![token, now],
        )
    }

    fn deactivate(&self, id: RoomId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE chat_rooms
             SET active = 0
             WHERE id = ?1
               AND active = 1;",
            [id.to_string()],
        )?;
        Ok(changed == 1)
    }
}

fn parse_room_row(row: &Row<'_>) -> RepoResult<ChatRoom> {
    let id_text: String = row.get("id")?;
    let words_text: String = row.get("empathy_words")?;
    let empathy_words: Vec<EmpathyWord> = serde_json::from_str(&words_text)?;
    let max_participants: i64 = row.get("max_participants")?;

    Ok(ChatRoom {
        id: parse_uuid(&id_text, "chat_rooms.id")?,
        participant_tokens: Vec::new(),
        empathy_words,
        max_participants: usize::try_from(max_participants).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid max_participants `{max_participants}` in chat_rooms.max_participants"
            ))
        })?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        active: parse_flag(row.get("active")?, "chat_rooms.active")?,
    })
}
