use empathy_core::db::open_db_in_memory;
use empathy_core::model::{DAY_MS, HOUR_MS};
use empathy_core::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use empathy_core::repo::message_repo::{MessageRepository, SqliteMessageRepository};
use empathy_core::repo::notification_repo::{NotificationSink, SqliteNotificationRepository};
use empathy_core::repo::room_repo::{RoomMember, RoomRepository, SqliteRoomRepository};
use empathy_core::{
    ChatRoom, CleanupReport, DiaryEntry, EmpathyWord, EngineConfig, Keyword, LifecycleService,
    NotificationKind,
};
use rusqlite::Connection;
use serde_json::json;

const NOW: i64 = 1_709_640_000_000;

fn insert_room(conn: &Connection, tokens: &[&str], expires_at: i64) -> ChatRoom {
    let room = ChatRoom::new(
        tokens.iter().map(|token| token.to_string()).collect(),
        vec![EmpathyWord {
            word: "rain".to_string(),
            frequency: 2,
            importance_score: 1.0,
        }],
        5,
        expires_at - DAY_MS,
        expires_at,
    );
    let members: Vec<_> = room
        .participant_tokens
        .iter()
        .map(|token| RoomMember {
            token: token.clone(),
            diary_id: None,
        })
        .collect();
    SqliteRoomRepository::new(conn)
        .insert_room(&room, &members)
        .unwrap();
    room
}

fn notifications(conn: &Connection) -> SqliteNotificationRepository<'_> {
    SqliteNotificationRepository::new(conn, 7 * DAY_MS)
}

fn lifecycle() -> LifecycleService {
    LifecycleService::new(&EngineConfig::default())
}

#[test]
fn warning_scan_targets_rooms_inside_lead_window() {
    let mut conn = open_db_in_memory().unwrap();
    let closing_soon = insert_room(&conn, &["t1", "t2"], NOW + 30 * 60_000);
    let at_boundary = insert_room(&conn, &["t3", "t4"], NOW + HOUR_MS);
    insert_room(&conn, &["t5", "t6"], NOW + 2 * HOUR_MS);
    insert_room(&conn, &["t7", "t8"], NOW);

    let report = lifecycle().warn_expiring(&mut conn, NOW).unwrap();

    assert_eq!(report.rooms_warned, 2);
    assert_eq!(report.notifications_sent, 4);
    let sink = notifications(&conn);
    assert_eq!(
        sink.count_by_kind(NotificationKind::RoomExpiryWarning).unwrap(),
        4
    );
    let received = sink.list_for_recipient("t1").unwrap();
    assert_eq!(received[0].payload["room_id"], closing_soon.id.to_string());
    assert_eq!(received[0].payload["expires_at"], closing_soon.expires_at);
    assert_eq!(sink.list_for_recipient("t3").unwrap().len(), 1);
    assert!(sink.list_for_recipient("t5").unwrap().is_empty());
    assert!(sink.list_for_recipient("t7").unwrap().is_empty());
    assert!(SqliteRoomRepository::new(&conn)
        .get_room(at_boundary.id)
        .unwrap()
        .unwrap()
        .active);
}

#[test]
fn expired_room_closes_once_with_one_notification_per_participant() {
    let mut conn = open_db_in_memory().unwrap();
    let expired = insert_room(&conn, &["t1", "t2", "t3"], NOW);
    let open = insert_room(&conn, &["t4", "t5"], NOW + HOUR_MS);
    let service = lifecycle();

    let first = service.close_expired(&mut conn, NOW).unwrap();
    assert_eq!(first.rooms_closed, 1);
    assert_eq!(first.notifications_sent, 3);

    let second = service.close_expired(&mut conn, NOW + 1).unwrap();
    assert_eq!(second.rooms_closed, 0);

    let rooms = SqliteRoomRepository::new(&conn);
    assert!(!rooms.get_room(expired.id).unwrap().unwrap().active);
    assert!(rooms.get_room(open.id).unwrap().unwrap().active);
    assert!(rooms.list_active_for_token("t1", NOW).unwrap().is_empty());

    let sink = notifications(&conn);
    assert_eq!(sink.count_by_kind(NotificationKind::RoomClosed).unwrap(), 3);
    let closed = sink.list_for_recipient("t2").unwrap();
    assert_eq!(closed[0].kind, NotificationKind::RoomClosed);
    assert_eq!(closed[0].payload["empathy_words"][0]["word"], "rain");
}

#[test]
fn closed_room_is_never_reopened_or_rewarned() {
    let mut conn = open_db_in_memory().unwrap();
    let room = insert_room(&conn, &["t1", "t2"], NOW);
    let service = lifecycle();
    service.close_expired(&mut conn, NOW).unwrap();

    // A closed room inside the lead window of an earlier clock gets no warning.
    let report = service.warn_expiring(&mut conn, NOW - 30 * 60_000).unwrap();
    assert_eq!(report.rooms_warned, 0);
    assert!(!SqliteRoomRepository::new(&conn)
        .get_room(room.id)
        .unwrap()
        .unwrap()
        .active);
}

#[test]
fn cleanup_prunes_only_expired_records() {
    let mut conn = open_db_in_memory().unwrap();
    let room = insert_room(&conn, &["t1", "t2"], NOW + HOUR_MS);

    let short_messages = SqliteMessageRepository::new(&conn, HOUR_MS);
    let old_message = short_messages
        .append_message(room.id, "t1", "hello", NOW - 2 * HOUR_MS)
        .unwrap();
    let new_message = short_messages
        .append_message(room.id, "t2", "hi", NOW)
        .unwrap();

    let short_notifications = SqliteNotificationRepository::new(&conn, HOUR_MS);
    short_notifications
        .create("t1", NotificationKind::NewMessage, json!({}), NOW - 2 * HOUR_MS)
        .unwrap();
    short_notifications
        .create("t2", NotificationKind::NewMessage, json!({}), NOW)
        .unwrap();

    let diaries = SqliteDiaryRepository::new(&conn);
    let old_diary = DiaryEntry::new(
        Some("t1".to_string()),
        vec![Keyword::new("rain", 1.0)],
        NOW - 2 * DAY_MS,
        NOW - DAY_MS,
    );
    let new_diary = DiaryEntry::new(
        Some("t2".to_string()),
        vec![Keyword::new("rain", 1.0)],
        NOW,
        NOW + DAY_MS,
    );
    diaries.create_diary(&old_diary).unwrap();
    diaries.create_diary(&new_diary).unwrap();
    diaries.mark_matched(new_diary.id, NOW).unwrap();

    let report = lifecycle().cleanup(&mut conn, NOW).unwrap();

    assert_eq!(
        report,
        CleanupReport {
            rooms_closed: 0,
            messages_deleted: 1,
            notifications_deleted: 1,
            diaries_deleted: 1,
        }
    );
    let remaining = SqliteMessageRepository::new(&conn, HOUR_MS)
        .list_room_messages(room.id)
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, new_message.id);
    assert_ne!(remaining[0].id, old_message.id);
    assert!(notifications(&conn).list_for_recipient("t1").unwrap().is_empty());
    assert_eq!(notifications(&conn).list_for_recipient("t2").unwrap().len(), 1);
    let diaries = SqliteDiaryRepository::new(&conn);
    assert!(diaries.get_diary(old_diary.id).unwrap().is_none());
    assert!(diaries.get_diary(new_diary.id).unwrap().is_some());
}

#[test]
fn messages_outlive_their_closed_room_until_expiry() {
    let mut conn = open_db_in_memory().unwrap();
    let room = insert_room(&conn, &["t1", "t2"], NOW);
    SqliteMessageRepository::new(&conn, DAY_MS)
        .append_message(room.id, "t1", "bye", NOW - HOUR_MS)
        .unwrap();

    let report = lifecycle().cleanup(&mut conn, NOW).unwrap();

    assert_eq!(report.rooms_closed, 1);
    assert_eq!(report.messages_deleted, 0);
    assert_eq!(
        SqliteMessageRepository::new(&conn, DAY_MS)
            .list_room_messages(room.id)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn room_without_matched_diaries_survives_diary_pruning() {
    let mut conn = open_db_in_memory().unwrap();
    let diary = DiaryEntry::new(
        Some("t1".to_string()),
        vec![Keyword::new("rain", 1.0)],
        NOW - DAY_MS,
        NOW,
    );
    SqliteDiaryRepository::new(&conn).create_diary(&diary).unwrap();
    let room = ChatRoom::new(
        vec!["t1".to_string(), "t2".to_string()],
        Vec::new(),
        5,
        NOW - HOUR_MS,
        NOW + HOUR_MS,
    );
    SqliteRoomRepository::new(&conn)
        .insert_room(
            &room,
            &[
                RoomMember {
                    token: "t1".to_string(),
                    diary_id: Some(diary.id),
                },
                RoomMember {
                    token: "t2".to_string(),
                    diary_id: None,
                },
            ],
        )
        .unwrap();

    let report = lifecycle().cleanup(&mut conn, NOW).unwrap();

    assert_eq!(report.diaries_deleted, 1);
    let stored = SqliteRoomRepository::new(&conn).get_room(room.id).unwrap().unwrap();
    assert!(stored.active);
    assert_eq!(stored.participant_tokens, vec!["t1", "t2"]);
}
