use empathy_core::db::open_db_in_memory;
use empathy_core::model::{DAY_MS, HOUR_MS};
use empathy_core::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use empathy_core::repo::notification_repo::SqliteNotificationRepository;
use empathy_core::repo::room_repo::{RoomRepository, SqliteRoomRepository};
use empathy_core::service::room_factory::DiscardReason;
use empathy_core::{
    DiaryEntry, EngineConfig, Keyword, MatchingService, NotificationKind, RoomCreation, RoomPlan,
};
use rusqlite::Connection;

const NOW: i64 = 1_709_640_000_000;

fn diary(owner: Option<&str>, words: &[&str], created_at: i64) -> DiaryEntry {
    DiaryEntry::new(
        owner.map(str::to_string),
        words.iter().map(|word| Keyword::new(*word, 1.0)).collect(),
        created_at,
        created_at + DAY_MS,
    )
}

fn store(conn: &Connection, entries: &[&DiaryEntry]) {
    let repo = SqliteDiaryRepository::new(conn);
    for entry in entries {
        repo.create_diary(entry).unwrap();
    }
}

fn is_matched(conn: &Connection, entry: &DiaryEntry) -> bool {
    SqliteDiaryRepository::new(conn)
        .get_diary(entry.id)
        .unwrap()
        .unwrap()
        .matched
}

fn service(threshold: f64, max_participants: usize) -> MatchingService {
    let mut config = EngineConfig::default();
    config.matching.similarity_threshold = threshold;
    config.matching.max_participants = max_participants;
    MatchingService::new(config)
}

#[test]
fn similar_pair_gets_a_room_and_outlier_stays_unmatched() {
    let mut conn = open_db_in_memory().unwrap();
    let d1 = diary(Some("t1"), &["a", "b", "c"], NOW - 3 * HOUR_MS);
    let d2 = diary(Some("t2"), &["a", "b", "d"], NOW - 2 * HOUR_MS);
    let d3 = diary(Some("t3"), &["x", "y", "z"], NOW - HOUR_MS);
    store(&conn, &[&d1, &d2, &d3]);

    let outcome = service(0.4, 5).run(&mut conn, NOW).unwrap();

    assert_eq!(outcome.candidates, 3);
    assert_eq!(outcome.rooms.len(), 1);
    let summary = &outcome.rooms[0];
    assert_eq!(summary.participant_count, 2);
    let words: Vec<_> = summary
        .empathy_words
        .iter()
        .map(|word| (word.word.as_str(), word.frequency))
        .collect();
    assert_eq!(words, vec![("a", 2), ("b", 2)]);

    let room = SqliteRoomRepository::new(&conn)
        .get_room(summary.id)
        .unwrap()
        .unwrap();
    assert_eq!(room.participant_tokens, vec!["t1", "t2"]);
    assert!(room.active);
    assert_eq!(room.expires_at, NOW + DAY_MS);

    assert!(is_matched(&conn, &d1));
    assert!(is_matched(&conn, &d2));
    assert!(!is_matched(&conn, &d3));

    let notifications = SqliteNotificationRepository::new(&conn, DAY_MS);
    assert_eq!(notifications.count_by_kind(NotificationKind::MatchingSuccess).unwrap(), 2);
    let received = notifications.list_for_recipient("t1").unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload["room_id"], summary.id.to_string());
    assert_eq!(received[0].payload["participants_count"], 2);
    assert!(notifications.list_for_recipient("t3").unwrap().is_empty());
}

#[test]
fn second_pass_without_new_diaries_creates_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let d1 = diary(Some("t1"), &["rain", "tired"], NOW - HOUR_MS);
    let d2 = diary(Some("t2"), &["rain", "tired"], NOW - HOUR_MS);
    store(&conn, &[&d1, &d2]);
    let matching = service(0.1, 5);

    assert_eq!(matching.run(&mut conn, NOW).unwrap().rooms.len(), 1);
    let second = matching.run(&mut conn, NOW).unwrap();
    assert_eq!(second.candidates, 0);
    assert!(second.rooms.is_empty());
}

#[test]
fn rooms_are_capped_at_max_participants() {
    let mut conn = open_db_in_memory().unwrap();
    let entries: Vec<_> = (0..7)
        .map(|i| diary(Some(format!("t{i}").as_str()), &["same", "words"], NOW - HOUR_MS + i))
        .collect();
    store(&conn, &entries.iter().collect::<Vec<_>>());

    let outcome = service(0.5, 5).run(&mut conn, NOW).unwrap();

    let sizes: Vec<_> = outcome.rooms.iter().map(|room| room.participant_count).collect();
    assert_eq!(sizes, vec![5, 2]);
    assert!(entries.iter().all(|entry| is_matched(&conn, entry)));
}

#[test]
fn diary_matched_elsewhere_is_dropped_from_the_room() {
    let mut conn = open_db_in_memory().unwrap();
    let d1 = diary(Some("t1"), &["rain"], NOW - HOUR_MS);
    let d2 = diary(Some("t2"), &["rain"], NOW - HOUR_MS);
    let d3 = diary(Some("t3"), &["rain"], NOW - HOUR_MS);
    store(&conn, &[&d1, &d2, &d3]);
    SqliteDiaryRepository::new(&conn).mark_matched(d2.id, NOW).unwrap();

    let plan = RoomPlan {
        members: vec![d1.clone(), d2.clone(), d3.clone()],
    };
    let created = service(0.1, 5)
        .room_factory()
        .create_room(&mut conn, &plan, NOW)
        .unwrap();

    let room = match created {
        RoomCreation::Created(room) => room,
        other => panic!("expected a room, got {other:?}"),
    };
    assert_eq!(room.participant_tokens, vec!["t1", "t3"]);
    let stored = SqliteRoomRepository::new(&conn).get_room(room.id).unwrap().unwrap();
    assert_eq!(stored.participant_tokens, vec!["t1", "t3"]);
}

#[test]
fn conflict_below_minimum_discards_and_rolls_back() {
    let mut conn = open_db_in_memory().unwrap();
    let d1 = diary(Some("t1"), &["rain"], NOW - HOUR_MS);
    let d2 = diary(Some("t2"), &["rain"], NOW - HOUR_MS);
    store(&conn, &[&d1, &d2]);
    SqliteDiaryRepository::new(&conn).mark_matched(d2.id, NOW).unwrap();

    let plan = RoomPlan {
        members: vec![d1.clone(), d2.clone()],
    };
    let created = service(0.1, 5)
        .room_factory()
        .create_room(&mut conn, &plan, NOW)
        .unwrap();

    assert_eq!(
        created,
        RoomCreation::Discarded(DiscardReason::TooFewParticipants {
            distinct: 1,
            conflicts: 1,
        })
    );
    assert!(!is_matched(&conn, &d1));
    let rooms: i64 = conn
        .query_row("SELECT COUNT(*) FROM chat_rooms;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rooms, 0);
}

#[test]
fn diaries_without_owner_never_join_a_room() {
    let mut conn = open_db_in_memory().unwrap();
    let anonymous = diary(None, &["rain", "tired"], NOW - HOUR_MS);
    let blank = diary(Some("  "), &["rain", "tired"], NOW - HOUR_MS);
    let owned = diary(Some("t1"), &["rain", "tired"], NOW - HOUR_MS);
    store(&conn, &[&anonymous, &blank, &owned]);

    let outcome = service(0.1, 5).run(&mut conn, NOW).unwrap();

    assert!(outcome.rooms.is_empty());
    assert_eq!(outcome.discarded, 1);
    assert!(!is_matched(&conn, &anonymous));
    assert!(!is_matched(&conn, &blank));
    assert!(!is_matched(&conn, &owned));
}

#[test]
fn ownerless_member_of_created_room_is_matched_with_it() {
    let mut conn = open_db_in_memory().unwrap();
    let anonymous = diary(None, &["rain", "tired"], NOW - 3 * HOUR_MS);
    let d1 = diary(Some("t1"), &["rain", "tired"], NOW - 2 * HOUR_MS);
    let d2 = diary(Some("t2"), &["rain", "tired"], NOW - HOUR_MS);
    store(&conn, &[&anonymous, &d1, &d2]);
    let matching = service(0.1, 5);

    let first = matching.run(&mut conn, NOW).unwrap();

    assert_eq!(first.rooms.len(), 1);
    assert_eq!(first.rooms[0].participant_count, 2);
    assert_eq!(first.rooms[0].empathy_words[0].frequency, 3);
    assert!(is_matched(&conn, &anonymous));
    assert!(is_matched(&conn, &d1));
    assert!(is_matched(&conn, &d2));

    let second = matching.run(&mut conn, NOW).unwrap();
    assert_eq!(second.candidates, 0);
    assert!(second.rooms.is_empty());
}

#[test]
fn same_owner_twice_is_not_a_room() {
    let mut conn = open_db_in_memory().unwrap();
    let first = diary(Some("t1"), &["rain"], NOW - 2 * HOUR_MS);
    let second = diary(Some("t1"), &["rain"], NOW - HOUR_MS);
    store(&conn, &[&first, &second]);

    let outcome = service(0.1, 5).run(&mut conn, NOW).unwrap();

    assert!(outcome.rooms.is_empty());
    assert!(!is_matched(&conn, &first));
    assert!(!is_matched(&conn, &second));
}

#[test]
fn expired_diaries_are_not_candidates() {
    let mut conn = open_db_in_memory().unwrap();
    let mut stale = diary(Some("t1"), &["rain"], NOW - DAY_MS);
    stale.expires_at = NOW;
    let fresh = diary(Some("t2"), &["rain"], NOW - HOUR_MS);
    store(&conn, &[&stale, &fresh]);

    let outcome = service(0.1, 5).run(&mut conn, NOW).unwrap();

    assert_eq!(outcome.candidates, 1);
    assert!(outcome.rooms.is_empty());
}
