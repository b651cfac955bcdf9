use chrono::Utc;
use empathy_core::db::open_db;
use empathy_core::model::{DAY_MS, HOUR_MS};
use empathy_core::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use empathy_core::scheduler::JobId;
use empathy_core::{DiaryEntry, EngineConfig, Keyword, Scheduler};
use std::path::Path;

fn seed_diaries(path: &Path, owners: &[&str], words: &[&str]) -> Vec<DiaryEntry> {
    let conn = open_db(path).unwrap();
    let repo = SqliteDiaryRepository::new(&conn);
    let now = Utc::now().timestamp_millis();

    owners
        .iter()
        .map(|owner| {
            let entry = DiaryEntry::new(
                Some(owner.to_string()),
                words.iter().map(|word| Keyword::new(*word, 1.0)).collect(),
                now - HOUR_MS,
                now - HOUR_MS + DAY_MS,
            );
            repo.create_diary(&entry).unwrap();
            entry
        })
        .collect()
}

fn config_for(path: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.storage.database_path = path.to_path_buf();
    config
}

#[tokio::test]
async fn manual_matching_creates_rooms_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empathy.db");
    let seeded = seed_diaries(&path, &["t1", "t2"], &["rain", "tired"]);
    let scheduler = Scheduler::new(config_for(&path));

    let report = scheduler.trigger_matching().await;

    assert!(report.success, "{}", report.message);
    assert!(!report.skipped);
    assert_eq!(report.rooms_created, 1);
    assert_eq!(report.rooms[0].participant_count, 2);

    let conn = open_db(&path).unwrap();
    let repo = SqliteDiaryRepository::new(&conn);
    for entry in &seeded {
        assert!(repo.get_diary(entry.id).unwrap().unwrap().matched);
    }

    let again = scheduler.trigger_matching().await;
    assert!(again.success);
    assert_eq!(again.rooms_created, 0);
}

#[tokio::test]
async fn manual_matching_is_skipped_while_scheduled_run_holds_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empathy.db");
    let seeded = seed_diaries(&path, &["t1", "t2"], &["rain"]);
    let scheduler = Scheduler::new(config_for(&path));

    let in_flight = scheduler.job_guard(JobId::Matching).try_acquire().unwrap();
    let report = scheduler.trigger_matching().await;
    drop(in_flight);

    assert!(report.success);
    assert!(report.skipped);
    assert!(report.rooms.is_empty());
    let conn = open_db(&path).unwrap();
    let repo = SqliteDiaryRepository::new(&conn);
    assert!(seeded
        .iter()
        .all(|entry| !repo.get_diary(entry.id).unwrap().unwrap().matched));
}

#[tokio::test]
async fn cleanup_guard_is_independent_of_matching() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empathy.db");
    seed_diaries(&path, &["t1"], &["rain"]);
    let scheduler = Scheduler::new(config_for(&path));

    let _matching = scheduler.job_guard(JobId::Matching).try_acquire().unwrap();
    let report = scheduler.trigger_cleanup().await;

    assert!(report.success, "{}", report.message);
    assert!(!report.skipped);
    assert_eq!(report.details.map(|details| details.total()), Some(0));
}

#[tokio::test]
async fn reports_serialize_for_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empathy.db");
    let scheduler = Scheduler::new(config_for(&path));

    let report = scheduler.trigger_cleanup().await;
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["details"]["rooms_closed"], 0);

    let status = serde_json::to_value(scheduler.status()).unwrap();
    assert_eq!(status["running"], false);
    assert_eq!(status["jobs"][1]["id"], "room_warning_job");
}
