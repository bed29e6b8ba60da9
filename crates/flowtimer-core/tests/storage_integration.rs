//! Integration tests for on-disk storage.
//!
//! This test file verifies:
//! - Sessions and tasks persist across reopening the database file
//! - Configuration round-trips through TOML on disk

use chrono::{Duration, TimeZone, Utc};
use flowtimer_core::storage::{migrations, CONFIG_FILE};
use flowtimer_core::{
    Config, Database, SessionDraft, SessionLedger, SqliteLedger, SqliteTaskStore, TaskTracker,
    TimerMode,
};

#[test]
fn test_sessions_and_tasks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flowtimer.db");

    let (session, task) = {
        let db = Database::open_at(&path).unwrap();
        let ledger = SqliteLedger::new(db.clone());
        let tasks = SqliteTaskStore::new(db);
        let task = tasks.create("Refactor parser", false).unwrap();
        let completed_at = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let session = ledger
            .append(&SessionDraft {
                mode: TimerMode::Focus,
                duration_seconds: 1500,
                started_at: completed_at - Duration::seconds(1500),
                completed_at,
                was_completed: true,
                task_id: Some(task.id.clone()),
            })
            .unwrap();
        tasks.increment_completed_pomodoros(&task.id).unwrap();
        (session, task)
    };

    let db = Database::open_at(&path).unwrap();
    assert_eq!(
        db.with_conn(|conn| Ok(migrations::get_schema_version(conn))).unwrap(),
        migrations::CURRENT_VERSION
    );
    let ledger = SqliteLedger::new(db.clone());
    assert_eq!(ledger.list().unwrap(), vec![session]);

    let tasks = SqliteTaskStore::new(db);
    let reloaded = tasks.get(&task.id).unwrap().unwrap();
    assert_eq!(reloaded.completed_pomodoros, 1);
    assert_eq!(reloaded.title, "Refactor parser");
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE);

    let mut cfg = Config::load_from(&path).unwrap();
    cfg.set("timer.focus", "3000").unwrap();
    cfg.set("auto_start.auto_start_break", "true").unwrap();
    cfg.set("auto_start.delay_ms", "1500").unwrap();
    cfg.save_to(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[timer]"));
    assert!(content.contains("focus = 3000"));

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.durations().focus, 3000);
    assert!(loaded.auto_start().auto_start_break);
    assert_eq!(loaded.auto_start().delay_ms, 1500);
}
