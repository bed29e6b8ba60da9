//! Integration tests for the focus timer against the SQLite stores.
//!
//! This test file verifies:
//! - Completed intervals land in the ledger exactly once
//! - Active tasks are credited and chronometer time is assigned
//! - A failing ledger never stalls the timer
//! - Timer snapshots survive a restart
//! - Oversized inputs are clamped or rejected instead of crashing

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use flowtimer_core::{
    AutoStartConfig, CoreError, Database, Durations, Event, FocusTimer, LedgerError, ManualClock,
    Session, SessionDraft, SessionLedger, SqliteLedger, SqliteTaskStore, TimerEngine, TimerMode,
};

struct Harness {
    timer: FocusTimer,
    clock: ManualClock,
    ledger: Arc<SqliteLedger>,
    tasks: Arc<SqliteTaskStore>,
}

fn harness(auto_start: AutoStartConfig) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    let db = Database::open_memory().unwrap();
    let ledger = Arc::new(SqliteLedger::new(db.clone()));
    let tasks = Arc::new(SqliteTaskStore::with_clock(db, Arc::new(clock.clone())));
    let engine = TimerEngine::with_clock(Durations::new(1500, 300, 900), Arc::new(clock.clone()));
    let timer = FocusTimer::new(engine, ledger.clone(), auto_start).with_task_tracker(tasks.clone());
    Harness {
        timer,
        clock,
        ledger,
        tasks,
    }
}

#[test]
fn test_focus_session_is_recorded_once_with_task_credit() {
    let mut h = harness(AutoStartConfig::default());
    let task = h.tasks.create("Write chapter", false).unwrap();
    h.timer.set_active_task(Some(task.id.clone())).unwrap();

    h.timer.toggle_running();
    // Irregular frames, including a long throttled gap.
    for step in [250, 1_000, 600_000, 333, 897_417] {
        h.clock.advance_ms(step);
        h.timer.tick();
    }
    assert!(h.timer.is_running());
    h.clock.advance_ms(1_000);
    let outcome = h.timer.tick();
    assert!(outcome.completed());
    // Frames never touch the stores; the host flushes afterwards.
    assert!(h.ledger.list().unwrap().is_empty());
    assert!(h.timer.flush_writes().errors.is_empty());

    let stored = h.ledger.list().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].duration_seconds, 1500);
    assert_eq!(stored[0].task_id.as_deref(), Some(task.id.as_str()));
    assert_eq!(h.tasks.get(&task.id).unwrap().unwrap().completed_pomodoros, 1);

    for _ in 0..5 {
        h.clock.advance_secs(60);
        assert!(h.timer.tick().is_empty());
    }
    assert_eq!(h.ledger.list().unwrap().len(), 1);
}

#[test]
fn test_chronometer_session_assigned_to_task() {
    let mut h = harness(AutoStartConfig::default());
    let log = h.tasks.create("Reading log", true).unwrap();

    h.timer.switch_mode(TimerMode::Chronometer);
    h.timer.toggle_running();
    h.clock.advance_secs(754);
    h.clock.advance_ms(600);
    let session = h.timer.complete().session.expect("chronometer session");
    assert_eq!(session.duration_seconds, 755);
    assert_eq!(session.task_id, None);

    let outcome = h.timer.assign_session_to_task(&session.id, Some(&log.id));
    assert!(outcome.errors.is_empty());
    assert_eq!(
        h.ledger.list().unwrap()[0].task_id.as_deref(),
        Some(log.id.as_str())
    );
    assert_eq!(h.tasks.get(&log.id).unwrap().unwrap().chrono_duration_seconds, 755);
}

#[test]
fn test_chronometer_under_half_second_is_suppressed() {
    let mut h = harness(AutoStartConfig::default());
    h.timer.switch_mode(TimerMode::Chronometer);
    h.timer.toggle_running();
    h.clock.advance_ms(499);
    let outcome = h.timer.complete();
    assert!(outcome.session.is_none());
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, Event::CompletionSuppressed { .. })));
    assert!(h.ledger.list().unwrap().is_empty());
    assert!(!h.timer.is_running());
}

/// A ledger whose store is down.
struct DownLedger;

impl SessionLedger for DownLedger {
    fn append(&self, _: &SessionDraft) -> Result<Session, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
    fn list(&self) -> Result<Vec<Session>, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
    fn reassign_task(&self, _: &str, _: Option<&str>) -> Result<Session, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
    fn remove(&self, _: &str) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
}

#[test]
fn test_ledger_outage_does_not_stall_timer() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    let engine = TimerEngine::with_clock(Durations::new(60, 30, 90), Arc::new(clock.clone()));
    let config = AutoStartConfig {
        auto_start_break: true,
        ..AutoStartConfig::default()
    };
    let mut timer = FocusTimer::new(engine, Arc::new(DownLedger), config);
    assert!(timer.load_history().is_err());

    timer.toggle_running();
    clock.advance_secs(60);
    let outcome = timer.tick();
    assert!(outcome.completed());
    assert!(outcome.errors.is_empty());
    let settled = timer.flush_writes();
    assert!(matches!(
        settled.errors.as_slice(),
        [CoreError::Ledger(LedgerError::Unavailable(_))]
    ));
    // The session is still visible locally and analytics see it.
    assert_eq!(timer.sessions().len(), 1);
    assert_eq!(timer.streak().total_active_days, 1);

    // Auto-start still proceeds.
    clock.advance_secs(1);
    timer.tick();
    assert_eq!(timer.engine().mode(), TimerMode::ShortBreak);
    assert!(timer.is_running());
}

#[test]
fn test_snapshot_survives_restart_through_kv_store() {
    let mut h = harness(AutoStartConfig::default());
    h.timer.toggle_running();
    h.clock.advance_secs(600);
    h.timer.toggle_running();

    let db = h.ledger.database().clone();
    let json = serde_json::to_string(&h.timer.snapshot()).unwrap();
    db.kv_set("timer_state", &json).unwrap();

    let engine = TimerEngine::with_clock(Durations::default(), Arc::new(h.clock.clone()));
    let mut restored = FocusTimer::new(engine, h.ledger.clone(), AutoStartConfig::default());
    let saved = db.kv_get("timer_state").unwrap().unwrap();
    restored.restore(serde_json::from_str(&saved).unwrap());
    assert_eq!(restored.engine().remaining_ms(), 900_000);
    assert_eq!(restored.engine().display(), "15:00");
    assert!(!restored.is_running());
}

#[test]
fn test_history_reload_drops_malformed_task_references() {
    let h = harness(AutoStartConfig::default());
    h.ledger
        .database()
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, mode, duration_seconds, started_at, completed_at, was_completed, task_id)
                 VALUES ('6f1c3a8e-2b0d-4c55-9d1e-7a8b9c0d1e2f', 'focus', 1500,
                         '2024-06-03T08:35:00Z', '2024-06-03T09:00:00Z', 1, 'not-a-task-key')",
                [],
            )
        })
        .unwrap();
    h.ledger
        .append(&SessionDraft {
            mode: TimerMode::ShortBreak,
            duration_seconds: 300,
            started_at: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
            completed_at: Utc.with_ymd_and_hms(2024, 6, 3, 9, 5, 0).unwrap(),
            was_completed: true,
            task_id: None,
        })
        .unwrap();

    let mut timer = h.timer;
    assert_eq!(timer.load_history().unwrap(), 1);
    assert_eq!(timer.sessions()[0].mode, TimerMode::ShortBreak);
}

#[test]
fn test_oversized_inputs_do_not_crash_the_timer() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    let db = Database::open_memory().unwrap();
    let ledger = Arc::new(SqliteLedger::new(db));
    let mut config = flowtimer_core::Config::default();
    config.set("timer.focus", "100000000000000").unwrap();
    let engine = TimerEngine::with_clock(config.durations(), Arc::new(clock.clone()));
    let mut timer = FocusTimer::new(engine, ledger.clone(), config.auto_start());

    let session = timer.complete().session.expect("clamped focus session");
    assert_eq!(session.duration_seconds, Durations::MAX_SECS);
    assert_eq!(ledger.list().unwrap(), vec![session]);

    let outcome = timer.log_interrupted(TimerMode::Focus, 100_000_000_000_000, None);
    assert!(outcome.session.is_none());
    assert!(matches!(outcome.errors.as_slice(), [CoreError::Validation(_)]));
    assert_eq!(ledger.list().unwrap().len(), 1);
}
