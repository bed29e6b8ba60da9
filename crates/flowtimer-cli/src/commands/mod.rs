pub mod config;
pub mod session;
pub mod stats;
pub mod task;
pub mod timer;

use std::error::Error;
use std::sync::Arc;

use flowtimer_core::{
    Config, Database, FocusTimer, SqliteLedger, SqliteTaskStore, TimerEngine, TimerOutcome,
    TimerSnapshot,
};
use serde::Serialize;
use tracing::warn;

/// kv key of the persisted timer between invocations.
pub const TIMER_KEY: &str = "timer_state";

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Everything a command needs, opened once per invocation.
pub struct App {
    pub db: Database,
    pub config: Config,
    pub ledger: Arc<SqliteLedger>,
    pub tasks: Arc<SqliteTaskStore>,
}

impl App {
    pub fn open() -> CliResult<Self> {
        let db = Database::open()?;
        let config = Config::load()?;
        Ok(Self {
            ledger: Arc::new(SqliteLedger::new(db.clone())),
            tasks: Arc::new(SqliteTaskStore::new(db.clone())),
            db,
            config,
        })
    }

    /// The timer as the previous invocation left it, with history loaded.
    pub fn focus_timer(&self) -> CliResult<FocusTimer> {
        let engine = TimerEngine::new(self.config.durations());
        let mut timer = FocusTimer::new(engine, self.ledger.clone(), self.config.auto_start())
            .with_task_tracker(self.tasks.clone())
            .with_record_abandoned(self.config.timer.record_abandoned);
        timer.load_history()?;

        if let Some(json) = self.db.kv_get(TIMER_KEY)? {
            match serde_json::from_str::<TimerSnapshot>(&json) {
                Ok(snapshot) => timer.restore(snapshot),
                Err(e) => warn!(error = %e, "discarding unreadable timer state"),
            }
        }
        // Picks up edited durations on an untouched countdown.
        timer.set_durations(self.config.durations());
        Ok(timer)
    }

    /// Run any ledger writes the timer still holds, then store its snapshot.
    pub fn save_timer(&self, timer: &mut FocusTimer) -> CliResult {
        report(&timer.flush_writes())?;
        let json = serde_json::to_string(&timer.snapshot())?;
        self.db.kv_set(TIMER_KEY, &json)?;
        Ok(())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the events of an outcome; collaborator failures become warnings.
pub fn report(outcome: &TimerOutcome) -> CliResult {
    for event in &outcome.events {
        print_json(event)?;
    }
    for error in &outcome.errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}
