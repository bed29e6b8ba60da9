//! # Flowtimer Core Library
//!
//! This library provides the core business logic for the flowtimer focus
//! timer. It follows a CLI-first philosophy: every operation is available
//! through the standalone `flowtimer` binary, which is a thin layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates
//! - **Focus Timer**: Wires the engine to the auto-start policy, the session
//!   ledger and the task collaborator
//! - **Tick Loop**: A tokio task that drives a shared focus timer frame by frame
//! - **Storage**: SQLite-based session and task storage and TOML-based configuration
//! - **Stats**: Weekly heatmap, streaks and summary statistics over session history
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`FocusTimer`]: The timer a host drives
//! - [`SessionLedger`]: Boundary trait for the session record store
//! - [`Database`]: SQLite persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod ledger;
pub mod stats;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, LedgerError, ValidationError};
pub use events::Event;
pub use ledger::{Session, SessionDraft, SessionHistory, SessionLedger};
pub use stats::{HeatmapDay, HourActivity, StreakData, SummaryStats, WeeklyHeatmap};
pub use storage::{Config, Database, SqliteLedger, SqliteTaskStore};
pub use task::{Task, TaskTracker};
pub use timer::{
    AutoStartConfig, AutoStartController, Durations, FocusTimer, TickLoop, TimerEngine,
    TimerMode, TimerOutcome, TimerSnapshot, TimerState,
};
