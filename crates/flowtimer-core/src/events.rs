use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::SessionDraft;
use crate::timer::{TimerMode, TimerState};

/// Every state change in the timer produces an Event.
/// The surrounding UI renders them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        remaining_ms: u64,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_ms: u64,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    /// Progress of the previous mode is discarded; `discarded_ms` says how much.
    ModeSwitched {
        from: TimerMode,
        to: TimerMode,
        discarded_ms: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        draft: SessionDraft,
        completed_focus_sessions: u32,
        at: DateTime<Utc>,
    },
    /// A chronometer completion that rounded to zero seconds.
    CompletionSuppressed {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    AutoStartScheduled {
        next: TimerMode,
        due_at: DateTime<Utc>,
    },
    AutoStartCancelled {
        next: TimerMode,
        at: DateTime<Utc>,
    },
    AutoStartFired {
        next: TimerMode,
        at: DateTime<Utc>,
    },
    /// A snapshot from another view replaced the local state.
    ExternalStateApplied {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        remaining_seconds: f64,
        elapsed_seconds: f64,
        display: String,
        progress: f64,
        at: DateTime<Utc>,
    },
}
