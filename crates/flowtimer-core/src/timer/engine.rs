//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()` periodically.
//! Every tick advances the timer by the real time elapsed since the previous
//! tick, so throttled or irregular callers never accumulate drift.
//!
//! ## State Transitions
//!
//! ```text
//! (mode, paused) <-> (mode, running) --remaining hits 0--> completion
//!        ^                                                     |
//!        +------------------ re-armed, paused -----------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(Durations::default());
//! engine.toggle_running();
//! // In a loop:
//! engine.tick(); // Returns Some(Event::SessionCompleted) when the countdown finishes
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::mode::{Durations, TimerMode};
use crate::clock::{earlier_by_ms, Clock, SystemClock};
use crate::events::Event;
use crate::ledger::SessionDraft;

/// The single mutable timer state.
///
/// Time is kept in whole milliseconds so that any subdivision of the same
/// real elapsed time lands on exactly the same value.
///
/// Invariant: `running == last_tick.is_some()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    /// Countdown modes only.
    pub remaining_ms: u64,
    /// Chronometer only.
    pub elapsed_ms: u64,
    pub running: bool,
    #[serde(default)]
    pub last_tick: Option<DateTime<Utc>>,
    pub durations: Durations,
    #[serde(default)]
    pub completed_focus_sessions: u32,
    /// When the current interval first started running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl TimerState {
    pub fn new(durations: Durations) -> Self {
        let durations = durations.clamped();
        Self {
            mode: TimerMode::Focus,
            remaining_ms: durations.ms(TimerMode::Focus),
            elapsed_ms: 0,
            running: false,
            last_tick: None,
            durations,
            completed_focus_sessions: 0,
            started_at: None,
        }
    }

    pub fn remaining_seconds(&self) -> f64 {
        self.remaining_ms as f64 / 1000.0
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(Durations::default())
    }
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
/// The caller is responsible for calling `tick()` periodically.
#[derive(Clone)]
pub struct TimerEngine {
    state: TimerState,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an engine on the system clock, paused in focus mode.
    pub fn new(durations: Durations) -> Self {
        Self::with_clock(durations, Arc::new(SystemClock))
    }

    pub fn with_clock(durations: Durations, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: TimerState::new(durations),
            clock,
        }
    }

    /// Restore a persisted state, repairing the running invariant if needed.
    pub fn from_state(state: TimerState, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: sanitize(state, now),
            clock,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_ms
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms
    }

    pub fn remaining_seconds(&self) -> f64 {
        self.state.remaining_seconds()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.state.elapsed_seconds()
    }

    pub fn durations(&self) -> Durations {
        self.state.durations
    }

    pub fn completed_focus_sessions(&self) -> u32 {
        self.state.completed_focus_sessions
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Configured length of the current mode (0 for the chronometer).
    pub fn total_ms(&self) -> u64 {
        self.state.durations.ms(self.state.mode)
    }

    /// 0.0 .. 1.0 progress within the current countdown.
    pub fn progress(&self) -> f64 {
        let total = self.total_ms();
        if total == 0 {
            return 0.0;
        }
        (1.0 - self.state.remaining_ms as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// `MM:SS` of the remaining (countdown) or elapsed (chronometer) time.
    pub fn display(&self) -> String {
        let secs = if self.state.mode.is_countdown() {
            self.state.remaining_ms.div_ceil(1000)
        } else {
            self.state.elapsed_ms / 1000
        };
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    /// Progress that a reset or mode switch would throw away right now.
    pub fn discarded_ms(&self) -> u64 {
        if self.state.started_at.is_none() {
            return 0;
        }
        match self.state.mode {
            TimerMode::Chronometer => self.state.elapsed_ms,
            _ => self.total_ms().saturating_sub(self.state.remaining_ms),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state.clone(),
            remaining_seconds: self.remaining_seconds(),
            elapsed_seconds: self.elapsed_seconds(),
            display: self.display(),
            progress: self.progress(),
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Flip between running and paused.
    pub fn toggle_running(&mut self) -> Option<Event> {
        let now = self.clock.now();
        let mode = self.state.mode;
        if self.state.running {
            self.state.running = false;
            self.state.last_tick = None;
            debug!(%mode, remaining_ms = self.state.remaining_ms, "timer paused");
            Some(Event::TimerPaused {
                mode,
                remaining_ms: self.state.remaining_ms,
                elapsed_ms: self.state.elapsed_ms,
                at: now,
            })
        } else {
            self.state.running = true;
            self.state.last_tick = Some(now);
            if self.state.started_at.is_none() {
                self.state.started_at = Some(now);
            }
            debug!(%mode, remaining_ms = self.state.remaining_ms, "timer started");
            Some(Event::TimerStarted {
                mode,
                remaining_ms: self.state.remaining_ms,
                elapsed_ms: self.state.elapsed_ms,
                at: now,
            })
        }
    }

    /// Stop and return the current mode to its starting value. Never records a session.
    pub fn reset(&mut self) -> Option<Event> {
        let mode = self.state.mode;
        self.rearm(mode);
        debug!(%mode, "timer reset");
        Some(Event::TimerReset {
            mode,
            at: self.clock.now(),
        })
    }

    /// Stop, discard progress and arm `mode` at its full duration.
    pub fn switch_mode(&mut self, mode: TimerMode) -> Option<Event> {
        let from = self.state.mode;
        let discarded_ms = self.discarded_ms();
        self.rearm(mode);
        debug!(%from, to = %mode, discarded_ms, "mode switched");
        Some(Event::ModeSwitched {
            from,
            to: mode,
            discarded_ms,
            at: self.clock.now(),
        })
    }

    /// Call periodically. Returns a completion event when a countdown reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        let now = self.clock.now();
        let delta_ms = match self.state.last_tick {
            Some(last) => (now - last).num_milliseconds().max(0) as u64,
            None => 0,
        };

        match self.state.mode {
            TimerMode::Chronometer => {
                self.state.elapsed_ms = self.state.elapsed_ms.saturating_add(delta_ms);
            }
            _ => {
                self.state.remaining_ms = self.state.remaining_ms.saturating_sub(delta_ms);
                if self.state.remaining_ms == 0 {
                    return Some(self.finish(now));
                }
            }
        }

        self.state.last_tick = Some(now);
        None
    }

    /// Finish the current interval now ("complete now").
    pub fn complete(&mut self) -> Option<Event> {
        let now = self.clock.now();
        if self.state.running && self.state.mode == TimerMode::Chronometer {
            // Count the time since the last frame before rounding.
            if let Some(last) = self.state.last_tick {
                let delta_ms = (now - last).num_milliseconds().max(0) as u64;
                self.state.elapsed_ms = self.state.elapsed_ms.saturating_add(delta_ms);
            }
        }
        Some(self.finish(now))
    }

    /// Replace the configured durations (clamped). An untouched countdown
    /// picks up its new length immediately.
    pub fn set_durations(&mut self, durations: Durations) {
        self.state.durations = durations.clamped();
        if !self.state.running && self.state.started_at.is_none() && self.state.mode.is_countdown() {
            self.state.remaining_ms = self.total_ms();
        }
    }

    /// Apply a state written by another view. Ignored while running so an
    /// in-progress countdown can never be overwritten.
    pub fn apply_external(&mut self, incoming: TimerState) -> Option<Event> {
        if self.state.running {
            debug!("ignoring external timer state while running");
            return None;
        }
        let now = self.clock.now();
        self.state = sanitize(incoming, now);
        Some(Event::ExternalStateApplied {
            mode: self.state.mode,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish(&mut self, now: DateTime<Utc>) -> Event {
        let mode = self.state.mode;
        let duration_seconds = match mode {
            TimerMode::Chronometer => (self.state.elapsed_ms + 500) / 1000,
            _ => self.state.durations.secs(mode),
        };
        let started_at = self
            .state
            .started_at
            .unwrap_or_else(|| earlier_by_ms(now, duration_seconds.saturating_mul(1000)));

        self.rearm(mode);

        if duration_seconds == 0 {
            debug!(%mode, "completion suppressed: nothing counted");
            return Event::CompletionSuppressed { mode, at: now };
        }

        if mode == TimerMode::Focus {
            self.state.completed_focus_sessions += 1;
        }
        info!(%mode, duration_seconds, "session completed");

        Event::SessionCompleted {
            draft: SessionDraft {
                mode,
                duration_seconds,
                started_at,
                completed_at: now,
                was_completed: true,
                task_id: None,
            },
            completed_focus_sessions: self.state.completed_focus_sessions,
            at: now,
        }
    }

    fn rearm(&mut self, mode: TimerMode) {
        self.state.mode = mode;
        self.state.running = false;
        self.state.last_tick = None;
        self.state.started_at = None;
        self.state.elapsed_ms = 0;
        self.state.remaining_ms = self.state.durations.ms(mode);
    }
}

fn sanitize(mut state: TimerState, now: DateTime<Utc>) -> TimerState {
    state.durations = state.durations.clamped();
    if !state.mode.is_countdown() {
        state.remaining_ms = 0;
    }
    if state.running {
        state.last_tick.get_or_insert(now);
        state.started_at.get_or_insert(now);
    } else {
        state.last_tick = None;
    }
    state
}
