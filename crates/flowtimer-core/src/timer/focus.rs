//! The focus timer: engine, auto-start policy, session history and the
//! external collaborators wired together.
//!
//! [`TimerEngine`] only knows about time. `FocusTimer` is what a host
//! drives: it forwards completions to the ledger, credits the active task,
//! fires queued auto-starts and keeps the in-memory history that the
//! analytics read. Ledger and task errors never undo a local transition;
//! they come back in [`TimerOutcome::errors`].
//!
//! [`FocusTimer::tick`] runs on the frame path and does no I/O: the
//! records it produces are queued as [`DeferredWrite`]s for the host to run
//! elsewhere and hand back through [`FocusTimer::settle`]. Every other
//! command writes through to the collaborators directly.

use std::fmt;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auto_start::{AutoStartConfig, AutoStartController, AutoStartInputs, PendingTransition};
use super::engine::{TimerEngine, TimerState};
use super::mode::{Durations, TimerMode};
use crate::clock::earlier_by_ms;
use crate::error::{CoreError, LedgerError, ValidationError};
use crate::events::Event;
use crate::ledger::{validate_id, Session, SessionDraft, SessionHistory, SessionLedger};
use crate::stats::{self, StreakData, SummaryStats, WeeklyHeatmap};
use crate::task::{Task, TaskTracker};

/// Everything one operation produced.
#[derive(Debug, Default)]
pub struct TimerOutcome {
    pub events: Vec<Event>,
    /// Session recorded or updated by this operation, as held in history.
    pub session: Option<Session>,
    /// Non-fatal collaborator failures.
    pub errors: Vec<CoreError>,
}

impl TimerOutcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.session.is_none() && self.errors.is_empty()
    }

    pub fn completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { .. }))
    }

    /// Fold a later outcome into this one.
    pub fn merge(&mut self, later: TimerOutcome) {
        self.events.extend(later.events);
        if later.session.is_some() {
            self.session = later.session;
        }
        self.errors.extend(later.errors);
    }

    fn push(&mut self, event: Option<Event>) {
        if let Some(event) = event {
            self.events.push(event);
        }
    }
}

/// Collaborator call left over by [`FocusTimer::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredWrite {
    /// Persist a session already held in history under `provisional_id`.
    AppendSession {
        provisional_id: String,
        draft: SessionDraft,
    },
    CreditPomodoro { task_id: String },
}

/// A [`DeferredWrite`] after it ran.
#[derive(Debug)]
pub enum SettledWrite {
    Appended {
        provisional_id: String,
        result: Result<Session, LedgerError>,
    },
    Credited {
        task_id: String,
        result: Result<(), CoreError>,
    },
}

/// The collaborators deferred writes run against. `Send` and cheap to
/// clone, so it can move onto a blocking thread.
#[derive(Clone)]
pub struct WriteTarget {
    ledger: Arc<dyn SessionLedger>,
    tasks: Option<Arc<dyn TaskTracker>>,
}

impl WriteTarget {
    /// Perform the write. Blocks on the collaborators.
    pub fn run(&self, write: DeferredWrite) -> SettledWrite {
        match write {
            DeferredWrite::AppendSession {
                provisional_id,
                draft,
            } => SettledWrite::Appended {
                provisional_id,
                result: self.ledger.append(&draft),
            },
            DeferredWrite::CreditPomodoro { task_id } => {
                let result = match &self.tasks {
                    Some(tasks) => tasks.increment_completed_pomodoros(&task_id),
                    None => Ok(()),
                };
                SettledWrite::Credited { task_id, result }
            }
        }
    }
}

impl fmt::Debug for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTarget")
            .field("tasks", &self.tasks.is_some())
            .finish_non_exhaustive()
    }
}

/// Whether collaborator calls happen now or are queued for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Writes {
    Inline,
    Deferred,
}

/// Persistable view of a [`FocusTimer`], used to carry the timer across
/// processes and between views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    #[serde(default)]
    pub active_task: Option<String>,
    #[serde(default)]
    pub pending_auto_start: Option<PendingTransition>,
}

pub struct FocusTimer {
    engine: TimerEngine,
    auto_start: AutoStartController,
    history: SessionHistory,
    ledger: Arc<dyn SessionLedger>,
    tasks: Option<Arc<dyn TaskTracker>>,
    active_task: Option<String>,
    /// Log an interrupted session when a mode switch throws progress away.
    record_abandoned: bool,
    deferred: Vec<DeferredWrite>,
}

impl fmt::Debug for FocusTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusTimer")
            .field("engine", &self.engine)
            .field("auto_start", &self.auto_start)
            .field("history_len", &self.history.len())
            .field("active_task", &self.active_task)
            .field("record_abandoned", &self.record_abandoned)
            .field("deferred_writes", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl FocusTimer {
    pub fn new(
        engine: TimerEngine,
        ledger: Arc<dyn SessionLedger>,
        auto_start: AutoStartConfig,
    ) -> Self {
        Self {
            engine,
            auto_start: AutoStartController::new(auto_start),
            history: SessionHistory::new(),
            ledger,
            tasks: None,
            active_task: None,
            record_abandoned: false,
            deferred: Vec::new(),
        }
    }

    pub fn with_task_tracker(mut self, tasks: Arc<dyn TaskTracker>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_record_abandoned(mut self, record_abandoned: bool) -> Self {
        self.record_abandoned = record_abandoned;
        self
    }

    /// Seed the in-memory history from the ledger. Returns the number of
    /// sessions kept after integrity filtering.
    pub fn load_history(&mut self) -> Result<usize, LedgerError> {
        self.history = SessionHistory::load(self.ledger.as_ref())?;
        info!(sessions = self.history.len(), "session history loaded");
        Ok(self.history.len())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn sessions(&self) -> &[Session] {
        self.history.sessions()
    }

    pub fn auto_start(&self) -> &AutoStartController {
        &self.auto_start
    }

    pub fn active_task(&self) -> Option<&str> {
        self.active_task.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Whether a tick loop still has work: a running timer or a queued auto-start.
    pub fn should_keep_ticking(&self) -> bool {
        self.engine.is_running() || self.auto_start.pending().is_some()
    }

    pub fn has_deferred_writes(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn write_target(&self) -> WriteTarget {
        WriteTarget {
            ledger: self.ledger.clone(),
            tasks: self.tasks.clone(),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.engine.state().clone(),
            active_task: self.active_task.clone(),
            pending_auto_start: self.auto_start.pending().copied(),
        }
    }

    pub fn weekly_heatmap(&self, week_offset: i32) -> WeeklyHeatmap {
        stats::build_weekly_heatmap(self.sessions(), week_offset)
    }

    pub fn streak(&self) -> StreakData {
        stats::compute_streak(self.sessions())
    }

    pub fn summary(&self, tasks: &[Task]) -> SummaryStats {
        stats::compute_summary_stats(self.sessions(), tasks)
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Task credited with focus sessions from now on.
    pub fn set_active_task(&mut self, task_id: Option<String>) -> Result<(), ValidationError> {
        if let Some(id) = task_id.as_deref() {
            validate_id("task", id)?;
        }
        self.active_task = task_id;
        Ok(())
    }

    pub fn set_auto_start(&mut self, config: AutoStartConfig) {
        self.auto_start.set_config(config);
    }

    pub fn set_durations(&mut self, durations: Durations) {
        self.engine.set_durations(durations);
    }

    /// Restore a snapshot written by an earlier process.
    pub fn restore(&mut self, snapshot: TimerSnapshot) {
        self.engine = TimerEngine::from_state(snapshot.state, self.engine.clock());
        self.active_task = snapshot
            .active_task
            .filter(|id| match validate_id("task", id) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "dropping malformed active task");
                    false
                }
            });
        self.auto_start.restore(snapshot.pending_auto_start);
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn toggle_running(&mut self) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if self.engine.is_running() {
            // Count the time since the last frame before stopping.
            self.advance(&mut outcome, Writes::Inline);
            if !self.engine.is_running() {
                return outcome;
            }
        }
        outcome.push(self.engine.toggle_running());
        self.reevaluate(&mut outcome);
        outcome
    }

    pub fn reset(&mut self) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        outcome.push(self.engine.reset());
        self.reevaluate(&mut outcome);
        outcome
    }

    pub fn switch_mode(&mut self, mode: TimerMode) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if self.engine.is_running() {
            self.advance(&mut outcome, Writes::Inline);
        }
        let from = self.engine.mode();
        let started_at = self.engine.state().started_at;
        let discarded_ms = self.engine.discarded_ms();

        outcome.push(self.engine.switch_mode(mode));

        let discarded_secs = (discarded_ms + 500) / 1000;
        if self.record_abandoned && discarded_secs > 0 {
            let now = self.engine.now();
            let started_at = started_at.unwrap_or_else(|| earlier_by_ms(now, discarded_ms));
            let draft = SessionDraft::interrupted(from, discarded_secs, started_at, now)
                .with_task(self.task_for(from));
            info!(mode = %from, duration_seconds = discarded_secs, "recording abandoned session");
            self.persist(draft, &mut outcome, Writes::Inline);
        }

        self.reevaluate(&mut outcome);
        outcome
    }

    /// Finish the current interval now.
    pub fn complete(&mut self) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if self.engine.is_running() {
            self.advance(&mut outcome, Writes::Inline);
            if outcome.completed() {
                return outcome;
            }
        }
        let event = self.engine.complete();
        self.handle(event, &mut outcome, Writes::Inline);
        outcome
    }

    /// One frame: fire a due auto-start, then advance the engine.
    ///
    /// A completion lands in history right away; its ledger append and task
    /// credit are queued, see [`FocusTimer::take_deferred_writes`].
    pub fn tick(&mut self) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        let now = self.engine.now();
        if let Some(next) = self.auto_start.take_due(now) {
            info!(%next, "auto-start firing");
            outcome.events.push(Event::AutoStartFired { next, at: now });
            outcome.push(self.engine.switch_mode(next));
            outcome.push(self.engine.toggle_running());
        }
        self.advance(&mut outcome, Writes::Deferred);
        outcome
    }

    /// Hand the queued collaborator calls to the host, oldest first.
    pub fn take_deferred_writes(&mut self) -> Vec<DeferredWrite> {
        mem::take(&mut self.deferred)
    }

    /// Fold the result of a deferred write back into local state.
    pub fn settle(&mut self, settled: SettledWrite) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        match settled {
            SettledWrite::Appended {
                provisional_id,
                result,
            } => self.reconcile_append(&provisional_id, result, &mut outcome),
            SettledWrite::Credited { task_id, result } => {
                if let Err(err) = result {
                    warn!(error = %err, task_id = %task_id, "pomodoro not credited");
                    outcome.errors.push(err);
                }
            }
        }
        outcome
    }

    /// Run every queued write on the calling thread.
    pub fn flush_writes(&mut self) -> TimerOutcome {
        let target = self.write_target();
        let mut outcome = TimerOutcome::default();
        for write in self.take_deferred_writes() {
            let settled = target.run(write);
            outcome.merge(self.settle(settled));
        }
        outcome
    }

    /// Apply timer state written by another view; ignored while running.
    pub fn apply_external(&mut self, state: TimerState) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if let Some(event) = self.engine.apply_external(state) {
            outcome.events.push(event);
            self.reevaluate(&mut outcome);
        }
        outcome
    }

    /// Record time the operator gave up on.
    pub fn log_interrupted(
        &mut self,
        mode: TimerMode,
        duration_seconds: u64,
        started_at: Option<DateTime<Utc>>,
    ) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if duration_seconds > SessionDraft::MAX_DURATION_SECS {
            outcome.errors.push(
                ValidationError::InvalidValue {
                    field: "duration_seconds".to_string(),
                    message: format!(
                        "{duration_seconds} exceeds the {} second limit",
                        SessionDraft::MAX_DURATION_SECS
                    ),
                }
                .into(),
            );
            return outcome;
        }
        let now = self.engine.now();
        let started_at =
            started_at.unwrap_or_else(|| earlier_by_ms(now, duration_seconds * 1000));
        let draft = SessionDraft::interrupted(mode, duration_seconds, started_at, now)
            .with_task(self.task_for(mode));
        self.persist(draft, &mut outcome, Writes::Inline);
        outcome
    }

    /// Point a session at a task (or detach it with `None`).
    ///
    /// Chronometer sessions credit their duration to the newly assigned task.
    pub fn assign_session_to_task(
        &mut self,
        session_id: &str,
        task_id: Option<&str>,
    ) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        let valid = validate_id("session", session_id)
            .and_then(|_| task_id.map_or(Ok(()), |id| validate_id("task", id)));
        if let Err(err) = valid {
            outcome.errors.push(err.into());
            return outcome;
        }
        let Some(previous) = self.history.get(session_id).cloned() else {
            outcome
                .errors
                .push(LedgerError::NotFound(session_id.to_string()).into());
            return outcome;
        };

        self.history
            .set_task(session_id, task_id.map(str::to_string));
        match self.ledger.reassign_task(session_id, task_id) {
            Ok(stored) => {
                self.history.reconcile(session_id, stored);
            }
            Err(err) => {
                warn!(error = %err, session_id, "task reassignment not persisted");
                outcome.errors.push(err.into());
            }
        }
        outcome.session = self.history.get(session_id).cloned();

        if let (TimerMode::Chronometer, Some(task), Some(tracker)) =
            (previous.mode, task_id, self.tasks.as_ref())
        {
            if previous.task_id.as_deref() != Some(task) {
                if let Err(err) = tracker.add_chrono_seconds(task, previous.duration_seconds) {
                    warn!(error = %err, task_id = task, "chrono time not credited");
                    outcome.errors.push(err);
                }
            }
        }
        outcome
    }

    pub fn remove_session(&mut self, session_id: &str) -> TimerOutcome {
        let mut outcome = TimerOutcome::default();
        if let Err(err) = validate_id("session", session_id) {
            outcome.errors.push(err.into());
            return outcome;
        }
        outcome.session = self.history.remove(session_id);
        if let Err(err) = self.ledger.remove(session_id) {
            warn!(error = %err, session_id, "session removal not persisted");
            outcome.errors.push(err.into());
        }
        outcome
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn advance(&mut self, outcome: &mut TimerOutcome, writes: Writes) {
        let event = self.engine.tick();
        self.handle(event, outcome, writes);
    }

    fn handle(&mut self, event: Option<Event>, outcome: &mut TimerOutcome, writes: Writes) {
        match event {
            Some(Event::SessionCompleted {
                draft,
                completed_focus_sessions,
                at,
            }) => {
                let mode = draft.mode;
                let draft = draft.with_task(self.task_for(mode));
                outcome.events.push(Event::SessionCompleted {
                    draft: draft.clone(),
                    completed_focus_sessions,
                    at,
                });
                self.persist(draft, outcome, writes);

                if mode == TimerMode::Focus {
                    self.credit_active_task(outcome, writes);
                }

                // The completed interval is the zero-remaining window the
                // policy reacts to, even though the engine has re-armed.
                let inputs = AutoStartInputs {
                    mode,
                    running: false,
                    remaining_ms: 0,
                    completed_focus_sessions,
                };
                outcome.push(self.auto_start.evaluate(inputs, at));
            }
            Some(other) => outcome.events.push(other),
            None => {}
        }
    }

    /// Optimistic append: history first, then the ledger.
    fn persist(&mut self, draft: SessionDraft, outcome: &mut TimerOutcome, writes: Writes) {
        let provisional_id = self.history.record_optimistic(draft.clone());
        match writes {
            Writes::Inline => {
                let result = self.ledger.append(&draft);
                self.reconcile_append(&provisional_id, result, outcome);
            }
            Writes::Deferred => {
                outcome.session = self.history.get(&provisional_id).cloned();
                self.deferred.push(DeferredWrite::AppendSession {
                    provisional_id,
                    draft,
                });
            }
        }
    }

    fn reconcile_append(
        &mut self,
        provisional_id: &str,
        result: Result<Session, LedgerError>,
        outcome: &mut TimerOutcome,
    ) {
        match result {
            Ok(stored) => {
                self.history.reconcile(provisional_id, stored.clone());
                outcome.session = Some(stored);
            }
            Err(err) => {
                warn!(error = %err, "session not persisted; keeping it locally");
                outcome.session = self.history.get(provisional_id).cloned();
                outcome.errors.push(err.into());
            }
        }
    }

    fn credit_active_task(&mut self, outcome: &mut TimerOutcome, writes: Writes) {
        let (Some(task), Some(tracker)) = (self.active_task.clone(), self.tasks.as_ref()) else {
            return;
        };
        match writes {
            Writes::Inline => {
                if let Err(err) = tracker.increment_completed_pomodoros(&task) {
                    warn!(error = %err, task_id = %task, "pomodoro not credited");
                    outcome.errors.push(err);
                }
            }
            Writes::Deferred => self.deferred.push(DeferredWrite::CreditPomodoro { task_id: task }),
        }
    }

    /// Only focus time is attributed to the active task automatically.
    fn task_for(&self, mode: TimerMode) -> Option<String> {
        if mode == TimerMode::Focus {
            self.active_task.clone()
        } else {
            None
        }
    }

    fn reevaluate(&mut self, outcome: &mut TimerOutcome) {
        let state = self.engine.state();
        let inputs = AutoStartInputs {
            mode: state.mode,
            running: state.running,
            remaining_ms: state.remaining_ms,
            completed_focus_sessions: state.completed_focus_sessions,
        };
        let now = self.engine.now();
        outcome.push(self.auto_start.evaluate(inputs, now));
    }
}
