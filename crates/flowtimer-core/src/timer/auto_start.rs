//! Auto-start policy.
//!
//! After a countdown completes, the controller may queue the next mode
//! (a break after focus, focus after a break) to start after a short delay
//! so the finished state is visible first. It owns no timer state: it is
//! fed the relevant inputs on every change and keeps at most one pending
//! transition, cancelling it as soon as the inputs move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mode::TimerMode;
use crate::clock::later_by_ms;
use crate::events::Event;

/// Auto-start configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStartConfig {
    #[serde(default)]
    pub auto_start_break: bool,
    #[serde(default)]
    pub auto_start_focus: bool,
    /// Every Nth completed focus session is followed by a long break.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    /// Delay before the queued transition fires.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_long_break_interval() -> u32 {
    4
}

fn default_delay_ms() -> u64 {
    1_000
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            auto_start_break: false,
            auto_start_focus: false,
            long_break_interval: default_long_break_interval(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl AutoStartConfig {
    pub const MIN_LONG_BREAK_INTERVAL: u32 = 2;
    /// One hour.
    pub const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

    pub fn normalized(mut self) -> Self {
        self.long_break_interval = self.long_break_interval.max(Self::MIN_LONG_BREAK_INTERVAL);
        self.delay_ms = self.delay_ms.min(Self::MAX_DELAY_MS);
        self
    }
}

/// The slice of timer state the policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStartInputs {
    pub mode: TimerMode,
    pub running: bool,
    pub remaining_ms: u64,
    pub completed_focus_sessions: u32,
}

/// A queued `switch_mode(next)` + `toggle_running()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub next: TimerMode,
    pub due_at: DateTime<Utc>,
    pub inputs: AutoStartInputs,
}

/// The auto-start rule on its own.
pub fn next_mode(inputs: &AutoStartInputs, config: &AutoStartConfig) -> Option<TimerMode> {
    if inputs.mode == TimerMode::Chronometer || inputs.running || inputs.remaining_ms > 0 {
        return None;
    }
    let interval = config.long_break_interval.max(AutoStartConfig::MIN_LONG_BREAK_INTERVAL);
    match inputs.mode {
        TimerMode::Focus if config.auto_start_break => {
            let completed = inputs.completed_focus_sessions;
            if completed > 0 && completed % interval == 0 {
                Some(TimerMode::LongBreak)
            } else {
                Some(TimerMode::ShortBreak)
            }
        }
        mode if mode.is_break() && config.auto_start_focus => Some(TimerMode::Focus),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoStartController {
    config: AutoStartConfig,
    pending: Option<PendingTransition>,
}

impl AutoStartController {
    pub fn new(config: AutoStartConfig) -> Self {
        Self {
            config: config.normalized(),
            pending: None,
        }
    }

    pub fn config(&self) -> &AutoStartConfig {
        &self.config
    }

    /// Replace the configuration; anything already queued is dropped.
    pub fn set_config(&mut self, config: AutoStartConfig) {
        self.config = config.normalized();
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    /// Restore a transition persisted by an earlier process.
    pub fn restore(&mut self, pending: Option<PendingTransition>) {
        self.pending = pending;
    }

    /// Re-evaluate the rule for new inputs.
    ///
    /// Unchanged inputs keep the pending transition; changed inputs cancel
    /// it and may queue a new one.
    pub fn evaluate(&mut self, inputs: AutoStartInputs, now: DateTime<Utc>) -> Option<Event> {
        let next = next_mode(&inputs, &self.config);

        if let Some(pending) = &self.pending {
            if pending.inputs == inputs && Some(pending.next) == next {
                return None;
            }
        }
        let cancelled = self.pending.take();

        match next {
            Some(next) => {
                let due_at = later_by_ms(now, self.config.delay_ms);
                debug!(%next, %due_at, "auto-start scheduled");
                self.pending = Some(PendingTransition {
                    next,
                    due_at,
                    inputs,
                });
                Some(Event::AutoStartScheduled { next, due_at })
            }
            None => cancelled.map(|pending| {
                debug!(next = %pending.next, "auto-start cancelled");
                Event::AutoStartCancelled {
                    next: pending.next,
                    at: now,
                }
            }),
        }
    }

    /// Take the pending transition if it is due.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<TimerMode> {
        match self.pending {
            Some(pending) if pending.due_at <= now => {
                self.pending = None;
                Some(pending.next)
            }
            _ => None,
        }
    }
}
