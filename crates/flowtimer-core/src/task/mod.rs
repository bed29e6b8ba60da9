//! Task collaborator contract.
//!
//! Tasks live outside the timer core. The core only needs to bump a
//! task's pomodoro counter when a focus session finishes while that task
//! is active, and to know which tasks were completed (and when) for the
//! summary statistics. [`TaskTracker`] is the seam; the SQLite store in
//! `storage` is one implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed_pomodoros: u32,
    /// Task that collects chronometer time rather than pomodoros.
    #[serde(default)]
    pub is_chrono_log: bool,
    #[serde(default)]
    pub chrono_duration_seconds: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Completion time of a finished task.
    pub fn completion(&self) -> Option<DateTime<Utc>> {
        if self.completed {
            self.completed_at
        } else {
            None
        }
    }
}

/// What the timer core calls on the task collaborator.
pub trait TaskTracker: Send + Sync {
    fn increment_completed_pomodoros(&self, task_id: &str) -> Result<(), CoreError>;

    /// Credit chronometer time to a task, used when a chronometer session
    /// is assigned to it after the fact.
    fn add_chrono_seconds(&self, task_id: &str, seconds: u64) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn completion_requires_completed_flag() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut task = Task {
            id: "t".into(),
            title: "Write report".into(),
            completed_pomodoros: 0,
            is_chrono_log: false,
            chrono_duration_seconds: 0,
            completed: false,
            completed_at: Some(at),
            created_at: at,
        };
        assert_eq!(task.completion(), None);
        task.completed = true;
        assert_eq!(task.completion(), Some(at));
    }
}
