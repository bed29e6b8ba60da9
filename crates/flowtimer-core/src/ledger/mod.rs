//! Session ledger boundary.
//!
//! The timer hands finished intervals to a [`SessionLedger`], which is
//! implemented by whatever record store the host provides. The core keeps
//! its own [`SessionHistory`] and updates it optimistically, so a store
//! outage never stalls the timer.

mod history;

pub use history::SessionHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, ValidationError};
use crate::timer::TimerMode;

/// Session creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub mode: TimerMode,
    /// Actual counted duration, not the configured one.
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// `false` for interrupted or manually stopped sessions.
    pub was_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl SessionDraft {
    /// Longest interval one session may cover (a leap year).
    pub const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

    /// Draft for time the operator abandoned before it finished.
    pub fn interrupted(
        mode: TimerMode,
        duration_seconds: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mode,
            duration_seconds,
            started_at,
            completed_at,
            was_completed: false,
            task_id: None,
        }
    }

    pub fn with_task(mut self, task_id: Option<String>) -> Self {
        self.task_id = task_id;
        self
    }
}

/// A persisted session record.
///
/// Immutable once created except for `task_id`, which can be reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub mode: TimerMode,
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub was_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Session {
    pub fn from_draft(id: impl Into<String>, draft: SessionDraft) -> Self {
        Self {
            id: id.into(),
            mode: draft.mode,
            duration_seconds: draft.duration_seconds,
            started_at: draft.started_at,
            completed_at: draft.completed_at,
            was_completed: draft.was_completed,
            task_id: draft.task_id,
        }
    }

    pub fn to_draft(&self) -> SessionDraft {
        SessionDraft {
            mode: self.mode,
            duration_seconds: self.duration_seconds,
            started_at: self.started_at,
            completed_at: self.completed_at,
            was_completed: self.was_completed,
            task_id: self.task_id.clone(),
        }
    }
}

/// Append/query contract of the external session record store.
pub trait SessionLedger: Send + Sync {
    /// Persist a session and return the canonical stored record.
    fn append(&self, draft: &SessionDraft) -> Result<Session, LedgerError>;

    /// All sessions of the current operator.
    fn list(&self) -> Result<Vec<Session>, LedgerError>;

    /// Replace the weak task reference of an existing session.
    fn reassign_task(
        &self,
        session_id: &str,
        task_id: Option<&str>,
    ) -> Result<Session, LedgerError>;

    fn remove(&self, session_id: &str) -> Result<(), LedgerError>;
}

/// Store keys are UUIDs; anything else is a data integrity problem.
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

pub fn validate_id(kind: &'static str, id: &str) -> Result<(), ValidationError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ValidationError::MalformedId {
            kind,
            id: id.to_string(),
        })
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_roundtrips_through_draft() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 25, 0).unwrap();
        let draft = SessionDraft {
            mode: TimerMode::Focus,
            duration_seconds: 1500,
            started_at: at - chrono::Duration::seconds(1500),
            completed_at: at,
            was_completed: true,
            task_id: None,
        };
        let session = Session::from_draft(new_id(), draft.clone());
        assert_eq!(session.to_draft(), draft);
    }

    #[test]
    fn id_validation() {
        assert!(is_valid_id(&new_id()));
        assert!(!is_valid_id("task-42"));
        assert!(validate_id("task", "").is_err());
    }

    #[test]
    fn draft_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let draft = SessionDraft::interrupted(TimerMode::ShortBreak, 42, at, at);
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["durationSeconds"], 42);
        assert_eq!(json["wasCompleted"], false);
        assert_eq!(json["mode"], "shortBreak");
        assert!(json.get("taskId").is_none());
    }
}
