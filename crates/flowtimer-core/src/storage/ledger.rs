//! SQLite-backed session ledger.
//!
//! Assigns UUID v4 identifiers and stores timestamps as RFC 3339 truncated
//! to whole seconds; the record handed back by `append` is already in that
//! normalized form so it equals what `list` later returns.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, warn};

use super::Database;
use crate::error::{LedgerError, ValidationError};
use crate::ledger::{new_id, validate_id, Session, SessionDraft, SessionLedger};
use crate::timer::TimerMode;

const SELECT_SESSION: &str = "SELECT id, mode, duration_seconds, started_at, completed_at, was_completed, task_id
     FROM sessions";

#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Database,
}

/// Row as stored, before any parsing.
struct RawSession {
    id: String,
    mode: String,
    duration_seconds: i64,
    started_at: String,
    completed_at: String,
    was_completed: bool,
    task_id: Option<String>,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            mode: row.get(1)?,
            duration_seconds: row.get(2)?,
            started_at: row.get(3)?,
            completed_at: row.get(4)?,
            was_completed: row.get(5)?,
            task_id: row.get(6)?,
        })
    }

    fn parse(self) -> Result<Session, String> {
        let mode: TimerMode = self.mode.parse().map_err(|e| format!("{e}"))?;
        Ok(Session {
            mode,
            duration_seconds: self.duration_seconds.max(0) as u64,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: parse_timestamp(&self.completed_at)?,
            was_completed: self.was_completed,
            task_id: self.task_id,
            id: self.id,
        })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{raw}': {e}"))
}

/// Whole-second precision, as stored.
fn normalize(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn fetch(&self, session_id: &str) -> Result<Session, LedgerError> {
        let raw = self
            .db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("{SELECT_SESSION} WHERE id = ?1"),
                    params![session_id],
                    RawSession::from_row,
                )
                .optional()
            })?
            .ok_or_else(|| LedgerError::NotFound(session_id.to_string()))?;
        raw.parse().map_err(LedgerError::Unavailable)
    }
}

impl SessionLedger for SqliteLedger {
    fn append(&self, draft: &SessionDraft) -> Result<Session, LedgerError> {
        if let Some(task_id) = draft.task_id.as_deref() {
            validate_id("task", task_id)?;
        }
        let duration_seconds = i64::try_from(draft.duration_seconds).map_err(|_| {
            ValidationError::InvalidValue {
                field: "duration_seconds".to_string(),
                message: format!("{} does not fit the store", draft.duration_seconds),
            }
        })?;
        let mut session = Session::from_draft(new_id(), draft.clone());
        session.started_at = normalize(session.started_at);
        session.completed_at = normalize(session.completed_at);

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, mode, duration_seconds, started_at, completed_at, was_completed, task_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id,
                    session.mode.as_str(),
                    duration_seconds,
                    format_timestamp(&session.started_at),
                    format_timestamp(&session.completed_at),
                    session.was_completed,
                    session.task_id,
                ],
            )
        })?;
        debug!(id = %session.id, mode = %session.mode, "session appended");
        Ok(session)
    }

    fn list(&self) -> Result<Vec<Session>, LedgerError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_SESSION} ORDER BY completed_at, id"))?;
            let rows = stmt
                .query_map([], RawSession::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match raw.parse() {
                    Ok(session) => Some(session),
                    Err(reason) => {
                        warn!(id, %reason, "skipping unreadable session row");
                        None
                    }
                }
            })
            .collect())
    }

    fn reassign_task(&self, session_id: &str, task_id: Option<&str>) -> Result<Session, LedgerError> {
        validate_id("session", session_id)?;
        if let Some(task_id) = task_id {
            validate_id("task", task_id)?;
        }
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET task_id = ?1 WHERE id = ?2",
                params![task_id, session_id],
            )
        })?;
        if changed == 0 {
            return Err(LedgerError::NotFound(session_id.to_string()));
        }
        self.fetch(session_id)
    }

    fn remove(&self, session_id: &str) -> Result<(), LedgerError> {
        validate_id("session", session_id)?;
        let removed = self
            .db
            .with_conn(|conn| conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id]))?;
        if removed == 0 {
            return Err(LedgerError::NotFound(session_id.to_string()));
        }
        Ok(())
    }
}
