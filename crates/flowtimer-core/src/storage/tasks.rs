//! SQLite task store: the task collaborator the timer credits.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, warn};

use super::Database;
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, ValidationError};
use crate::ledger::{new_id, validate_id};
use crate::task::{Task, TaskTracker};

const SELECT_TASK: &str = "SELECT id, title, completed_pomodoros, is_chrono_log, chrono_duration_seconds,
            completed, completed_at, created_at
     FROM tasks";

#[derive(Clone)]
pub struct SqliteTaskStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTaskStore").field("db", &self.db).finish_non_exhaustive()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Option<Task>> {
    let id: String = row.get(0)?;
    let completed_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let Some(created_at) = parse_time(&created_at) else {
        warn!(id, "skipping task with unreadable created_at");
        return Ok(None);
    };
    Ok(Some(Task {
        id,
        title: row.get(1)?,
        completed_pomodoros: row.get::<_, i64>(2)?.max(0) as u32,
        is_chrono_log: row.get(3)?,
        chrono_duration_seconds: row.get::<_, i64>(4)?.max(0) as u64,
        completed: row.get(5)?,
        completed_at: completed_at.as_deref().and_then(parse_time),
        created_at,
    }))
}

impl SqliteTaskStore {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn create(&self, title: &str, is_chrono_log: bool) -> Result<Task, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            }
            .into());
        }
        let created_at = self.clock.now();
        let task = Task {
            id: new_id(),
            title: title.to_string(),
            completed_pomodoros: 0,
            is_chrono_log,
            chrono_duration_seconds: 0,
            completed: false,
            completed_at: None,
            created_at: parse_time(&timestamp(created_at)).unwrap_or(created_at),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, is_chrono_log, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![task.id, task.title, task.is_chrono_log, timestamp(task.created_at)],
            )
        })?;
        debug!(id = %task.id, "task created");
        Ok(task)
    }

    /// All tasks, oldest first. Rows with malformed identifiers are dropped.
    pub fn list(&self) -> Result<Vec<Task>, CoreError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_TASK} ORDER BY created_at, id"))?;
            let rows = stmt.query_map([], row_to_task)?.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows
            .into_iter()
            .flatten()
            .filter(|task| match validate_id("task", &task.id) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "dropping task");
                    false
                }
            })
            .collect())
    }

    pub fn get(&self, task_id: &str) -> Result<Option<Task>, CoreError> {
        validate_id("task", task_id)?;
        let row = self.db.with_conn(|conn| {
            conn.query_row(&format!("{SELECT_TASK} WHERE id = ?1"), params![task_id], row_to_task)
                .optional()
        })?;
        Ok(row.flatten())
    }

    pub fn complete(&self, task_id: &str) -> Result<Task, CoreError> {
        validate_id("task", task_id)?;
        let now = timestamp(self.clock.now());
        self.update(
            task_id,
            "UPDATE tasks SET completed = 1, completed_at = COALESCE(completed_at, ?2) WHERE id = ?1",
            &now,
        )?;
        self.get(task_id)?
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    fn update(&self, task_id: &str, sql: &str, arg: &dyn rusqlite::ToSql) -> Result<(), CoreError> {
        let changed = self
            .db
            .with_conn(|conn| conn.execute(sql, params![task_id, arg]))?;
        if changed == 0 {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    }
}

impl TaskTracker for SqliteTaskStore {
    fn increment_completed_pomodoros(&self, task_id: &str) -> Result<(), CoreError> {
        validate_id("task", task_id)?;
        self.update(
            task_id,
            "UPDATE tasks SET completed_pomodoros = completed_pomodoros + ?2 WHERE id = ?1",
            &1i64,
        )
    }

    fn add_chrono_seconds(&self, task_id: &str, seconds: u64) -> Result<(), CoreError> {
        validate_id("task", task_id)?;
        let seconds = i64::try_from(seconds).map_err(|_| ValidationError::InvalidValue {
            field: "seconds".to_string(),
            message: format!("{seconds} does not fit the store"),
        })?;
        self.update(
            task_id,
            "UPDATE tasks SET chrono_duration_seconds = chrono_duration_seconds + ?2 WHERE id = ?1",
            &seconds,
        )
    }
}
