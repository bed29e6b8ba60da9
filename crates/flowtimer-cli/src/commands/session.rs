use chrono::{DateTime, Utc};
use clap::Subcommand;
use flowtimer_core::TimerMode;

use super::{print_json, report, App, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions, oldest first
    List {
        /// Only the most recent N sessions
        #[arg(long)]
        last: Option<usize>,
    },
    /// Record time given up on as an interrupted session
    Log {
        /// Mode the time was spent in
        #[arg(long, default_value = "focus")]
        mode: TimerMode,
        /// Counted duration in seconds
        #[arg(long)]
        seconds: u64,
        /// When the interval started (RFC 3339); defaults to now minus the duration
        #[arg(long)]
        started_at: Option<DateTime<Utc>>,
    },
    /// Attach a session to a task, or detach it
    Assign {
        session_id: String,
        /// Task ID; omit to detach
        #[arg(long)]
        task: Option<String>,
    },
    /// Delete a session
    Remove {
        session_id: String,
    },
}

pub fn run(action: SessionAction) -> CliResult {
    let app = App::open()?;
    let mut timer = app.focus_timer()?;

    match action {
        SessionAction::List { last } => {
            let sessions = timer.sessions();
            let skip = last.map_or(0, |n| sessions.len().saturating_sub(n));
            print_json(&sessions[skip..])?;
            return Ok(());
        }
        SessionAction::Log {
            mode,
            seconds,
            started_at,
        } => {
            let outcome = timer.log_interrupted(mode, seconds, started_at);
            fail_on_rejection(&outcome)?;
            report(&outcome)?;
            if let Some(session) = &outcome.session {
                print_json(session)?;
            }
        }
        SessionAction::Assign { session_id, task } => {
            let outcome = timer.assign_session_to_task(&session_id, task.as_deref());
            fail_on_rejection(&outcome)?;
            report(&outcome)?;
            if let Some(session) = &outcome.session {
                print_json(session)?;
            }
        }
        SessionAction::Remove { session_id } => {
            let outcome = timer.remove_session(&session_id);
            fail_on_rejection(&outcome)?;
            report(&outcome)?;
            println!("removed {session_id}");
        }
    }

    app.save_timer(&mut timer)?;
    Ok(())
}

/// Nothing changed locally: surface the first error as the command's failure.
fn fail_on_rejection(outcome: &flowtimer_core::TimerOutcome) -> CliResult {
    if outcome.session.is_none() {
        if let Some(error) = outcome.errors.first() {
            return Err(error.to_string().into());
        }
    }
    Ok(())
}
