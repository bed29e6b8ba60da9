//! Task management commands for CLI.

use clap::Subcommand;

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Collect chronometer time instead of pomodoros
        #[arg(long)]
        chrono: bool,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Mark a task as completed
    Complete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let app = App::open()?;

    match action {
        TaskAction::Add { title, chrono } => {
            let task = app.tasks.create(&title, chrono)?;
            print_json(&task)?;
        }
        TaskAction::List { all } => {
            let tasks: Vec<_> = app
                .tasks
                .list()?
                .into_iter()
                .filter(|t| all || !t.completed)
                .collect();
            print_json(&tasks)?;
        }
        TaskAction::Get { id } => match app.tasks.get(&id)? {
            Some(task) => print_json(&task)?,
            None => return Err(format!("task not found: {id}").into()),
        },
        TaskAction::Complete { id } => {
            let task = app.tasks.complete(&id)?;
            print_json(&task)?;
        }
    }
    Ok(())
}
