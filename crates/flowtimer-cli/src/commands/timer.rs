use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use flowtimer_core::{FocusTimer, TickLoop, TimerMode, TimerOutcome};
use tokio::sync::Mutex;

use super::{print_json, report, App, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start (or resume) the current mode
    Start,
    /// Pause the running timer
    Pause,
    /// Flip between running and paused
    Toggle,
    /// Stop and re-arm the current mode
    Reset,
    /// Switch mode, discarding progress (focus, short, long, chrono)
    Mode {
        mode: TimerMode,
    },
    /// Finish the current interval now
    Complete,
    /// Credit focus sessions to a task
    Focus {
        /// Task ID; omit to clear
        task_id: Option<String>,
    },
    /// Print current timer state as JSON
    Status,
    /// Drive the timer in the foreground until it stops or Ctrl-C
    Run {
        /// Frame length in milliseconds (defaults to tick.frame_ms)
        #[arg(long)]
        frame_ms: Option<u64>,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    let app = App::open()?;
    let mut timer = app.focus_timer()?;

    // Whatever happened since the last invocation counts first.
    report(&timer.tick())?;
    report(&timer.flush_writes())?;

    match action {
        TimerAction::Start => {
            if !timer.is_running() {
                report(&timer.toggle_running())?;
            }
        }
        TimerAction::Pause => {
            if timer.is_running() {
                report(&timer.toggle_running())?;
            }
        }
        TimerAction::Toggle => report(&timer.toggle_running())?,
        TimerAction::Reset => report(&timer.reset())?,
        TimerAction::Mode { mode } => report(&timer.switch_mode(mode))?,
        TimerAction::Complete => report(&timer.complete())?,
        TimerAction::Focus { task_id } => {
            if let Some(id) = task_id.as_deref() {
                if app.tasks.get(id)?.is_none() {
                    return Err(format!("task not found: {id}").into());
                }
            }
            timer.set_active_task(task_id)?;
            print_json(&timer.snapshot())?;
        }
        TimerAction::Status => print_json(&timer.engine().snapshot())?,
        TimerAction::Run { frame_ms } => {
            let frame = frame_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| app.config.frame());
            if !timer.is_running() {
                report(&timer.toggle_running())?;
            }
            timer = drive(timer, frame)?;
        }
    }

    app.save_timer(&mut timer)?;
    Ok(())
}

/// Run the tick loop on a fresh runtime and hand the timer back.
fn drive(timer: FocusTimer, frame: Duration) -> CliResult<FocusTimer> {
    let runtime = tokio::runtime::Runtime::new()?;
    let shared = Arc::new(Mutex::new(timer));

    let joined = runtime.block_on(async {
        let mut ticker = TickLoop::new(frame);
        ticker.start(shared.clone(), |outcome: TimerOutcome| {
            if let Err(e) = report(&outcome) {
                eprintln!("warning: {e}");
            }
        });
        let joined = tokio::select! {
            joined = ticker.join() => joined,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted; timer state saved");
                Ok(())
            }
        };
        ticker.stop();
        joined
    });
    // Shutting the runtime down drops the aborted task and its handle on the timer.
    drop(runtime);
    joined.map_err(|e| format!("tick loop failed: {e}"))?;

    let timer = Arc::try_unwrap(shared)
        .map_err(|_| "tick loop still holds the timer")?
        .into_inner();
    Ok(timer)
}
