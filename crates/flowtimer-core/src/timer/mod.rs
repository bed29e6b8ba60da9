mod auto_start;
mod engine;
mod focus;
mod mode;
mod tick_loop;

pub use auto_start::{next_mode, AutoStartConfig, AutoStartController, AutoStartInputs, PendingTransition};
pub use engine::{TimerEngine, TimerState};
pub use focus::{FocusTimer, TimerOutcome, TimerSnapshot};
pub use mode::{Durations, TimerMode};
pub use tick_loop::{TickLoop, DEFAULT_FRAME};
