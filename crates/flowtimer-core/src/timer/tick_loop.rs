//! Background frame loop for a shared [`FocusTimer`].
//!
//! The loop only decides *when* to look at the clock; how far the timer
//! moves is always measured from wall time by the engine, so a late or
//! skipped frame costs display smoothness but never accuracy.
//!
//! Ledger and task writes queued by a frame run on the blocking pool after
//! the timer lock is released, then settle back into the timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error};

use super::focus::{FocusTimer, TimerOutcome};

pub const DEFAULT_FRAME: Duration = Duration::from_millis(250);

/// Owns at most one ticking task. Dropping the loop stops it.
#[derive(Debug)]
pub struct TickLoop {
    handle: Option<JoinHandle<()>>,
    frame: Duration,
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME)
    }
}

impl TickLoop {
    pub fn new(frame: Duration) -> Self {
        Self {
            handle: None,
            frame: frame.max(Duration::from_millis(1)),
        }
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    /// Start ticking `timer`, replacing any loop already running.
    ///
    /// Every non-empty outcome is handed to `on_outcome`. The task ends by
    /// itself once the timer is stopped and no auto-start is queued.
    pub fn start<F>(&mut self, timer: Arc<Mutex<FocusTimer>>, mut on_outcome: F)
    where
        F: FnMut(TimerOutcome) + Send + 'static,
    {
        self.stop();
        let frame = self.frame;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval(frame);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let (mut outcome, writes, target) = {
                    let mut guard = timer.lock().await;
                    let outcome = guard.tick();
                    (outcome, guard.take_deferred_writes(), guard.write_target())
                };
                for write in writes {
                    let target = target.clone();
                    let settled = match task::spawn_blocking(move || target.run(write)).await {
                        Ok(settled) => settled,
                        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                        Err(err) => {
                            debug!(error = %err, "deferred write cancelled");
                            continue;
                        }
                    };
                    outcome.merge(timer.lock().await.settle(settled));
                }
                let keep_going = timer.lock().await.should_keep_ticking();
                if !outcome.is_empty() {
                    on_outcome(outcome);
                }
                if !keep_going {
                    debug!("tick loop idle, stopping");
                    break;
                }
            }
        }));
    }

    /// Abort the running task, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the loop to finish on its own.
    ///
    /// A loop that was stopped counts as finished; a loop that panicked
    /// returns the panic as an error.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        self.handle = None;
        match result {
            Err(err) if err.is_panic() => {
                error!(error = %err, "tick loop panicked");
                Err(err)
            }
            _ => Ok(()),
        }
    }
}

impl Drop for TickLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::events::Event;
    use crate::error::LedgerError;
    use crate::ledger::{new_id, Session, SessionDraft, SessionLedger};
    use crate::timer::{AutoStartConfig, Durations, TimerEngine, TimerMode};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex as StdMutex;

    /// Wall clock that follows tokio's (paused) time.
    struct TokioClock {
        base: DateTime<Utc>,
        origin: time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = time::Instant::now() - self.origin;
            self.base + chrono::Duration::from_std(elapsed).unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct MemoryLedger(StdMutex<Vec<Session>>);

    impl SessionLedger for MemoryLedger {
        fn append(&self, draft: &SessionDraft) -> Result<Session, LedgerError> {
            let session = Session::from_draft(new_id(), draft.clone());
            self.0.lock().unwrap().push(session.clone());
            Ok(session)
        }
        fn list(&self) -> Result<Vec<Session>, LedgerError> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn reassign_task(&self, id: &str, _: Option<&str>) -> Result<Session, LedgerError> {
            Err(LedgerError::NotFound(id.into()))
        }
        fn remove(&self, _: &str) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    fn shared_timer(auto_start: AutoStartConfig) -> (Arc<Mutex<FocusTimer>>, Arc<MemoryLedger>) {
        let clock = TokioClock {
            base: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            origin: time::Instant::now(),
        };
        let engine = TimerEngine::with_clock(Durations::new(3, 2, 5), Arc::new(clock));
        let ledger = Arc::new(MemoryLedger::default());
        let timer = FocusTimer::new(engine, ledger.clone(), auto_start);
        (Arc::new(Mutex::new(timer)), ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_completion_then_stops() {
        let (timer, ledger) = shared_timer(AutoStartConfig::default());
        timer.lock().await.toggle_running();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let mut ticker = TickLoop::new(Duration::from_millis(100));
        ticker.start(timer.clone(), move |outcome| {
            sink.lock().unwrap().extend(outcome.events);
        });
        ticker.join().await.unwrap();

        assert!(!ticker.is_active());
        let events = seen.lock().unwrap();
        let completions = events
            .iter()
            .filter(|e| matches!(e, Event::SessionCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(ledger.list().unwrap().len(), 1);
        assert!(!timer.lock().await.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn follows_auto_start_into_the_break() {
        let config = AutoStartConfig {
            auto_start_break: true,
            ..AutoStartConfig::default()
        };
        let (timer, ledger) = shared_timer(config);
        timer.lock().await.toggle_running();

        let mut ticker = TickLoop::new(Duration::from_millis(100));
        ticker.start(timer.clone(), |_| {});
        ticker.join().await.unwrap();

        let sessions = ledger.list().unwrap();
        let modes: Vec<_> = sessions.iter().map(|s| s.mode).collect();
        assert_eq!(modes, vec![TimerMode::Focus, TimerMode::ShortBreak]);
        assert_eq!(timer.lock().await.engine().mode(), TimerMode::ShortBreak);
    }

    #[tokio::test(start_paused = true)]
    async fn history_settles_to_canonical_records() {
        let (timer, ledger) = shared_timer(AutoStartConfig::default());
        timer.lock().await.toggle_running();

        let mut ticker = TickLoop::new(Duration::from_millis(100));
        ticker.start(timer.clone(), |_| {});
        ticker.join().await.unwrap();

        let timer = timer.lock().await;
        assert!(!timer.has_deferred_writes());
        assert_eq!(timer.sessions(), ledger.list().unwrap().as_slice());
    }

    struct BrokenLedger;

    impl SessionLedger for BrokenLedger {
        fn append(&self, _: &SessionDraft) -> Result<Session, LedgerError> {
            panic!("store driver crashed");
        }
        fn list(&self) -> Result<Vec<Session>, LedgerError> {
            Ok(Vec::new())
        }
        fn reassign_task(&self, id: &str, _: Option<&str>) -> Result<Session, LedgerError> {
            Err(LedgerError::NotFound(id.into()))
        }
        fn remove(&self, _: &str) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn join_reports_a_panicking_loop() {
        let clock = TokioClock {
            base: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            origin: time::Instant::now(),
        };
        let engine = TimerEngine::with_clock(Durations::new(1, 1, 1), Arc::new(clock));
        let mut timer = FocusTimer::new(engine, Arc::new(BrokenLedger), AutoStartConfig::default());
        timer.toggle_running();
        let timer = Arc::new(Mutex::new(timer));

        let mut ticker = TickLoop::new(Duration::from_millis(100));
        ticker.start(timer, |_| {});
        let err = ticker.join().await.unwrap_err();
        assert!(err.is_panic());
        assert!(!ticker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_task() {
        let (timer, _) = shared_timer(AutoStartConfig::default());
        timer.lock().await.toggle_running();

        let mut ticker = TickLoop::default();
        ticker.start(timer.clone(), |_| {});
        ticker.start(timer.clone(), |_| {});
        assert!(ticker.is_active());
        ticker.stop();
        assert!(!ticker.is_active());
    }
}
