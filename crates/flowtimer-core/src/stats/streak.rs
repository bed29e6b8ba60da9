use std::collections::BTreeSet;

use chrono::{Duration, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::{date_key, local_date, today};
use crate::ledger::Session;

/// Consecutive-day activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    /// Days in a row up to and including today; 0 when today is idle.
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_active_days: u32,
    /// The last 30 local date keys, oldest first, whether active or not.
    pub last_30_day_keys: Vec<String>,
}

pub fn compute_streak(sessions: &[Session]) -> StreakData {
    compute_streak_in(sessions, today(), &Local)
}

pub fn compute_streak_in<Tz: TimeZone>(sessions: &[Session], today: NaiveDate, tz: &Tz) -> StreakData {
    let active: BTreeSet<NaiveDate> = sessions
        .iter()
        .filter(|s| s.was_completed)
        .map(|s| local_date(&s.completed_at, tz))
        .collect();

    let mut current_streak = 0;
    let mut day = Some(today);
    while let Some(d) = day.filter(|d| active.contains(d)) {
        current_streak += 1;
        day = d.pred_opt();
    }

    let mut longest_streak = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &date in &active {
        run = match previous {
            Some(p) if date - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(date);
    }

    let last_30_day_keys = (0..30)
        .rev()
        .map(|back| date_key(today - Duration::days(back)))
        .collect();

    StreakData {
        current_streak,
        longest_streak: longest_streak.max(current_streak),
        total_active_days: active.len() as u32,
        last_30_day_keys,
    }
}
