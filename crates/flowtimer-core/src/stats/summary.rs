use std::collections::HashSet;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{day_name, local_date, local_hour, weekday_index, WEEK};
use crate::ledger::Session;
use crate::task::Task;

/// Hour reported when there is nothing to rank.
pub const DEFAULT_PRODUCTIVE_HOUR: u32 = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_sessions: u32,
    pub total_hours: u64,
    pub total_active_days: u32,
    pub average_hours_per_day: f64,
    /// Trailing 7 days against the 7 before; 0 when the earlier window is empty.
    pub weekly_growth_percent: i64,
    pub most_productive_day_name: String,
    pub most_productive_hour: u32,
    pub completed_task_count: u32,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            total_hours: 0,
            total_active_days: 0,
            average_hours_per_day: 0.0,
            weekly_growth_percent: 0,
            most_productive_day_name: "N/A".to_string(),
            most_productive_hour: DEFAULT_PRODUCTIVE_HOUR,
            completed_task_count: 0,
        }
    }
}

pub fn compute_summary_stats(sessions: &[Session], tasks: &[Task]) -> SummaryStats {
    compute_summary_stats_in(sessions, tasks, Utc::now(), &Local)
}

pub fn compute_summary_stats_in<Tz: TimeZone>(
    sessions: &[Session],
    tasks: &[Task],
    now: DateTime<Utc>,
    tz: &Tz,
) -> SummaryStats {
    let completed: Vec<&Session> = sessions.iter().filter(|s| s.was_completed).collect();
    let finished_tasks: Vec<DateTime<Utc>> = tasks.iter().filter_map(Task::completion).collect();
    let completed_task_count = tasks.iter().filter(|t| t.completed).count() as u32;

    if completed.is_empty() && completed_task_count == 0 {
        return SummaryStats::default();
    }

    let total_seconds = completed
        .iter()
        .fold(0u64, |total, s| total.saturating_add(s.duration_seconds));
    let total_hours = (total_seconds as f64 / 3600.0).round() as u64;

    let active_days: HashSet<_> = completed
        .iter()
        .map(|s| local_date(&s.completed_at, tz))
        .chain(finished_tasks.iter().map(|at| local_date(at, tz)))
        .collect();
    let total_active_days = active_days.len() as u32;

    let average_hours_per_day = if total_active_days == 0 {
        0.0
    } else {
        (total_hours as f64 / total_active_days as f64 * 10.0).round() / 10.0
    };

    // Ranking looks at every recorded session, interrupted ones included.
    let mut by_day = [0u32; 7];
    let mut by_hour = [0u32; 24];
    for session in sessions {
        by_day[weekday_index(local_date(&session.completed_at, tz))] += 1;
        by_hour[local_hour(&session.completed_at, tz) as usize] += 1;
    }
    let most_productive_day_name = busiest(&by_day)
        .map(|i| day_name(WEEK[i]).to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let most_productive_hour = busiest(&by_hour)
        .map(|h| h as u32)
        .unwrap_or(DEFAULT_PRODUCTIVE_HOUR);

    SummaryStats {
        total_sessions: completed.len() as u32,
        total_hours,
        total_active_days,
        average_hours_per_day,
        weekly_growth_percent: weekly_growth(&completed, now),
        most_productive_day_name,
        most_productive_hour,
        completed_task_count,
    }
}

/// Index of the largest non-zero count; the earliest index wins ties.
fn busiest(counts: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &count) in counts.iter().enumerate() {
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((i, count));
        }
    }
    best.map(|(i, _)| i)
}

fn weekly_growth(completed: &[&Session], now: DateTime<Utc>) -> i64 {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let mut current = 0u32;
    let mut previous = 0u32;
    for session in completed {
        let at = session.completed_at;
        if at > week_ago && at <= now {
            current += 1;
        } else if at > two_weeks_ago && at <= week_ago {
            previous += 1;
        }
    }

    if previous == 0 {
        return 0;
    }
    ((f64::from(current) - f64::from(previous)) / f64::from(previous) * 100.0).round() as i64
}
