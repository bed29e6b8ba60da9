//! Weekly activity heatmap.
//!
//! Seven local days by 24 hours of completed sessions, used to show when
//! focus actually happens.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::{date_key, local_date, local_hour, short_day_name, today};
use crate::ledger::Session;

/// Activity inside one hour of one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourActivity {
    pub sessions: u32,
    /// Sum of each session's duration rounded to whole minutes.
    pub minutes: u64,
}

impl HourActivity {
    /// Character for the ASCII rendering.
    pub fn heat_char(&self) -> char {
        match self.sessions {
            0 => ' ',
            1 => '░',
            2..=3 => '▒',
            4..=5 => '▓',
            _ => '█',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDay {
    /// Local date key.
    pub date: String,
    pub day_name: String,
    pub session_count: u32,
    pub focus_time_seconds: u64,
    /// Only hours with activity are present.
    pub hourly_activity: BTreeMap<u32, HourActivity>,
}

impl HeatmapDay {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date: date_key(date),
            day_name: short_day_name(date.weekday()).to_string(),
            session_count: 0,
            focus_time_seconds: 0,
            hourly_activity: BTreeMap::new(),
        }
    }

    pub fn hour(&self, hour: u32) -> HourActivity {
        self.hourly_activity.get(&hour).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyHeatmap {
    /// Oldest first. Empty when the requested week lies outside the
    /// calendar range.
    pub days: Vec<HeatmapDay>,
    pub total_sessions: u32,
    pub total_focus_seconds: u64,
}

impl WeeklyHeatmap {
    pub fn is_empty(&self) -> bool {
        self.total_sessions == 0
    }

    /// Busiest `(date, hour, sessions)` cells, most sessions first.
    pub fn peak_hours(&self, limit: usize) -> Vec<(String, u32, u32)> {
        let mut peaks: Vec<_> = self
            .days
            .iter()
            .flat_map(|day| {
                day.hourly_activity
                    .iter()
                    .map(move |(hour, activity)| (day.date.clone(), *hour, activity.sessions))
            })
            .collect();
        peaks.sort_by(|a, b| b.2.cmp(&a.2));
        peaks.truncate(limit);
        peaks
    }

    pub fn render_ascii(&self) -> String {
        let mut out = String::new();
        out.push_str("Weekly Focus Heatmap\n");
        out.push_str(&"=".repeat(36));
        out.push('\n');

        if self.is_empty() {
            out.push_str("No completed sessions this week.\n");
            return out;
        }

        out.push_str("           ");
        for hour in (0..24).step_by(6) {
            out.push_str(&format!("{hour:<6}"));
        }
        out.push('\n');

        for day in &self.days {
            out.push_str(&format!("{} {} ", day.day_name, &day.date[5..]));
            out.push('|');
            for hour in 0..24 {
                out.push(day.hour(hour).heat_char());
            }
            out.push_str(&format!("| {}\n", day.session_count));
        }

        out.push_str(&format!(
            "\nTotal: {} sessions, {} min\n",
            self.total_sessions,
            self.total_focus_seconds / 60
        ));
        out
    }
}

/// Heatmap of the 7 local days ending `week_offset` weeks from today.
pub fn build_weekly_heatmap(sessions: &[Session], week_offset: i32) -> WeeklyHeatmap {
    build_weekly_heatmap_in(sessions, week_offset, today(), &Local)
}

pub fn build_weekly_heatmap_in<Tz: TimeZone>(
    sessions: &[Session],
    week_offset: i32,
    today: NaiveDate,
    tz: &Tz,
) -> WeeklyHeatmap {
    let Some((first, last)) = week_window(today, week_offset) else {
        return WeeklyHeatmap::default();
    };

    let mut days: Vec<HeatmapDay> = first
        .iter_days()
        .take(7)
        .map(HeatmapDay::empty)
        .collect();

    for session in sessions.iter().filter(|s| s.was_completed) {
        let date = local_date(&session.completed_at, tz);
        if date < first || date > last {
            continue;
        }
        let day = &mut days[(date - first).num_days() as usize];
        let hour = local_hour(&session.completed_at, tz);

        day.session_count += 1;
        day.focus_time_seconds = day.focus_time_seconds.saturating_add(session.duration_seconds);
        let cell = day.hourly_activity.entry(hour).or_default();
        cell.sessions += 1;
        cell.minutes = cell
            .minutes
            .saturating_add(session.duration_seconds.saturating_add(30) / 60);
    }

    let total_sessions = days.iter().map(|d| d.session_count).sum();
    let total_focus_seconds = days
        .iter()
        .fold(0u64, |total, d| total.saturating_add(d.focus_time_seconds));

    WeeklyHeatmap {
        days,
        total_sessions,
        total_focus_seconds,
    }
}

/// First and last day of the week `week_offset` weeks from `today`.
fn week_window(today: NaiveDate, week_offset: i32) -> Option<(NaiveDate, NaiveDate)> {
    let last = today.checked_add_signed(Duration::try_weeks(i64::from(week_offset))?)?;
    let first = last.checked_sub_signed(Duration::days(6))?;
    Some((first, last))
}
