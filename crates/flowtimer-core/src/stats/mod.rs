//! Session analytics.
//!
//! Pure functions over a snapshot of session (and task) history. Every
//! bucket is a *local* calendar date: a session finished at 23:30 local
//! time counts for that local day even when its UTC date is the next one.
//!
//! Each entry point has a `_in` variant taking "today"/"now" and the time
//! zone explicitly; the plain versions use the system clock and [`Local`].

mod heatmap;
mod streak;
mod summary;

pub use heatmap::{build_weekly_heatmap, build_weekly_heatmap_in, HeatmapDay, HourActivity, WeeklyHeatmap};
pub use streak::{compute_streak, compute_streak_in, StreakData};
pub use summary::{compute_summary_stats, compute_summary_stats_in, SummaryStats};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike, Utc, Weekday};

/// `YYYY-MM-DD`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar date of `at` in `tz`.
pub fn local_date<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Hour of day (0-23) of `at` in `tz`.
pub fn local_hour<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> u32 {
    at.with_timezone(tz).hour()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn short_day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Weekdays starting on Sunday, the order ties are broken in.
pub(crate) const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

pub(crate) fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}
