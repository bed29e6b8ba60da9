use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The four timer flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
    /// Counts up instead of down; never completes on its own.
    Chronometer,
}

impl TimerMode {
    pub const ALL: [TimerMode; 4] = [
        TimerMode::Focus,
        TimerMode::ShortBreak,
        TimerMode::LongBreak,
        TimerMode::Chronometer,
    ];

    pub fn is_countdown(self) -> bool {
        !matches!(self, TimerMode::Chronometer)
    }

    pub fn is_break(self) -> bool {
        matches!(self, TimerMode::ShortBreak | TimerMode::LongBreak)
    }

    /// Stable name used in storage and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "shortBreak",
            TimerMode::LongBreak => "longBreak",
            TimerMode::Chronometer => "chronometer",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = ValidationError;

    /// Accepts the storage names plus snake/kebab-case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "focus" => Ok(TimerMode::Focus),
            "shortbreak" | "short" => Ok(TimerMode::ShortBreak),
            "longbreak" | "long" => Ok(TimerMode::LongBreak),
            "chronometer" | "chrono" | "stopwatch" => Ok(TimerMode::Chronometer),
            _ => Err(ValidationError::UnknownMode(s.to_string())),
        }
    }
}

/// Configured countdown lengths in seconds.
///
/// Every value lies within [`Durations::MIN_SECS`] and
/// [`Durations::MAX_SECS`]; constructors clamp instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Durations {
    pub focus: u64,
    pub short_break: u64,
    pub long_break: u64,
}

impl Durations {
    pub const MIN_SECS: u64 = 1;
    /// One day.
    pub const MAX_SECS: u64 = 24 * 60 * 60;

    pub fn new(focus: i64, short_break: i64, long_break: i64) -> Self {
        Self {
            focus: clamp_secs(focus),
            short_break: clamp_secs(short_break),
            long_break: clamp_secs(long_break),
        }
    }

    /// Copy with every value moved into the valid range.
    pub fn clamped(self) -> Self {
        let clamp = |secs: u64| secs.clamp(Self::MIN_SECS, Self::MAX_SECS);
        Self {
            focus: clamp(self.focus),
            short_break: clamp(self.short_break),
            long_break: clamp(self.long_break),
        }
    }

    /// Configured seconds for `mode`; the chronometer has none.
    pub fn secs(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Focus => self.focus,
            TimerMode::ShortBreak => self.short_break,
            TimerMode::LongBreak => self.long_break,
            TimerMode::Chronometer => 0,
        }
    }

    pub fn ms(&self, mode: TimerMode) -> u64 {
        self.secs(mode).saturating_mul(1000)
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            focus: 25 * 60,
            short_break: 5 * 60,
            long_break: 15 * 60,
        }
    }
}

fn clamp_secs(secs: i64) -> u64 {
    u64::try_from(secs)
        .unwrap_or(0)
        .clamp(Durations::MIN_SECS, Durations::MAX_SECS)
}
