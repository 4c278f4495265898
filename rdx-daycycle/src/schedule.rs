//! The full-day schedule of Work and Break intervals.
//!
//! The schedule is built once per configuration load and cached by the engine.
//! Locating the current entry is a separate, pure step so that "which interval
//! is current" stays independent from how a display paints it.

use crate::common::Phase;
use crate::config::CycleConfig;
use crate::phase::{seconds_into_day, SECONDS_PER_DAY};
use chrono::NaiveTime;
use std::fmt;
use std::str::FromStr;

/// One interval of the day. `end <= start` means the interval wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub phase: Phase,
}

impl ScheduleEntry {
    /// Builds an entry from offsets in seconds since midnight. `24:00` becomes `00:00`.
    pub fn from_offsets(start: u32, end: u32, phase: Phase) -> Self {
        Self {
            start: time_of_day(start),
            end: time_of_day(end),
            phase,
        }
    }

    /// Whether `now` falls within `[start, end)`, honouring midnight wraparound.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let start = seconds_into_day(self.start);
        let end = seconds_into_day(self.end);
        let t = seconds_into_day(now);
        if end > start {
            start <= t && t < end
        } else {
            t >= start || t < end
        }
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.phase.label()
        )
    }
}

/// Failure to read a `HH:mm - HH:mm label` line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleParseError {
    #[error("expected 'HH:mm - HH:mm label', got '{0}'")]
    Shape(String),
    #[error("invalid time '{0}'")]
    Time(String),
    #[error("unknown label '{0}'")]
    Label(String),
}

impl FromStr for ScheduleEntry {
    type Err = ScheduleParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [start, "-", end, label] = parts.as_slice() else {
            return Err(ScheduleParseError::Shape(line.to_string()));
        };
        let parse_time = |text: &str| {
            if text.len() != 5 {
                return Err(ScheduleParseError::Time(text.to_string()));
            }
            NaiveTime::parse_from_str(text, "%H:%M")
                .map_err(|_| ScheduleParseError::Time(text.to_string()))
        };
        let phase = match label.to_lowercase().as_str() {
            "work" => Phase::Work,
            "break" => Phase::Break,
            _ => return Err(ScheduleParseError::Label(label.to_string())),
        };
        Ok(Self {
            start: parse_time(*start)?,
            end: parse_time(*end)?,
            phase,
        })
    }
}

/// A rendered schedule line and whether it is the current interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpan {
    pub text: String,
    pub highlighted: bool,
}

fn time_of_day(seconds: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(seconds % SECONDS_PER_DAY, 0)
        .unwrap_or_default()
}

/// Builds the ordered Work/Break intervals covering `[00:00, 24:00)`.
///
/// Starts with Work at midnight and alternates. An interval that would run
/// past midnight is cut at `24:00` and nothing is emitted after it.
pub fn build(config: &CycleConfig) -> Vec<ScheduleEntry> {
    let max_cycles = SECONDS_PER_DAY.div_ceil(config.cycle_seconds()) + 1;
    let mut entries = Vec::with_capacity(max_cycles as usize * 2);
    let mut offset = 0;

    'cycles: for _ in 0..max_cycles {
        for phase in [Phase::Work, Phase::Break] {
            if offset >= SECONDS_PER_DAY {
                break 'cycles;
            }
            let end = (offset + config.seconds_for(phase)).min(SECONDS_PER_DAY);
            entries.push(ScheduleEntry::from_offsets(offset, end, phase));
            offset = end;
        }
    }
    entries
}

/// Index of the first entry containing `now`.
///
/// A well-formed schedule has exactly one match. For a malformed one the
/// earliest match wins, and `None` is returned when nothing matches.
pub fn locate(schedule: &[ScheduleEntry], now: NaiveTime) -> Option<usize> {
    schedule.iter().position(|entry| entry.contains(now))
}

/// Marks every entry containing `now`, without assuming a single match.
pub fn highlights(schedule: &[ScheduleEntry], now: NaiveTime) -> Vec<bool> {
    schedule.iter().map(|entry| entry.contains(now)).collect()
}

/// Renders the schedule as display spans, flagging the entries containing `now`.
pub fn render_spans(schedule: &[ScheduleEntry], now: NaiveTime) -> Vec<ScheduleSpan> {
    schedule
        .iter()
        .map(|entry| ScheduleSpan {
            text: entry.to_string(),
            highlighted: entry.contains(now),
        })
        .collect()
}

/// The canonical text form: one `HH:mm - HH:mm label` line per entry.
pub fn render_text(schedule: &[ScheduleEntry]) -> String {
    schedule.iter().map(|entry| format!("{entry}\n")).collect()
}

/// Parses the canonical text form, ignoring blank lines.
pub fn parse_text(text: &str) -> Result<Vec<ScheduleEntry>, ScheduleParseError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}
