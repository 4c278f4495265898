//! Maps a wall-clock time of day onto the current phase of the cycle.
//!
//! Cycles are anchored at local midnight: the first Work phase of every day
//! starts at 00:00 and the pattern repeats from there. The computation is pure,
//! so the same instant and configuration always produce the same state.

use crate::common::Phase;
use crate::config::CycleConfig;
use chrono::{NaiveTime, Timelike};
use std::fmt;

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// The phase the subject is in and the time left until the next boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: Phase,
    /// Seconds until the next phase boundary, in `[1, cycle_seconds]`.
    pub seconds_remaining: u32,
}

impl PhaseState {
    pub fn new(phase: Phase, seconds_remaining: u32) -> Self {
        Self {
            phase,
            seconds_remaining,
        }
    }

    /// Remaining time as `MM:SS`, or `H:MM:SS` once it reaches an hour.
    pub fn remaining_text(&self) -> String {
        let hours = self.seconds_remaining / 3600;
        let minutes = (self.seconds_remaining % 3600) / 60;
        let seconds = self.seconds_remaining % 60;
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }

    /// The tray-style status line, e.g. `Status: Work (remaining 04:59)`.
    pub fn status_line(&self) -> String {
        format!("Status: {self}")
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (remaining {})", self.phase, self.remaining_text())
    }
}

/// Whole seconds elapsed since midnight. Fractional seconds are dropped.
pub fn seconds_into_day(now: NaiveTime) -> u32 {
    now.num_seconds_from_midnight()
}

/// Drops the fractional part of `now`.
pub fn whole_seconds(now: NaiveTime) -> NaiveTime {
    now.with_nanosecond(0).unwrap_or(now)
}

/// Computes the phase state for a time of day.
pub fn compute(now: NaiveTime, config: &CycleConfig) -> PhaseState {
    compute_at(seconds_into_day(now), config)
}

/// Computes the phase state for a number of seconds since midnight.
///
/// The instant exactly at a phase start belongs to the new phase.
pub fn compute_at(seconds_into_day: u32, config: &CycleConfig) -> PhaseState {
    let into_cycle = seconds_into_day % config.cycle_seconds();
    if into_cycle < config.work_seconds() {
        PhaseState::new(Phase::Work, config.work_seconds() - into_cycle)
    } else {
        PhaseState::new(Phase::Break, config.cycle_seconds() - into_cycle)
    }
}
