//! Contains common, primitive types shared across the Daycycle engine.
//!
//! This module defines the two closed vocabularies the engine speaks in, the
//! [`Phase`] a subject is in and the [`Cue`] a sound asset is selected by, plus
//! the key type used to identify registered listeners.

use serde::Deserialize;
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;

new_key_type! {
    /// Uniquely and safely identifies a registered effect listener within the engine.
    ///
    /// This key is returned when a listener is added to the engine. It is
    /// guaranteed to be unique and will not be reused, preventing stale ID bugs.
    pub struct ListenerId;
}

/// The activity mode of the subject. There are exactly two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Break,
}

impl Phase {
    /// The lowercase label used in the schedule text format.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::Break => "break",
        }
    }

    /// The phase that follows this one in a cycle.
    pub fn next(self) -> Self {
        match self {
            Phase::Work => Phase::Break,
            Phase::Break => Phase::Work,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Work => f.write_str("Work"),
            Phase::Break => f.write_str("Break"),
        }
    }
}

/// Identifies which sound asset to play for a given timing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    EndOfWork,
    WorkEndingSoon,
    StartBreak,
    BreakEndingSoon,
    StartWork,
}

impl Cue {
    /// Every cue, in the order they occur across one cycle.
    pub const ALL: [Cue; 5] = [
        Cue::WorkEndingSoon,
        Cue::EndOfWork,
        Cue::StartBreak,
        Cue::BreakEndingSoon,
        Cue::StartWork,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Cue::EndOfWork => "end_of_work",
            Cue::WorkEndingSoon => "work_ending_soon",
            Cue::StartBreak => "start_break",
            Cue::BreakEndingSoon => "break_ending_soon",
            Cue::StartWork => "start_work",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name any [`Cue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cue '{0}' (expected one of: end_of_work, work_ending_soon, start_break, break_ending_soon, start_work)")]
pub struct UnknownCue(pub String);

impl FromStr for Cue {
    type Err = UnknownCue;

    /// Accepts `snake_case`, `kebab-case` and `CamelCase` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "endofwork" => Ok(Cue::EndOfWork),
            "workendingsoon" => Ok(Cue::WorkEndingSoon),
            "startbreak" => Ok(Cue::StartBreak),
            "breakendingsoon" => Ok(Cue::BreakEndingSoon),
            "startwork" => Ok(Cue::StartWork),
            _ => Err(UnknownCue(s.to_string())),
        }
    }
}
