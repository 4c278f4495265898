//! Defines all configuration structures for the Daycycle engine.
//!
//! These structs are deserialized from a TOML file (plus `DAYCYCLE_*`
//! environment overrides) using the `config` crate and `serde`. The derived
//! [`CycleConfig`] is the only piece the phase logic itself consumes; the rest
//! configures the ticker and the side-effect sinks.

use crate::common::{Cue, Phase};
use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Work length used when no configuration can be read.
pub const DEFAULT_WORK_MINUTES: i64 = 90;
/// Break length used when no configuration can be read.
pub const DEFAULT_BREAK_MINUTES: i64 = 30;
/// Configured minutes are clamped into `[1, MAX_PHASE_MINUTES]`.
pub const MAX_PHASE_MINUTES: i64 = 24 * 60;

/// Typed failures when building a [`CycleConfig`] by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{phase} duration must be at least one second")]
    ZeroDuration { phase: Phase },
}

/// Immutable snapshot of the two phase lengths, in seconds.
///
/// Both lengths are always at least one second. A `CycleConfig` is never
/// mutated; a configuration reload builds a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    work_seconds: u32,
    break_seconds: u32,
}

impl CycleConfig {
    /// Builds a cycle from configured minutes, clamping each to `[1, 1440]`.
    pub fn from_minutes(work_minutes: i64, break_minutes: i64) -> Self {
        let to_seconds = |minutes: i64| (minutes.clamp(1, MAX_PHASE_MINUTES) * 60) as u32;
        Self {
            work_seconds: to_seconds(work_minutes),
            break_seconds: to_seconds(break_minutes),
        }
    }

    /// Builds a cycle from raw seconds. Mostly useful for tests and simulations.
    pub fn from_seconds(work_seconds: u32, break_seconds: u32) -> Result<Self, ConfigError> {
        if work_seconds == 0 {
            return Err(ConfigError::ZeroDuration { phase: Phase::Work });
        }
        if break_seconds == 0 {
            return Err(ConfigError::ZeroDuration {
                phase: Phase::Break,
            });
        }
        Ok(Self {
            work_seconds,
            break_seconds,
        })
    }

    pub fn work_seconds(&self) -> u32 {
        self.work_seconds
    }

    pub fn break_seconds(&self) -> u32 {
        self.break_seconds
    }

    /// Length of one full Work + Break pair.
    pub fn cycle_seconds(&self) -> u32 {
        self.work_seconds + self.break_seconds
    }

    /// Configured length of the given phase.
    pub fn seconds_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_seconds,
            Phase::Break => self.break_seconds,
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_WORK_MINUTES, DEFAULT_BREAK_MINUTES)
    }
}

/// The top-level configuration for the `DaycycleEngine`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaycycleConfig {
    /// Length of the work phase in minutes. Values below 1 are treated as 1.
    pub work_minutes: i64,
    /// Length of the break phase in minutes. Values below 1 are treated as 1.
    pub break_minutes: i64,
    /// Allows cues to be played by hand from the shell.
    pub dev_mode: bool,
    /// The tick speed of the ticker.
    pub resolution: ClockResolution,
    /// An IANA timezone (e.g. "Europe/Warsaw"). System local time when unset.
    pub timezone: Option<Tz>,
    /// How the "ending soon" cues detect the five minute mark.
    pub threshold: ThresholdPolicy,
    pub sounds: SoundConfig,
    pub notifications: NotificationConfig,
}

impl DaycycleConfig {
    /// The clamped cycle derived from this configuration.
    pub fn cycle(&self) -> CycleConfig {
        CycleConfig::from_minutes(self.work_minutes, self.break_minutes)
    }

    /// One-line description shown after a reload.
    pub fn summary(&self) -> String {
        format!(
            "{}m work, {}m break. dev_mode={}",
            self.work_minutes, self.break_minutes, self.dev_mode
        )
    }
}

impl Default for DaycycleConfig {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            dev_mode: false,
            resolution: ClockResolution::Low,
            timezone: None,
            threshold: ThresholdPolicy::Exact,
            sounds: SoundConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Defines the operational speed of the ticker.
///
/// The engine processes at most one tick per wall-clock second, so a faster
/// resolution only shortens the delay between a boundary and its cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// ~10 ticks per second.
    High,
    /// ~4 ticks per second.
    Medium,
    /// ~1 tick per second.
    Low,
    /// A user-defined speed in ticks per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    pub fn tick_interval(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_millis(100),
            ClockResolution::Medium => Duration::from_millis(250),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                Duration::from_millis((1000 / (*ticks_per_second).max(1)).max(1))
            }
        }
    }
}

/// How the dispatcher recognises the "five minutes left" moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPolicy {
    /// Fire only on a tick whose remaining time is exactly the lead time.
    /// A skipped tick at that second suppresses the cue.
    #[default]
    Exact,
    /// Fire on the first tick at or below the lead time within a phase. Fires at
    /// most once per phase; setting the clock back does not re-arm it.
    Crossing,
}

/// Sound file per cue and the player commands used to play them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Directory relative sound paths are resolved against.
    pub base_dir: PathBuf,
    /// Player programs tried in order; the file path is appended as the last argument.
    pub players: Vec<String>,
    pub end_of_work: PathBuf,
    pub work_ending_soon: PathBuf,
    pub start_break: PathBuf,
    pub break_ending_soon: PathBuf,
    pub start_work: PathBuf,
}

impl SoundConfig {
    /// Configured path for a cue, as written in the config.
    pub fn path_for(&self, cue: Cue) -> &Path {
        match cue {
            Cue::EndOfWork => &self.end_of_work,
            Cue::WorkEndingSoon => &self.work_ending_soon,
            Cue::StartBreak => &self.start_break,
            Cue::BreakEndingSoon => &self.break_ending_soon,
            Cue::StartWork => &self.start_work,
        }
    }

    /// Full path for a cue, or `None` when the cue is configured as silent.
    pub fn resolve(&self, cue: Cue) -> Option<PathBuf> {
        let path = self.path_for(cue);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(self.base_dir.join(path))
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        let sound = |name: &str| PathBuf::from("sounds").join(format!("{name}.wav"));
        Self {
            base_dir: PathBuf::from("."),
            players: vec!["paplay".to_string(), "aplay".to_string()],
            end_of_work: sound(Cue::EndOfWork.as_str()),
            work_ending_soon: sound(Cue::WorkEndingSoon.as_str()),
            start_break: sound(Cue::StartBreak.as_str()),
            break_ending_soon: sound(Cue::BreakEndingSoon.as_str()),
            start_work: sound(Cue::StartWork.as_str()),
        }
    }
}

/// Texts of the two transition notifications.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub start_break_title: String,
    pub start_break_message: String,
    pub start_work_title: String,
    pub start_work_message: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            start_break_title: "Now break".to_string(),
            start_break_message: "Enjoy your break".to_string(),
            start_work_title: "Now work".to_string(),
            start_work_message: "Back to work".to_string(),
        }
    }
}

/// Loads `DaycycleConfig` from an optional TOML file and the environment.
///
/// [`ConfigProvider::load`] never fails. A broken or missing file yields the
/// last configuration that loaded successfully, or the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvider {
    path: Option<PathBuf>,
    last_good: Option<DaycycleConfig>,
}

impl ConfigProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            last_good: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the configuration, reporting any failure to the caller.
    pub fn try_load(&self) -> anyhow::Result<DaycycleConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.path {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("DAYCYCLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match &self.path {
                Some(path) => format!("failed to read configuration from {}", path.display()),
                None => "failed to read configuration from the environment".to_string(),
            })?;
        settings
            .try_deserialize()
            .context("configuration has an invalid shape")
    }

    /// Reads the configuration and, on success, remembers it as the last good one.
    pub fn refresh(&mut self) -> anyhow::Result<DaycycleConfig> {
        let config = self.try_load()?;
        info!("Configuration loaded: {}", config.summary());
        self.last_good = Some(config.clone());
        Ok(config)
    }

    /// Reads the configuration, substituting the last good one on failure.
    pub fn load(&mut self) -> DaycycleConfig {
        match self.refresh() {
            Ok(config) => config,
            Err(e) => {
                let fallback = self.last_good.clone().unwrap_or_default();
                warn!(
                    "{:#}. Continuing with {}",
                    e,
                    if self.last_good.is_some() {
                        "the last good configuration"
                    } else {
                        "the default configuration"
                    }
                );
                fallback
            }
        }
    }
}
