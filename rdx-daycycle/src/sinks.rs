//! The narrow interfaces through which side effects leave the engine.
//!
//! Sinks are called off the tick loop (see `DaycycleEngine`), so they may
//! block. They report failures as [`SinkError`]; the engine logs the error
//! and carries on.

use crate::common::Cue;
use crate::config::SoundConfig;
use crate::schedule::ScheduleSpan;
use colored::Colorize;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("missing sound file: {}", .0.display())]
    MissingSound(PathBuf),
    #[error("no sound player could be started for {}: {reason}", .path.display())]
    NoPlayer { path: PathBuf, reason: String },
    #[error("sound player '{player}' exited with {status}")]
    PlayerFailed { player: String, status: ExitStatus },
    #[error("notification could not be shown: {0}")]
    Notification(String),
}

/// Plays the audio associated with a cue.
pub trait SoundSink: Send + Sync {
    fn play(&self, cue: Cue) -> Result<(), SinkError>;

    /// Called after a configuration reload.
    fn configure(&self, _sounds: &SoundConfig) {}
}

/// Presents a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), SinkError>;
}

/// Paints the schedule with the current entry highlighted. Called every tick.
pub trait ScheduleDisplay: Send + Sync {
    fn show(&self, spans: &[ScheduleSpan]);
}

/// Plays sound files by spawning an external player.
///
/// Players are tried in the configured order; a player that cannot be started
/// or exits unsuccessfully hands over to the next one.
#[derive(Debug)]
pub struct CommandSoundPlayer {
    sounds: RwLock<SoundConfig>,
}

impl CommandSoundPlayer {
    pub fn new(sounds: SoundConfig) -> Self {
        Self {
            sounds: RwLock::new(sounds),
        }
    }
}

impl SoundSink for CommandSoundPlayer {
    fn play(&self, cue: Cue) -> Result<(), SinkError> {
        let (path, players) = {
            let sounds = self.sounds.read().unwrap_or_else(PoisonError::into_inner);
            (sounds.resolve(cue), sounds.players.clone())
        };
        let Some(path) = path else {
            debug!("Cue {} has no sound configured.", cue);
            return Ok(());
        };
        if !path.is_file() {
            return Err(SinkError::MissingSound(path));
        }

        let mut last_error = SinkError::NoPlayer {
            path: path.clone(),
            reason: "no players configured".to_string(),
        };
        for player in &players {
            match Command::new(player)
                .arg(&path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if status.success() => {
                    debug!("Played {} with {}.", cue, player);
                    return Ok(());
                }
                Ok(status) => {
                    last_error = SinkError::PlayerFailed {
                        player: player.clone(),
                        status,
                    };
                }
                Err(e) => {
                    last_error = SinkError::NoPlayer {
                        path: path.clone(),
                        reason: format!("{player}: {e}"),
                    };
                }
            }
        }
        Err(last_error)
    }

    fn configure(&self, sounds: &SoundConfig) {
        *self.sounds.write().unwrap_or_else(PoisonError::into_inner) = sounds.clone();
    }
}

/// Discards every cue. Used when sound is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutedSoundPlayer;

impl SoundSink for MutedSoundPlayer {
    fn play(&self, cue: Cue) -> Result<(), SinkError> {
        debug!("Muted cue {}.", cue);
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), SinkError> {
        info!("[NOTIFY] {}: {}", title, message);
        Ok(())
    }
}

/// Shows desktop notifications through the session's notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    appname: String,
}

impl DesktopNotifier {
    pub fn new(appname: impl Into<String>) -> Self {
        Self {
            appname: appname.into(),
        }
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), SinkError> {
        notify_rust::Notification::new()
            .summary(title)
            .body(message)
            .appname(&self.appname)
            .show()
            .map(|_| ())
            .map_err(|e| SinkError::Notification(e.to_string()))
    }
}

/// Tries `primary` and hands the notification to `fallback` when it fails.
#[derive(Clone)]
pub struct FallbackNotifier {
    primary: Arc<dyn NotificationSink>,
    fallback: Arc<dyn NotificationSink>,
}

impl FallbackNotifier {
    pub fn new(primary: Arc<dyn NotificationSink>, fallback: Arc<dyn NotificationSink>) -> Self {
        Self { primary, fallback }
    }
}

impl NotificationSink for FallbackNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), SinkError> {
        if let Err(e) = self.primary.notify(title, message) {
            warn!("{}. Falling back.", e);
            return self.fallback.notify(title, message);
        }
        Ok(())
    }
}

/// Prints the schedule to stdout whenever the highlighted entry changes.
#[derive(Debug, Default)]
pub struct TerminalScheduleDisplay {
    last_highlight: Mutex<Option<Vec<bool>>>,
}

impl TerminalScheduleDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleDisplay for TerminalScheduleDisplay {
    fn show(&self, spans: &[ScheduleSpan]) {
        let highlight: Vec<bool> = spans.iter().map(|span| span.highlighted).collect();
        let mut last = self
            .last_highlight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(&highlight) {
            return;
        }
        *last = Some(highlight);
        println!("{}", paint(spans));
    }
}

/// Renders spans as terminal lines, the current entries in green.
pub fn paint(spans: &[ScheduleSpan]) -> String {
    spans
        .iter()
        .map(|span| {
            if span.highlighted {
                format!("{} {}", ">".green().bold(), span.text.black().on_green())
            } else {
                format!("  {}", span.text.dimmed())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
