//! The synchronous heart of a tick: phase, side effects and the current entry.
//!
//! `TickDriver` owns the [`TransitionDispatcher`] and is owned in turn by the
//! engine's dispatcher task. Everything here is plain computation; the engine
//! is responsible for forwarding the outcome to sinks and subscribers.

use crate::components::dispatcher::{SideEffect, TransitionDispatcher};
use crate::config::{CycleConfig, DaycycleConfig};
use crate::phase::{self, seconds_into_day, PhaseState, SECONDS_PER_DAY};
use crate::schedule::{self, ScheduleEntry};
use chrono::NaiveTime;
use std::sync::Arc;

/// A consistent view of one configuration load.
///
/// Replaced as a whole on reload so the cycle and its schedule never disagree.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: Arc<DaycycleConfig>,
    pub cycle: CycleConfig,
    pub schedule: Arc<[ScheduleEntry]>,
}

impl Snapshot {
    pub fn new(config: DaycycleConfig) -> Self {
        let cycle = config.cycle();
        Self {
            config: Arc::new(config),
            cycle,
            schedule: schedule::build(&cycle).into(),
        }
    }
}

/// The wall clock moved by something other than one second between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockJump {
    pub from: NaiveTime,
    pub to: NaiveTime,
    /// Signed distance in seconds, taken the short way around midnight.
    pub delta_seconds: i64,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub now: NaiveTime,
    pub state: PhaseState,
    pub effects: Vec<SideEffect>,
    pub current_entry: Option<usize>,
    pub clock_jump: Option<ClockJump>,
}

#[derive(Debug, Clone)]
pub struct TickDriver {
    dispatcher: TransitionDispatcher,
    last_seen: Option<NaiveTime>,
}

impl TickDriver {
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            dispatcher: TransitionDispatcher::new(
                snapshot.config.notifications.clone(),
                snapshot.config.threshold,
            ),
            last_seen: None,
        }
    }

    /// Picks up reloaded notification texts and threshold policy.
    pub fn reconfigure(&mut self, snapshot: &Snapshot) {
        self.dispatcher.reconfigure(
            snapshot.config.notifications.clone(),
            snapshot.config.threshold,
        );
    }

    pub fn dispatcher(&self) -> &TransitionDispatcher {
        &self.dispatcher
    }

    /// Processes the tick observed at `now`.
    ///
    /// Returns `None` when `now` falls in the same wall-clock second as the
    /// previously processed tick, so each second is evaluated at most once.
    pub fn tick(&mut self, now: NaiveTime, snapshot: &Snapshot) -> Option<TickOutcome> {
        let now = phase::whole_seconds(now);
        if self.last_seen == Some(now) {
            return None;
        }
        let clock_jump = self.last_seen.and_then(|previous| detect_jump(previous, now));
        self.last_seen = Some(now);

        let state = phase::compute(now, &snapshot.cycle);
        let effects = self.dispatcher.on_tick(state);
        let current_entry = schedule::locate(&snapshot.schedule, now);
        Some(TickOutcome {
            now,
            state,
            effects,
            current_entry,
            clock_jump,
        })
    }
}

fn detect_jump(from: NaiveTime, to: NaiveTime) -> Option<ClockJump> {
    let day = i64::from(SECONDS_PER_DAY);
    let raw = i64::from(seconds_into_day(to)) - i64::from(seconds_into_day(from));
    let mut delta = raw.rem_euclid(day);
    if delta > day / 2 {
        delta -= day;
    }
    (delta != 1).then_some(ClockJump {
        from,
        to,
        delta_seconds: delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Cue, Phase};

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(DaycycleConfig::default())
    }

    #[test]
    fn snapshot_schedule_matches_its_cycle() {
        let snapshot = snapshot();
        assert_eq!(snapshot.cycle.cycle_seconds(), 2 * 60 * 60);
        assert_eq!(snapshot.schedule.len(), 24);
    }

    #[test]
    fn work_to_break_boundary_over_three_ticks() {
        let snapshot = snapshot();
        let mut driver = TickDriver::new(&snapshot);

        let warm_up = driver.tick(hms(1, 29, 58), &snapshot).unwrap();
        assert!(warm_up.effects.is_empty());
        assert_eq!(warm_up.current_entry, Some(0));

        let last_work = driver.tick(hms(1, 29, 59), &snapshot).unwrap();
        assert_eq!(last_work.state, PhaseState::new(Phase::Work, 1));
        assert!(last_work.effects.is_empty());
        assert_eq!(last_work.clock_jump, None);

        let first_break = driver.tick(hms(1, 30, 0), &snapshot).unwrap();
        assert_eq!(first_break.state, PhaseState::new(Phase::Break, 1800));
        assert_eq!(first_break.current_entry, Some(1));
        assert_eq!(
            &first_break.effects[1..],
            &[
                SideEffect::PlaySound(Cue::EndOfWork),
                SideEffect::PlaySound(Cue::StartBreak)
            ]
        );
    }

    #[test]
    fn repeated_second_is_dropped() {
        let snapshot = snapshot();
        let mut driver = TickDriver::new(&snapshot);
        assert!(driver.tick(hms(1, 24, 59), &snapshot).is_some());
        let exact = driver.tick(hms(1, 25, 0), &snapshot).unwrap();
        assert_eq!(exact.effects, vec![SideEffect::PlaySound(Cue::WorkEndingSoon)]);

        let late = NaiveTime::from_hms_milli_opt(1, 25, 0, 900).unwrap();
        assert_eq!(driver.tick(late, &snapshot), None);
    }

    #[test]
    fn clock_jumps_are_reported() {
        let snapshot = snapshot();
        let mut driver = TickDriver::new(&snapshot);
        driver.tick(hms(10, 0, 0), &snapshot);

        let forward = driver.tick(hms(10, 0, 5), &snapshot).unwrap();
        assert_eq!(forward.clock_jump.map(|j| j.delta_seconds), Some(5));

        let backward = driver.tick(hms(9, 59, 0), &snapshot).unwrap();
        assert_eq!(backward.clock_jump.map(|j| j.delta_seconds), Some(-65));
    }

    #[test]
    fn midnight_is_not_a_jump() {
        let snapshot = snapshot();
        let mut driver = TickDriver::new(&snapshot);
        driver.tick(hms(23, 59, 59), &snapshot);
        let outcome = driver.tick(hms(0, 0, 0), &snapshot).unwrap();
        assert_eq!(outcome.clock_jump, None);
        // 23:30-00:00 break rolls over into the first work entry of the day.
        assert_eq!(outcome.current_entry, Some(0));
        assert_eq!(outcome.effects.len(), 2);
    }

    #[test]
    fn reconfigure_swaps_notification_texts() {
        let snapshot = snapshot();
        let mut driver = TickDriver::new(&snapshot);
        driver.tick(hms(1, 59, 59), &snapshot);

        let mut config = DaycycleConfig::default();
        config.notifications.start_work_title = "Focus".to_string();
        let reloaded = Snapshot::new(config);
        driver.reconfigure(&reloaded);

        let outcome = driver.tick(hms(2, 0, 0), &reloaded).unwrap();
        assert_eq!(
            outcome.effects[0],
            SideEffect::ShowNotification {
                title: "Focus".to_string(),
                message: "Back to work".to_string(),
            }
        );
    }
}
