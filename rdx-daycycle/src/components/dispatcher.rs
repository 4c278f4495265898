//! Decides, once per tick, which sounds and notifications must fire.
//!
//! The dispatcher is the only stateful piece of the phase logic. It remembers
//! the previous tick's state and compares it against the current one. It is
//! owned by the tick driver and never shared, so it needs no locking.

use crate::common::{Cue, Phase};
use crate::config::{NotificationConfig, ThresholdPolicy};
use crate::phase::PhaseState;
use tracing::trace;

/// How long before a boundary the "ending soon" cues fire.
pub const LEAD_TIME_SECONDS: u32 = 5 * 60;

/// A single action requested by a tick. Produced and consumed within that tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    PlaySound(Cue),
    ShowNotification { title: String, message: String },
}

/// What the dispatcher remembers between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherState {
    previous: Option<PhaseState>,
    /// Whether the crossing policy may still fire in the current phase.
    ending_soon_armed: bool,
}

impl DispatcherState {
    /// The phase seen on the previous tick, `None` before the first tick.
    pub fn previous_phase(&self) -> Option<Phase> {
        self.previous.map(|state| state.phase)
    }

    pub fn previous(&self) -> Option<PhaseState> {
        self.previous
    }

    /// `false` once the "ending soon" cue has fired (or was already due) in the
    /// current phase. Re-armed on every phase change.
    pub fn ending_soon_armed(&self) -> bool {
        self.ending_soon_armed
    }
}

/// Turns a sequence of phase states into side effects.
#[derive(Debug, Clone)]
pub struct TransitionDispatcher {
    state: DispatcherState,
    messages: NotificationConfig,
    policy: ThresholdPolicy,
}

impl TransitionDispatcher {
    pub fn new(messages: NotificationConfig, policy: ThresholdPolicy) -> Self {
        Self {
            state: DispatcherState::default(),
            messages,
            policy,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    /// Swaps in reloaded texts and policy. The remembered phase is kept.
    pub fn reconfigure(&mut self, messages: NotificationConfig, policy: ThresholdPolicy) {
        self.messages = messages;
        self.policy = policy;
    }

    /// Evaluates the transition rules for one tick, in their fixed order.
    ///
    /// The first tick only records the phase; starting up mid-phase is not a
    /// transition.
    pub fn on_tick(&mut self, current: PhaseState) -> Vec<SideEffect> {
        let Some(previous) = self.state.previous.replace(current) else {
            trace!("Warm-up tick in {}", current);
            self.state.ending_soon_armed = current.seconds_remaining > LEAD_TIME_SECONDS;
            return Vec::new();
        };
        if previous.phase != current.phase {
            self.state.ending_soon_armed = true;
        }

        let mut effects = Vec::new();
        let ending_soon = self.ending_soon(current);

        if current.phase == Phase::Work && ending_soon {
            effects.push(SideEffect::PlaySound(Cue::WorkEndingSoon));
        }
        if current.phase == Phase::Break && previous.phase == Phase::Work {
            effects.push(SideEffect::ShowNotification {
                title: self.messages.start_break_title.clone(),
                message: self.messages.start_break_message.clone(),
            });
            effects.push(SideEffect::PlaySound(Cue::EndOfWork));
            effects.push(SideEffect::PlaySound(Cue::StartBreak));
        }
        if current.phase == Phase::Break && ending_soon {
            effects.push(SideEffect::PlaySound(Cue::BreakEndingSoon));
        }
        if current.phase == Phase::Work && previous.phase == Phase::Break {
            effects.push(SideEffect::ShowNotification {
                title: self.messages.start_work_title.clone(),
                message: self.messages.start_work_message.clone(),
            });
            effects.push(SideEffect::PlaySound(Cue::StartWork));
        }
        effects
    }

    fn ending_soon(&mut self, current: PhaseState) -> bool {
        let due = current.seconds_remaining <= LEAD_TIME_SECONDS;
        let armed = self.state.ending_soon_armed;
        if due {
            self.state.ending_soon_armed = false;
        }
        match self.policy {
            ThresholdPolicy::Exact => current.seconds_remaining == LEAD_TIME_SECONDS,
            // At most once per phase, even if the clock is set back.
            ThresholdPolicy::Crossing => due && armed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(remaining: u32) -> PhaseState {
        PhaseState::new(Phase::Work, remaining)
    }

    fn brk(remaining: u32) -> PhaseState {
        PhaseState::new(Phase::Break, remaining)
    }

    fn dispatcher(policy: ThresholdPolicy) -> TransitionDispatcher {
        TransitionDispatcher::new(NotificationConfig::default(), policy)
    }

    fn feed(dispatcher: &mut TransitionDispatcher, states: &[PhaseState]) -> Vec<Vec<SideEffect>> {
        states.iter().map(|s| dispatcher.on_tick(*s)).collect()
    }

    #[test]
    fn first_tick_is_warm_up_only() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        assert_eq!(d.state().previous_phase(), None);
        // Even a state that would otherwise fire a rule is silent on the first tick.
        assert!(d.on_tick(work(LEAD_TIME_SECONDS)).is_empty());
        assert_eq!(d.state().previous_phase(), Some(Phase::Work));
    }

    #[test]
    fn work_ending_soon_fires_once_on_the_exact_second() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(work(302));
        let effects = feed(&mut d, &[work(301), work(300), work(299)]);
        assert_eq!(
            effects,
            vec![
                vec![],
                vec![SideEffect::PlaySound(Cue::WorkEndingSoon)],
                vec![]
            ]
        );
    }

    #[test]
    fn work_to_break_notifies_then_plays_two_cues() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(work(2));
        let effects = feed(&mut d, &[work(1), brk(1800)]);
        assert!(effects[0].is_empty());
        assert_eq!(
            effects[1],
            vec![
                SideEffect::ShowNotification {
                    title: "Now break".to_string(),
                    message: "Enjoy your break".to_string(),
                },
                SideEffect::PlaySound(Cue::EndOfWork),
                SideEffect::PlaySound(Cue::StartBreak),
            ]
        );
    }

    #[test]
    fn break_to_work_notifies_then_plays_start_work() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(brk(1));
        assert_eq!(
            d.on_tick(work(5400)),
            vec![
                SideEffect::ShowNotification {
                    title: "Now work".to_string(),
                    message: "Back to work".to_string(),
                },
                SideEffect::PlaySound(Cue::StartWork),
            ]
        );
    }

    #[test]
    fn break_ending_soon_fires_on_the_exact_second() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(brk(301));
        assert_eq!(
            d.on_tick(brk(300)),
            vec![SideEffect::PlaySound(Cue::BreakEndingSoon)]
        );
    }

    #[test]
    fn five_minute_break_fires_transition_and_ending_soon_together() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(work(1));
        assert_eq!(
            d.on_tick(brk(300)),
            vec![
                SideEffect::ShowNotification {
                    title: "Now break".to_string(),
                    message: "Enjoy your break".to_string(),
                },
                SideEffect::PlaySound(Cue::EndOfWork),
                SideEffect::PlaySound(Cue::StartBreak),
                SideEffect::PlaySound(Cue::BreakEndingSoon),
            ]
        );
    }

    #[test]
    fn five_minute_work_fires_ending_soon_before_start_work() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(brk(1));
        let effects = d.on_tick(work(300));
        assert_eq!(effects[0], SideEffect::PlaySound(Cue::WorkEndingSoon));
        assert_eq!(effects[2], SideEffect::PlaySound(Cue::StartWork));
    }

    #[test]
    fn exact_policy_misses_a_skipped_threshold_tick() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(work(302));
        let effects = feed(&mut d, &[work(301), work(299), work(298)]);
        assert!(effects.iter().all(Vec::is_empty));
    }

    #[test]
    fn crossing_policy_survives_a_skipped_threshold_tick() {
        let mut d = dispatcher(ThresholdPolicy::Crossing);
        d.on_tick(work(302));
        let effects = feed(&mut d, &[work(301), work(299), work(298)]);
        assert_eq!(
            effects,
            vec![
                vec![],
                vec![SideEffect::PlaySound(Cue::WorkEndingSoon)],
                vec![]
            ]
        );
    }

    #[test]
    fn crossing_policy_fires_once_per_phase_despite_a_backward_jump() {
        let mut d = dispatcher(ThresholdPolicy::Crossing);
        d.on_tick(work(302));
        let effects = feed(&mut d, &[work(299), work(400), work(299), work(1)]);
        assert_eq!(
            effects,
            vec![
                vec![SideEffect::PlaySound(Cue::WorkEndingSoon)],
                vec![],
                vec![],
                vec![]
            ]
        );
        assert!(!d.state().ending_soon_armed());

        // The next phase re-arms the cue.
        d.on_tick(brk(1800));
        assert!(d.state().ending_soon_armed());
        assert_eq!(d.on_tick(brk(250)), vec![SideEffect::PlaySound(Cue::BreakEndingSoon)]);
    }

    #[test]
    fn crossing_policy_stays_quiet_when_starting_inside_the_lead_time() {
        let mut d = dispatcher(ThresholdPolicy::Crossing);
        d.on_tick(work(200));
        assert!(!d.state().ending_soon_armed());
        assert!(d.on_tick(work(199)).is_empty());
    }

    #[test]
    fn crossing_policy_fires_on_entry_into_a_short_phase() {
        let mut d = dispatcher(ThresholdPolicy::Crossing);
        d.on_tick(work(1));
        let effects = d.on_tick(brk(60));
        assert_eq!(effects.last(), Some(&SideEffect::PlaySound(Cue::BreakEndingSoon)));
        assert!(d.on_tick(brk(59)).is_empty());
    }

    #[test]
    fn reconfigure_keeps_the_previous_phase() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        d.on_tick(work(1));
        d.reconfigure(
            NotificationConfig {
                start_break_title: "Pause".to_string(),
                ..NotificationConfig::default()
            },
            ThresholdPolicy::Crossing,
        );
        assert_eq!(d.policy(), ThresholdPolicy::Crossing);
        let effects = d.on_tick(brk(1800));
        assert_eq!(
            effects[0],
            SideEffect::ShowNotification {
                title: "Pause".to_string(),
                message: "Enjoy your break".to_string(),
            }
        );
    }

    #[test]
    fn previous_state_is_recorded_every_tick() {
        let mut d = dispatcher(ThresholdPolicy::Exact);
        for state in [work(3), work(2), work(1), brk(10)] {
            d.on_tick(state);
            assert_eq!(d.state().previous(), Some(state));
        }
    }
}
