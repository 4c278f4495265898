//! Defines watchers that let application code react to side effects.

use crate::common::Cue;
use crate::components::dispatcher::SideEffect;

/// Callback invoked with each matching side effect.
pub type EffectCallback = Box<dyn FnMut(&SideEffect) + Send + Sync>;

/// Selects which side effects a watcher is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectFilter {
    All,
    Sounds,
    Notifications,
    Cue(Cue),
}

impl EffectFilter {
    pub fn matches(&self, effect: &SideEffect) -> bool {
        match (self, effect) {
            (EffectFilter::All, _) => true,
            (EffectFilter::Sounds, SideEffect::PlaySound(_)) => true,
            (EffectFilter::Notifications, SideEffect::ShowNotification { .. }) => true,
            (EffectFilter::Cue(wanted), SideEffect::PlaySound(cue)) => wanted == cue,
            _ => false,
        }
    }
}

/// A registered listener for side effects.
#[doc(hidden)]
pub(crate) struct EffectWatcher {
    filter: EffectFilter,
    callback: EffectCallback,
}

impl EffectWatcher {
    pub(crate) fn new(filter: EffectFilter, callback: EffectCallback) -> Self {
        Self { filter, callback }
    }

    /// Runs the callback if the effect passes the filter.
    /// Returns `true` if the callback was executed.
    pub(crate) fn process_effect(&mut self, effect: &SideEffect) -> bool {
        if self.filter.matches(effect) {
            (self.callback)(effect);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn notification() -> SideEffect {
        SideEffect::ShowNotification {
            title: "Now work".to_string(),
            message: "Back to work".to_string(),
        }
    }

    #[test]
    fn filters_select_effects() {
        let start_work = SideEffect::PlaySound(Cue::StartWork);
        assert!(EffectFilter::All.matches(&notification()));
        assert!(EffectFilter::Sounds.matches(&start_work));
        assert!(!EffectFilter::Sounds.matches(&notification()));
        assert!(EffectFilter::Notifications.matches(&notification()));
        assert!(EffectFilter::Cue(Cue::StartWork).matches(&start_work));
        assert!(!EffectFilter::Cue(Cue::EndOfWork).matches(&start_work));
        assert!(!EffectFilter::Cue(Cue::StartWork).matches(&notification()));
    }

    #[test]
    fn watcher_only_fires_on_matching_effects() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let mut watcher = EffectWatcher::new(
            EffectFilter::Notifications,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        assert!(!watcher.process_effect(&SideEffect::PlaySound(Cue::StartBreak)));
        assert!(watcher.process_effect(&notification()));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
