//! Wall-clock sources and the ticker that drives the engine.
//!
//! The engine only ever reads the local time of day. It never consults a
//! monotonic clock for phase logic, so system clock changes show up as jumps
//! in the tick stream.

use crate::config::ClockResolution;
use crate::phase::whole_seconds;
use chrono::{Local, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// A source of the current time of day, with at least second resolution.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

/// Reads the operating system clock, optionally in a fixed IANA timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    pub fn new(timezone: Option<Tz>) -> Self {
        Self { timezone }
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> NaiveTime {
        let now = match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).time(),
            None => Local::now().time(),
        };
        // A leap second reads as :59.
        whole_seconds(now)
    }
}

/// A hand-driven clock for tests and simulations.
///
/// Every read returns the current value and then advances it by `step`,
/// so a zero step gives a frozen clock. Reads from anything other than the
/// ticker therefore shift the tick stream.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<NaiveTime>,
    step: chrono::Duration,
}

impl ManualClock {
    /// A clock that stays at `start` until [`ManualClock::set`] is called.
    pub fn frozen(start: NaiveTime) -> Self {
        Self::stepping(start, Duration::ZERO)
    }

    /// A clock that advances by `step` on every read.
    pub fn stepping(start: NaiveTime, step: Duration) -> Self {
        Self {
            inner: Mutex::new(start),
            step: chrono::Duration::from_std(step).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }

    pub fn set(&self, now: NaiveTime) {
        *self.lock() = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveTime> {
        // A poisoned clock still holds a valid time.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> NaiveTime {
        let mut current = self.lock();
        let now = *current;
        *current = now + self.step;
        now
    }
}

/// One beat of the ticker, stamped with the wall-clock time it observed.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub tick_count: u64,
    pub now: NaiveTime,
    pub timestamp: Instant,
}

/// Emits [`TickEvent`]s at the configured resolution until shut down.
pub struct Ticker {
    resolution: ClockResolution,
    clock: Arc<dyn WallClock>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl Ticker {
    pub fn new(
        resolution: ClockResolution,
        clock: Arc<dyn WallClock>,
        tick_sender: broadcast::Sender<Arc<TickEvent>>,
    ) -> Self {
        Self {
            resolution,
            clock,
            tick_sender,
        }
    }

    /// Runs the tick loop. The first tick fires immediately.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.tick_interval();
        let mut interval = time::interval(period);
        // After a stall, resume from now rather than bursting stale ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Ticker started with a period of {:?}.", period);

        let mut tick_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                timestamp = interval.tick() => {
                    tick_count += 1;
                    let event = TickEvent {
                        tick_count,
                        now: self.clock.now(),
                        timestamp,
                    };
                    trace!("Tick #{} at {}", event.tick_count, event.now);
                    if self.tick_sender.send(Arc::new(event)).is_err() {
                        trace!("No tick subscribers.");
                    }
                }
            }
        }
        debug!("Ticker stopped after {} ticks.", tick_count);
    }
}
