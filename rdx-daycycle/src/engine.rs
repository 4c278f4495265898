//! The core engine that orchestrates the entire Daycycle system.

use crate::common::{Cue, ListenerId};
use crate::components::dispatcher::SideEffect;
use crate::components::driver::{Snapshot, TickDriver, TickOutcome};
use crate::components::watcher::{EffectFilter, EffectWatcher};
use crate::config::{ConfigProvider, DaycycleConfig, ThresholdPolicy};
use crate::events::{EffectEvent, PhaseEvent, SystemEvent};
use crate::phase::{self, PhaseState};
use crate::schedule::{self, ScheduleEntry, ScheduleSpan};
use crate::sinks::{
    CommandSoundPlayer, DesktopNotifier, FallbackNotifier, LogNotifier, MutedSoundPlayer,
    NotificationSink, ScheduleDisplay, SoundSink,
};
use crate::time::{SystemClock, TickEvent, Ticker, WallClock};
use crate::ENGINE_NAME;
use chrono::NaiveTime;
use slotmap::SlotMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, trace, warn};

/// The outlets side effects are delivered to.
#[derive(Clone)]
pub struct Sinks {
    pub sound: Arc<dyn SoundSink>,
    pub notifier: Arc<dyn NotificationSink>,
    pub display: Option<Arc<dyn ScheduleDisplay>>,
}

impl Sinks {
    /// External player sounds and desktop notifications (logged when the
    /// desktop is unavailable), no schedule display.
    pub fn desktop(config: &DaycycleConfig) -> Self {
        Self {
            sound: Arc::new(CommandSoundPlayer::new(config.sounds.clone())),
            notifier: Arc::new(FallbackNotifier::new(
                Arc::new(DesktopNotifier::new(ENGINE_NAME)),
                Arc::new(LogNotifier),
            )),
            display: None,
        }
    }

    /// No sound, notifications written to the log.
    pub fn quiet() -> Self {
        Self {
            sound: Arc::new(MutedSoundPlayer),
            notifier: Arc::new(LogNotifier),
            display: None,
        }
    }

    pub fn with_display(mut self, display: Arc<dyn ScheduleDisplay>) -> Self {
        self.display = Some(display);
        self
    }
}

/// The main Daycycle engine.
///
/// This struct is the central point of control. It holds the current
/// configuration snapshot, the sinks and the registered listeners, and drives
/// the tick loop. The engine is designed to be cloned and shared across tasks,
/// providing a handle to the running instance.
#[derive(Clone)]
pub struct DaycycleEngine {
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    clock: Arc<dyn WallClock>,
    /// Wall-clock second of the last processed tick while the engine runs.
    last_tick: Arc<RwLock<Option<NaiveTime>>>,
    sinks: Sinks,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    phase_sender: broadcast::Sender<PhaseEvent>,
    effect_sender: broadcast::Sender<EffectEvent>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    effect_watchers: Arc<RwLock<SlotMap<ListenerId, EffectWatcher>>>,
}

// Core implementation block for internal logic.
impl DaycycleEngine {
    /// Creates an engine reading the system clock in the configured timezone.
    pub fn new(config: DaycycleConfig, sinks: Sinks) -> Self {
        let clock = Arc::new(SystemClock::new(config.timezone));
        Self::with_clock(config, sinks, clock)
    }

    /// Creates an engine driven by the given wall clock.
    pub fn with_clock(config: DaycycleConfig, sinks: Sinks, clock: Arc<dyn WallClock>) -> Self {
        const CHANNEL_CAPACITY: usize = 256;
        let (tick_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (phase_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (effect_sender, _) = broadcast::channel(64);
        let (system_event_sender, _) = broadcast::channel(64);

        Self {
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::new(config)))),
            clock,
            last_tick: Arc::new(RwLock::new(None)),
            sinks,
            tick_sender,
            phase_sender,
            effect_sender,
            system_event_sender,
            effect_watchers: Arc::new(RwLock::new(SlotMap::with_key())),
        }
    }

    /// Runs the engine until Ctrl+C is pressed.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Press Ctrl+C to shut down.");
        self.run_until(async { tokio::signal::ctrl_c().await.map_err(anyhow::Error::from) })
            .await
    }

    /// Runs the engine until `shutdown` resolves.
    ///
    /// This method will:
    /// 1. Spawn the `Ticker` task.
    /// 2. Spawn the dispatcher task that turns ticks into phase states and effects.
    /// 3. Wait for `shutdown`, then stop both tasks. Sink calls still in flight
    ///    are left to finish on their own.
    ///
    /// The resolution and timezone are read once here; a reload does not change them.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        info!("{} starting up...", ENGINE_NAME);
        let (shutdown_tx, _) = broadcast::channel(1);
        let snapshot = self.snapshot().await;
        if snapshot.config.threshold == ThresholdPolicy::Crossing {
            info!("'Ending soon' cues fire on threshold crossing rather than on the exact second.");
        }

        let tick_rx = self.tick_sender.subscribe();
        let dispatcher = self.clone();
        let dispatcher_handle =
            tokio::spawn(dispatcher.dispatcher_loop(tick_rx, shutdown_tx.subscribe()));

        let ticker = Ticker::new(
            snapshot.config.resolution,
            self.clock.clone(),
            self.tick_sender.clone(),
        );
        tokio::spawn(ticker.run(shutdown_tx.subscribe()));

        info!(
            "Engine running at {:?} resolution: {}",
            snapshot.config.resolution,
            snapshot.config.summary()
        );
        let result = shutdown.await;

        info!("Shutdown signal received. Broadcasting to all tasks...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
        }
        if let Err(e) = dispatcher_handle.await {
            error!("Dispatcher task ended abnormally: {}", e);
        }
        *self.last_tick.write().await = None;
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("{} has shut down.", ENGINE_NAME);
        result
    }

    #[doc(hidden)]
    async fn dispatcher_loop(
        self,
        mut tick_rx: broadcast::Receiver<Arc<TickEvent>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut snapshot = self.snapshot().await;
        let mut driver = TickDriver::new(&snapshot);
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                received = tick_rx.recv() => {
                    match received {
                        Ok(tick) => {
                            let latest = self.snapshot().await;
                            if !Arc::ptr_eq(&latest, &snapshot) {
                                driver.reconfigure(&latest);
                                snapshot = latest;
                            }
                            match driver.tick(tick.now, &snapshot) {
                                Some(outcome) => self.process_outcome(tick, outcome, &snapshot).await,
                                None => trace!("Tick #{} repeats second {}; skipped.", tick.tick_count, tick.now),
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Dispatcher fell behind by {} ticks.", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        debug!("Dispatcher loop stopped.");
    }

    #[doc(hidden)]
    async fn process_outcome(&self, tick: Arc<TickEvent>, outcome: TickOutcome, snapshot: &Snapshot) {
        trace!("Tick #{}: {}", tick.tick_count, outcome.state);
        if let Some(jump) = outcome.clock_jump {
            warn!(
                "Wall clock moved {}s between ticks ({} -> {}); exact-second cues may have been skipped.",
                jump.delta_seconds, jump.from, jump.to
            );
            self.system_event_sender
                .send(SystemEvent::ClockJumped {
                    from: jump.from,
                    to: jump.to,
                    delta_seconds: jump.delta_seconds,
                })
                .ok();
        }

        self.emit_effects(Some(tick.tick_count), outcome.effects)
            .await;

        *self.last_tick.write().await = Some(outcome.now);
        if let Some(display) = &self.sinks.display {
            display.show(&schedule::render_spans(&snapshot.schedule, outcome.now));
        }
        self.phase_sender
            .send(PhaseEvent {
                tick,
                state: outcome.state,
                current_entry: outcome.current_entry,
            })
            .ok();
    }

    /// Hands effects to watchers and subscribers in order, then to the sinks.
    #[doc(hidden)]
    async fn emit_effects(&self, tick_count: Option<u64>, effects: Vec<SideEffect>) {
        if effects.is_empty() {
            return;
        }
        {
            let mut watchers = self.effect_watchers.write().await;
            for effect in &effects {
                for (_id, watcher) in watchers.iter_mut() {
                    watcher.process_effect(effect);
                }
            }
        }
        for effect in &effects {
            debug!("Effect: {:?}", effect);
            self.effect_sender
                .send(EffectEvent {
                    tick_count,
                    effect: effect.clone(),
                })
                .ok();
        }
        self.deliver(effects);
    }

    /// Runs one tick's effects on a blocking worker, in emission order.
    /// Failures are logged and broadcast, never returned to the tick loop.
    #[doc(hidden)]
    fn deliver(&self, effects: Vec<SideEffect>) {
        let sinks = self.sinks.clone();
        let system_event_sender = self.system_event_sender.clone();
        tokio::task::spawn_blocking(move || {
            for effect in effects {
                let result = match &effect {
                    SideEffect::PlaySound(cue) => sinks.sound.play(*cue),
                    SideEffect::ShowNotification { title, message } => {
                        sinks.notifier.notify(title, message)
                    }
                };
                if let Err(e) = result {
                    warn!("Side effect {:?} failed: {}", effect, e);
                    system_event_sender
                        .send(SystemEvent::SinkFailed {
                            effect,
                            reason: e.to_string(),
                        })
                        .ok();
                }
            }
        });
    }

    /// The last processed tick while the engine runs, otherwise the clock.
    /// Queries leave the ticker's clock untouched while ticks are flowing.
    #[doc(hidden)]
    async fn query_time(&self) -> NaiveTime {
        match *self.last_tick.read().await {
            Some(now) => now,
            None => self.clock.now(),
        }
    }
}

// Public API implementation block.
impl DaycycleEngine {
    /// The configuration snapshot currently in effect.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn config(&self) -> Arc<DaycycleConfig> {
        self.snapshot().await.config.clone()
    }

    /// The phase state at the last processed tick, computed against the
    /// current configuration. Reads the clock directly when the engine is not running.
    pub async fn status(&self) -> PhaseState {
        let snapshot = self.snapshot().await;
        phase::compute(self.query_time().await, &snapshot.cycle)
    }

    /// The cached schedule for the current configuration.
    pub async fn schedule(&self) -> Arc<[ScheduleEntry]> {
        self.snapshot().await.schedule.clone()
    }

    /// The cached schedule rendered with the current entry highlighted.
    pub async fn schedule_spans(&self) -> Vec<ScheduleSpan> {
        let snapshot = self.snapshot().await;
        schedule::render_spans(&snapshot.schedule, self.query_time().await)
    }

    /// Replaces the configuration, cycle and schedule in one step.
    ///
    /// The dispatcher keeps its remembered phase, so a reload that moves the
    /// current instant into another phase is reported as a transition.
    pub async fn reload(&self, config: DaycycleConfig) {
        let summary = config.summary();
        self.sinks.sound.configure(&config.sounds);
        *self.snapshot.write().await = Arc::new(Snapshot::new(config));
        info!("Configuration reloaded: {}", summary);
        self.system_event_sender
            .send(SystemEvent::ConfigReloaded { summary })
            .ok();
    }

    /// Re-reads the configuration through `provider` and applies it.
    ///
    /// On failure the engine keeps its current configuration and the error is
    /// returned; `provider` still remembers the last good one.
    pub async fn reload_from(&self, provider: &mut ConfigProvider) -> anyhow::Result<()> {
        let config = provider.refresh()?;
        self.reload(config).await;
        Ok(())
    }

    /// Spawns a task that re-reads the configuration on every SIGHUP.
    ///
    /// A failed read is logged and the current configuration stays in effect.
    #[cfg(unix)]
    pub fn reload_on_hangup(
        &self,
        mut provider: ConfigProvider,
    ) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangups = signal(SignalKind::hangup())?;
        let engine = self.clone();
        Ok(tokio::spawn(async move {
            while hangups.recv().await.is_some() {
                info!("SIGHUP received. Reloading configuration...");
                if let Err(e) = engine.reload_from(&mut provider).await {
                    warn!("{:#}. Keeping the current configuration.", e);
                }
            }
        }))
    }

    /// Plays a cue on demand. Only allowed when `dev_mode` is enabled.
    pub async fn play_cue(&self, cue: Cue) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.config().await.dev_mode,
            "playing cues by hand requires dev_mode = true"
        );
        info!("Playing cue {} on request.", cue);
        self.emit_effects(None, vec![SideEffect::PlaySound(cue)])
            .await;
        Ok(())
    }

    /// Registers a callback run for every side effect passing `filter`.
    ///
    /// # Returns
    /// A `ListenerId` which can be used to later remove this watcher.
    pub async fn on_effect(
        &self,
        filter: EffectFilter,
        callback: impl FnMut(&SideEffect) + Send + Sync + 'static,
    ) -> ListenerId {
        let watcher = EffectWatcher::new(filter, Box::new(callback));
        let id = self.effect_watchers.write().await.insert(watcher);
        self.system_event_sender
            .send(SystemEvent::ListenerAdded { id })
            .ok();
        id
    }

    /// Removes an effect listener from the engine.
    ///
    /// Returns `true` if the listener was found and removed.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let was_removed = self.effect_watchers.write().await.remove(id).is_some();
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Subscribes to the raw `TickEvent` stream.
    pub fn subscribe_tick_events(&self) -> broadcast::Receiver<Arc<TickEvent>> {
        self.tick_sender.subscribe()
    }

    /// Subscribes to the `PhaseEvent` stream.
    pub fn subscribe_phase_events(&self) -> broadcast::Receiver<PhaseEvent> {
        self.phase_sender.subscribe()
    }

    /// Subscribes to the `EffectEvent` stream.
    pub fn subscribe_effect_events(&self) -> broadcast::Receiver<EffectEvent> {
        self.effect_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }
}
