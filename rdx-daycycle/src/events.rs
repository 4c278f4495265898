//! Defines all public event types broadcast by the Daycycle engine.
//!
//! This module acts as the public API for the engine's event system. Listeners
//! subscribe to these specific, strongly-typed events to follow the cycle.

use crate::common::ListenerId;
use crate::components::dispatcher::SideEffect;
use crate::phase::PhaseState;
use crate::time::TickEvent;
use chrono::NaiveTime;
use std::sync::Arc;
use tokio::time::Instant;

/// Fired once for every processed tick.
#[derive(Debug, Clone)]
pub struct PhaseEvent {
    /// The tick this state was computed for.
    pub tick: Arc<TickEvent>,
    pub state: PhaseState,
    /// Index of the schedule entry containing the tick, if any.
    pub current_entry: Option<usize>,
}

/// Fired for every side effect, in emission order.
#[derive(Debug, Clone)]
pub struct EffectEvent {
    /// The tick that produced the effect, `None` for a manually played cue.
    pub tick_count: Option<u64>,
    pub effect: SideEffect,
}

/// Events related to the lifecycle and health of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's dispatcher loop begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// Fired after a new configuration replaced the old one.
    ConfigReloaded { summary: String },
    /// Fired when a new listener is successfully added to the engine.
    ListenerAdded { id: ListenerId },
    /// Fired when a listener is removed from the engine.
    ListenerRemoved { id: ListenerId },
    /// The wall clock moved by something other than one second between ticks.
    /// "Ending soon" cues may have been skipped.
    ClockJumped {
        from: NaiveTime,
        to: NaiveTime,
        delta_seconds: i64,
    },
    /// A sink could not carry out a side effect.
    SinkFailed { effect: SideEffect, reason: String },
}
