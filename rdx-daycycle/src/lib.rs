//! # Daycycle
//!
//! A wall-clock anchored Work/Break cycle engine for Rust.
//!
//! Daycycle alternates a subject between two phases, Work and Break, on a
//! fixed schedule that restarts at every local midnight. It fires sound cues
//! and notifications at each phase boundary and five minutes before it.
//!
//! ## Core Concepts
//!
//! - **Phase clock**: a pure mapping from a time of day to the current phase and
//!   the seconds left until the next boundary (`phase::compute`).
//! - **Schedule**: the full-day list of Work/Break intervals, built once per
//!   configuration load (`schedule::build`) and searched per tick
//!   (`schedule::locate`).
//! - **Transition dispatcher**: remembers the previous tick and decides which
//!   side effects a tick produces (`components::dispatcher`).
//! - **Engine**: a coarse ticker feeding the dispatcher, delivering effects to
//!   sinks off the tick loop and broadcasting strongly-typed events.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use daycycle::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration, falling back to the defaults.
//!     let config = ConfigProvider::new(None).load();
//!
//!     // 2. Create the engine with desktop sinks.
//!     let engine = DaycycleEngine::new(config.clone(), Sinks::desktop(&config));
//!
//!     // 3. Subscribe to an event stream before starting the engine.
//!     let mut effects = engine.subscribe_effect_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = effects.recv().await {
//!             println!("Effect: {:?}", event.effect);
//!         }
//!     });
//!
//!     // 4. Run the engine. It will shut down on Ctrl+C.
//!     engine.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Daycycle Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod phase;
pub mod schedule;
pub mod sinks;
pub mod time;

/// A prelude module for easy importing of the most common Daycycle types.
pub mod prelude {
    pub use crate::common::{Cue, ListenerId, Phase};
    pub use crate::components::dispatcher::{SideEffect, TransitionDispatcher};
    pub use crate::components::watcher::EffectFilter;
    pub use crate::config::{ConfigProvider, CycleConfig, DaycycleConfig, ThresholdPolicy};
    pub use crate::engine::{DaycycleEngine, Sinks};
    pub use crate::events::{EffectEvent, PhaseEvent, SystemEvent};
    pub use crate::phase::PhaseState;
    pub use crate::schedule::{ScheduleEntry, ScheduleSpan};
}
