//! Contains the building blocks of the per-tick phase logic.
//!
//! The dispatcher turns phase states into side effects, the driver wraps it
//! with the per-tick bookkeeping, and watchers let application code listen to
//! the effects. The `DaycycleEngine` ties these to the ticker and the sinks.

pub mod dispatcher;
pub mod driver;
pub mod watcher;
