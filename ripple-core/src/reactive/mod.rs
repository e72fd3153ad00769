//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects
//! and the watchers built on top of them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. A change upstream only
//! marks it dirty; it recomputes the next time it is read.
//!
//! ## Effects
//!
//! An Effect is the re-runnable computation underneath memos and watchers.
//! It records what it reads and is notified when any of it changes.
//!
//! ## Watchers
//!
//! [`watch_effect`], [`watch`] and [`watch_once`] re-run eagerly and
//! synchronously, inside the write that caused the change.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! Everything is single-threaded: signals and memos are `!Send`, and all
//! propagation finishes before the write that started it returns.

mod context;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;
mod watch;

pub use context::{ReactiveContext, TrackingScope};
pub use effect::{Effect, Retention};
pub use memo::{Memo, MemoState, WritableMemo};
pub use runtime::{Runtime, RuntimeConfig, RuntimeStats};
pub use signal::{Equality, Signal};
pub use subscriber::{Subscriber, SubscriberId, Target, TargetId};
pub use watch::{watch, watch_effect, watch_once, OnCleanup, StopHandle, WatchOptions, WatchSource};
