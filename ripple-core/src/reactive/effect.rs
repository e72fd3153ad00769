//! Effect Implementation
//!
//! An [`Effect`] is the reactive computation every higher-level primitive is
//! built on: a function to run, an optional scheduler to call when a
//! dependency changes, and an active flag.
//!
//! # How Effects Work
//!
//! 1. [`Effect::run`] tears down the effect's previous dependency edges,
//!    makes it the current computation, and calls the function. Every
//!    signal or memo read during the call subscribes the effect again.
//!
//! 2. When a dependency changes, the runtime notifies the effect. With a
//!    scheduler the scheduler decides what to do (a memo only marks itself
//!    dirty); without one the effect simply runs again.
//!
//! 3. [`Effect::stop`] deactivates the effect for good. A stopped effect can
//!    still be run by hand; it then computes its value without tracking.
//!
//! Rebuilding the full dependency set on every run makes conditional reads
//! correct: a branch that is no longer taken stops being tracked.
//!
//! # Ownership
//!
//! With [`Retention::Runtime`] the runtime keeps the effect alive until it is
//! stopped; watchers use this so that dropping their stop handle does not
//! cancel them. With [`Retention::Owner`] the runtime only holds a weak link
//! and the effect leaves the graph when its owner drops it.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::TrackingScope;
use super::runtime::{self, Link};
use super::subscriber::{Subscriber, SubscriberId};

/// Who keeps an [`Effect`] alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// The runtime holds the effect until [`Effect::stop`] is called.
    Runtime,
    /// The caller holds the effect; the runtime keeps only a weak link.
    Owner,
}

/// A re-runnable reactive computation.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Effect, Retention, Signal};
///
/// let count = Signal::new(1);
/// let source = count.clone();
/// let effect = Effect::new(move || source.get() * 10, Retention::Owner);
///
/// assert_eq!(effect.run(), 10);
/// assert_eq!(effect.dependency_count(), 1);
/// ```
pub struct Effect<T: 'static> {
    id: SubscriberId,
    run: Box<dyn Fn() -> T>,
    scheduler: Option<Box<dyn Fn()>>,
    active: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T: 'static> Effect<T> {
    /// Create an effect that re-runs itself when a dependency changes.
    ///
    /// The function is not run; call [`run`](Self::run) to establish the
    /// initial dependencies.
    pub fn new<F>(run: F, retention: Retention) -> Rc<Self>
    where
        F: Fn() -> T + 'static,
    {
        Self::build(Box::new(run), None, retention)
    }

    /// Create an effect that calls `scheduler` instead of re-running.
    pub fn with_scheduler<F, S>(run: F, scheduler: S, retention: Retention) -> Rc<Self>
    where
        F: Fn() -> T + 'static,
        S: Fn() + 'static,
    {
        Self::build(Box::new(run), Some(Box::new(scheduler)), retention)
    }

    fn build(
        run: Box<dyn Fn() -> T>,
        scheduler: Option<Box<dyn Fn()>>,
        retention: Retention,
    ) -> Rc<Self> {
        let effect = Rc::new(Self {
            id: SubscriberId::new(),
            run,
            scheduler,
            active: Cell::new(true),
            run_count: Cell::new(0),
        });
        let link = match retention {
            Retention::Runtime => Link::Retained(Rc::clone(&effect) as Rc<dyn Subscriber>),
            Retention::Owner => Link::Weak(Rc::downgrade(&effect) as Weak<dyn Subscriber>),
        };
        runtime::register(effect.id, link);
        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Run the function and return its value.
    ///
    /// An active effect rebuilds its dependency set during the call. A
    /// stopped effect runs untracked and leaves the graph untouched.
    pub fn run(&self) -> T {
        self.run_count.set(self.run_count.get() + 1);

        if !self.active.get() {
            let _scope = TrackingScope::untracked();
            return (self.run)();
        }

        runtime::teardown(self.id);
        let _scope = TrackingScope::enter(self.id);
        runtime::record_run(self.id);
        (self.run)()
    }

    /// Deactivate the effect and drop all of its edges.
    ///
    /// Idempotent. If the runtime was keeping the effect alive, it lets go.
    pub fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }
        runtime::release(self.id);
    }

    /// Whether the effect still participates in the graph.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Get the number of times the function has been called.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Get the number of dependencies recorded by the latest run.
    pub fn dependency_count(&self) -> usize {
        runtime::Runtime::dependency_count(self.id)
    }
}

impl<T: 'static> Subscriber for Effect<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn notify(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn stop(&self) {
        Effect::stop(self);
    }
}

impl<T: 'static> Drop for Effect<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("has_scheduler", &self.scheduler.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
