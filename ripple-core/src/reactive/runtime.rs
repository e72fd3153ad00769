//! Reactive Runtime
//!
//! The runtime is the dependency registry that connects signals, memos, and
//! effects. It maps every tracking target to the set of computations that
//! read it during their latest run, and keeps the inverse edges on each
//! computation so that a re-run can drop all of them at once.
//!
//! # How It Works
//!
//! 1. When a computation is created, it registers a slot with the runtime.
//!
//! 2. When a signal or memo is read while a computation is running, the
//!    runtime records the edge in both directions.
//!
//! 3. Before a computation re-runs, all of its edges are torn down, so the
//!    run rediscovers exactly the dependencies it reads this time.
//!
//! 4. When a signal's value changes, the runtime snapshots the subscriber
//!    set and notifies each subscriber that is still active, in the order
//!    they subscribed. Memos mark themselves dirty; watchers re-run.
//!
//! # Storage
//!
//! The registry is an arena keyed by integer ids, held in a thread-local.
//! Edges are ids, never pointers, so no reference cycles form between a
//! target and its subscribers. A slot's link to its computation is either
//! retained (the registry keeps the computation alive until it is stopped)
//! or weak (the computation's owner keeps it alive).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::context::{ReactiveContext, TrackingScope};
use super::subscriber::{Subscriber, SubscriberId, TargetId};
use crate::error::ReactiveError;

/// Per-thread runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How many times one computation may be running inside itself before
    /// the runtime faults.
    pub max_reentry: usize,
}

impl RuntimeConfig {
    /// Default settings.
    pub const DEFAULT: Self = Self { max_reentry: 100 };
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Counters describing the work the runtime has done on this thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Tracked runs of computations.
    pub runs: u64,
    /// Calls to trigger, including ones that reached no subscriber.
    pub triggers: u64,
    /// Cleanup functions that panicked and were swallowed.
    pub cleanup_failures: u64,
}

/// How a registry slot refers to its computation.
pub(crate) enum Link {
    /// The registry keeps the computation alive until it is released.
    Retained(Rc<dyn Subscriber>),
    /// Someone else owns the computation.
    Weak(Weak<dyn Subscriber>),
}

impl Link {
    fn upgrade(&self) -> Option<Rc<dyn Subscriber>> {
        match self {
            Link::Retained(rc) => Some(Rc::clone(rc)),
            Link::Weak(weak) => weak.upgrade(),
        }
    }
}

struct Slot {
    link: Link,
    /// Back-links: every target whose subscriber set contains this slot.
    deps: SmallVec<[TargetId; 4]>,
}

#[derive(Default)]
struct Registry {
    deps: HashMap<TargetId, IndexSet<SubscriberId>>,
    slots: HashMap<SubscriberId, Slot>,
    stats: RuntimeStats,
}

impl Registry {
    fn unlink(&mut self, id: SubscriberId, targets: &[TargetId]) {
        for target in targets {
            if let Some(set) = self.deps.get_mut(target) {
                set.shift_remove(&id);
            }
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
    static CONFIG: Cell<RuntimeConfig> = const { Cell::new(RuntimeConfig::DEFAULT) };
}

fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

/// Like [`with_registry`] but a no-op once the thread-local is destroyed.
fn try_with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
    REGISTRY
        .try_with(|registry| f(&mut registry.borrow_mut()))
        .ok()
}

pub(crate) fn config() -> RuntimeConfig {
    CONFIG.try_with(Cell::get).unwrap_or_default()
}

/// Add a computation to the graph with no dependencies.
pub(crate) fn register(id: SubscriberId, link: Link) {
    let previous = with_registry(|r| {
        r.slots.insert(
            id,
            Slot {
                link,
                deps: SmallVec::new(),
            },
        )
    });
    // Dropped outside the registry borrow: a retained computation's drop
    // calls back into the registry.
    drop(previous);
}

/// Remove a computation and every edge it has.
pub(crate) fn release(id: SubscriberId) {
    let slot = try_with_registry(|r| {
        let slot = r.slots.remove(&id)?;
        r.unlink(id, &slot.deps);
        Some(slot)
    })
    .flatten();
    if slot.is_some() {
        debug!(subscriber = %id, "released computation");
    }
    drop(slot);
}

/// Drop all of a computation's edges ahead of a re-run.
pub(crate) fn teardown(id: SubscriberId) {
    with_registry(|r| {
        let Some(slot) = r.slots.get_mut(&id) else {
            return;
        };
        let stale = std::mem::take(&mut slot.deps);
        r.unlink(id, &stale);
    });
}

/// Subscribe the running computation to `target`.
///
/// No-op outside a tracked run. Reading the same target twice in one run
/// records a single edge.
pub(crate) fn track(target: TargetId) {
    let Some(current) = ReactiveContext::current_subscriber() else {
        return;
    };
    with_registry(|r| {
        let Registry { deps, slots, .. } = r;
        let Some(slot) = slots.get_mut(&current) else {
            return;
        };
        if deps.entry(target).or_default().insert(current) {
            slot.deps.push(target);
        }
    });
}

/// Notify every subscriber of `target`.
///
/// Works on a snapshot of the subscriber set, so subscribers may come and go
/// as a side effect of being notified. A subscriber stopped by an earlier
/// notification in the same pass is skipped.
pub(crate) fn trigger(target: TargetId) {
    let snapshot: SmallVec<[Rc<dyn Subscriber>; 8]> = with_registry(|r| {
        r.stats.triggers += 1;
        let Some(set) = r.deps.get(&target) else {
            return SmallVec::new();
        };
        set.iter()
            .filter_map(|id| r.slots.get(id))
            .filter_map(|slot| slot.link.upgrade())
            .collect()
    });
    if snapshot.is_empty() {
        return;
    }

    trace!(%target, subscribers = snapshot.len(), "trigger");
    for subscriber in &snapshot {
        if subscriber.is_active() {
            subscriber.notify();
        }
    }
}

/// Forget a target whose owner is gone.
pub(crate) fn release_target(target: TargetId) {
    let released = try_with_registry(|r| {
        let set = r.deps.remove(&target)?;
        for id in &set {
            if let Some(slot) = r.slots.get_mut(id) {
                slot.deps.retain(|t| *t != target);
            }
        }
        Some(set.len())
    })
    .flatten();
    if let Some(subscribers) = released {
        debug!(%target, subscribers, "released target");
    }
}

pub(crate) fn record_run(id: SubscriberId) {
    trace!(subscriber = %id, "run");
    with_registry(|r| r.stats.runs += 1);
}

pub(crate) fn record_cleanup_failure(error: &ReactiveError) {
    warn!(%error, "swallowed cleanup failure");
    let _ = try_with_registry(|r| r.stats.cleanup_failures += 1);
}

/// Facade over the per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Replace this thread's runtime settings.
    pub fn configure(config: RuntimeConfig) {
        CONFIG.with(|c| c.set(config));
    }

    /// This thread's runtime settings.
    pub fn config() -> RuntimeConfig {
        config()
    }

    /// Snapshot of this thread's counters.
    pub fn stats() -> RuntimeStats {
        with_registry(|r| r.stats)
    }

    /// Zero this thread's counters.
    pub fn reset_stats() {
        with_registry(|r| r.stats = RuntimeStats::default());
    }

    /// Run `f` without subscribing the current computation to anything it reads.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _scope = TrackingScope::untracked();
        f()
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracked run.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of computations currently subscribed to `target`.
    pub fn subscriber_count(target: TargetId) -> usize {
        with_registry(|r| r.deps.get(&target).map_or(0, IndexSet::len))
    }

    /// Number of targets the computation read during its latest run.
    pub fn dependency_count(id: SubscriberId) -> usize {
        with_registry(|r| r.slots.get(&id).map_or(0, |slot| slot.deps.len()))
    }

    /// Whether the computation still has a slot in the registry.
    pub fn is_registered(id: SubscriberId) -> bool {
        with_registry(|r| r.slots.contains_key(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::subscriber::Target;

    struct MockSubscriber {
        id: SubscriberId,
        active: Cell<bool>,
        notified: Cell<u32>,
    }

    impl MockSubscriber {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                active: Cell::new(true),
                notified: Cell::new(0),
            })
        }

        fn register_weak(self: &Rc<Self>) {
            let weak: Weak<dyn Subscriber> = Rc::downgrade(self) as Weak<dyn Subscriber>;
            register(self.id, Link::Weak(weak));
        }

        fn read(&self, target: &Target) {
            let _scope = TrackingScope::enter(self.id);
            target.track();
        }
    }

    impl Subscriber for MockSubscriber {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn is_active(&self) -> bool {
            self.active.get()
        }

        fn notify(&self) {
            self.notified.set(self.notified.get() + 1);
        }

        fn stop(&self) {
            self.active.set(false);
            release(self.id);
        }
    }

    #[test]
    fn track_is_idempotent_within_a_run() {
        let target = Target::new();
        let sub = MockSubscriber::new();
        sub.register_weak();

        {
            let _scope = TrackingScope::enter(sub.id);
            target.track();
            target.track();
        }

        assert_eq!(Runtime::subscriber_count(target.id()), 1);
        assert_eq!(Runtime::dependency_count(sub.id), 1);
    }

    #[test]
    fn track_outside_a_run_is_a_noop() {
        let target = Target::new();
        target.track();
        assert_eq!(Runtime::subscriber_count(target.id()), 0);
    }

    #[test]
    fn trigger_notifies_active_subscribers_only() {
        let target = Target::new();
        let live = MockSubscriber::new();
        let stopped = MockSubscriber::new();
        live.register_weak();
        stopped.register_weak();
        live.read(&target);
        stopped.read(&target);

        stopped.active.set(false);
        target.trigger();

        assert_eq!(live.notified.get(), 1);
        assert_eq!(stopped.notified.get(), 0);
    }

    #[test]
    fn teardown_drops_every_edge() {
        let a = Target::new();
        let b = Target::new();
        let sub = MockSubscriber::new();
        sub.register_weak();
        {
            let _scope = TrackingScope::enter(sub.id);
            a.track();
            b.track();
        }
        assert_eq!(Runtime::dependency_count(sub.id), 2);

        teardown(sub.id);

        assert_eq!(Runtime::dependency_count(sub.id), 0);
        assert_eq!(Runtime::subscriber_count(a.id()), 0);
        assert_eq!(Runtime::subscriber_count(b.id()), 0);
        a.trigger();
        assert_eq!(sub.notified.get(), 0);
    }

    #[test]
    fn dropped_weak_subscriber_is_skipped() {
        let target = Target::new();
        let sub = MockSubscriber::new();
        sub.register_weak();
        sub.read(&target);
        let id = sub.id;
        drop(sub);

        // Slot outlives the subscriber until released; trigger must not panic.
        target.trigger();
        release(id);
        assert!(!Runtime::is_registered(id));
        assert_eq!(Runtime::subscriber_count(target.id()), 0);
    }

    #[test]
    fn dropping_a_target_clears_back_links() {
        let sub = MockSubscriber::new();
        sub.register_weak();
        {
            let target = Target::new();
            sub.read(&target);
            assert_eq!(Runtime::dependency_count(sub.id), 1);
        }
        assert_eq!(Runtime::dependency_count(sub.id), 0);
    }

    #[test]
    fn stats_count_runs_and_triggers() {
        Runtime::reset_stats();
        let target = Target::new();
        target.trigger();
        record_run(SubscriberId::new());

        let stats = Runtime::stats();
        assert_eq!(stats.triggers, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.cleanup_failures, 0);
    }

    #[test]
    fn configure_replaces_settings() {
        Runtime::configure(RuntimeConfig { max_reentry: 3 });
        assert_eq!(Runtime::config().max_reentry, 3);

        let a = SubscriberId::new();
        let result = std::panic::catch_unwind(|| {
            let _one = TrackingScope::enter(a);
            let _two = TrackingScope::enter(a);
            let _three = TrackingScope::enter(a);
            let _four = TrackingScope::enter(a);
        });
        Runtime::configure(RuntimeConfig::default());

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
