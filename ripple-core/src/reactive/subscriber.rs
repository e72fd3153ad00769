//! Identity types for the reactive graph.
//!
//! Two kinds of nodes meet in the registry: *targets* (the readable side:
//! signals and memos) and *subscribers* (the computations that read them).
//! Both are named by plain integer ids rather than by pointer identity.

use std::cell::Cell;
use std::fmt;

use super::runtime;

thread_local! {
    static NEXT_SUBSCRIBER: Cell<u64> = const { Cell::new(0) };
    static NEXT_TARGET: Cell<u64> = const { Cell::new(0) };
}

fn next_id(counter: &'static std::thread::LocalKey<Cell<u64>>) -> u64 {
    counter.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

/// Unique identifier for a subscriber (a reactive computation).
///
/// Ids are allocated from a per-thread monotonically increasing counter and
/// are never reused on that thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        Self(next_id(&NEXT_SUBSCRIBER))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Unique identifier for a tracking target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// An opaque tracking target.
///
/// Every signal and memo owns exactly one. The target is the key of its
/// subscriber set in the registry; dropping it releases that set.
#[derive(Debug)]
pub struct Target {
    id: TargetId,
}

impl Target {
    /// Allocate a fresh target.
    pub fn new() -> Self {
        Self {
            id: TargetId(next_id(&NEXT_TARGET)),
        }
    }

    /// The target's identifier.
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Subscribe the running computation, if any, to this target.
    pub fn track(&self) {
        runtime::track(self.id);
    }

    /// Notify every current subscriber of this target.
    pub fn trigger(&self) {
        runtime::trigger(self.id);
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Target {
    fn drop(&mut self) {
        runtime::release_target(self.id);
    }
}

/// A computation that can be notified when a target it read changes.
///
/// Implemented by [`Effect`](super::Effect); the registry stores subscribers
/// as trait objects so that effects of different value types share one graph.
pub trait Subscriber {
    /// The subscriber's identifier.
    fn id(&self) -> SubscriberId;

    /// Whether the subscriber still participates in the graph.
    fn is_active(&self) -> bool;

    /// React to a change of one of the subscriber's dependencies.
    fn notify(&self);

    /// Deactivate the subscriber for good.
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
        assert!(id1 < id2 && id2 < id3);
    }

    #[test]
    fn targets_compare_by_id() {
        let a = Target::new();
        let b = Target::new();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
        assert!(a.id().to_string().starts_with("target#"));
    }
}
