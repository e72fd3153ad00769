//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running a computation pushes a
//! frame naming it; the frame is popped when the guard returned by
//! [`TrackingScope::enter`] is dropped, so the previous computation becomes
//! current again even if the run unwinds.
//!
//! A frame may also be *untracked*: reads inside it subscribe nobody. This
//! is how stopped computations and [`Runtime::untracked`](super::Runtime::untracked)
//! run without touching the graph.

use std::cell::RefCell;

use super::runtime;
use super::SubscriberId;
use crate::error::ReactiveError;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<SubscriberId>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context frame when dropped.
#[derive(Debug)]
pub struct TrackingScope {
    frame: Option<SubscriberId>,
}

impl TrackingScope {
    /// Make `subscriber_id` the current computation until the guard drops.
    ///
    /// # Panics
    ///
    /// Panics with a [`ReactiveError::ReentryExceeded`] payload when
    /// `subscriber_id` already has [`RuntimeConfig::max_reentry`] frames on
    /// the stack.
    ///
    /// [`RuntimeConfig::max_reentry`]: super::RuntimeConfig::max_reentry
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Suspend tracking until the guard drops.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(frame: Option<SubscriberId>) -> Self {
        let limit = runtime::config().max_reentry;
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Only a computation nested inside itself counts; acyclic depth
            // is bounded by the thread's stack alone.
            let depth = match frame {
                Some(_) => stack.iter().filter(|open| **open == frame).count(),
                None => 0,
            };
            if depth < limit {
                stack.push(frame);
            }
            depth
        });
        if let (Some(subscriber), true) = (frame, depth >= limit) {
            std::panic::panic_any(ReactiveError::ReentryExceeded {
                subscriber,
                depth,
                limit,
            });
        }
        Self { frame }
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        // The stack may already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.frame),
                "TrackingScope mismatch: expected {:?}, got {:?}",
                self.frame,
                popped
            );
        });
    }
}

/// Read-only view of the tracking context.
pub struct ReactiveContext;

impl ReactiveContext {
    /// Check if a computation is currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().last().copied().flatten())
            .ok()
            .flatten()
    }

    /// Number of frames on the stack, tracked or not.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}
