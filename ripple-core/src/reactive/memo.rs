//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change, and only when it is read.
//!
//! # How Memos Work
//!
//! 1. A memo starts dirty. The first read runs the computation through a
//!    backing [`Effect`], caches the result and marks the memo clean.
//!
//! 2. The backing effect has a scheduler instead of re-running: when a
//!    dependency changes, the scheduler flips the memo to dirty and
//!    notifies the memo's own subscribers. A memo that is already dirty
//!    does not notify again, so a burst of upstream changes reaches
//!    downstream computations once.
//!
//! 3. The next read of a dirty memo recomputes it and rediscovers its
//!    dependencies.
//!
//! Readers subscribe to the memo itself, not to whatever the memo read.
//!
//! # Why This Matters
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::effect::{Effect, Retention};
use super::runtime::{self, Runtime};
use super::subscriber::{SubscriberId, Target, TargetId};
use crate::error::ReactiveError;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo must recompute on its next read.
    Dirty,
}

struct MemoInner<T: 'static> {
    target: Target,
    state: Rc<Cell<MemoState>>,
    value: RefCell<Option<Rc<T>>>,
    effect: Rc<Effect<T>>,
}

/// Restores the dirty flag if the computation unwinds.
struct DirtyOnUnwind<'a>(&'a Cell<MemoState>);

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(MemoState::Dirty);
        }
    }
}

impl<T: 'static> MemoInner<T> {
    fn refresh(&self) {
        if self.state.get() == MemoState::Clean {
            return;
        }
        // Cleared first: a dependency that changes while the computation is
        // still running dirties the memo again instead of being lost.
        self.state.set(MemoState::Clean);
        let _guard = DirtyOnUnwind(&self.state);
        let value = Rc::new(self.effect.run());
        let previous = self.value.replace(Some(value));
        drop(previous);
    }

    fn cached(&self) -> Option<Rc<T>> {
        self.value.borrow().clone()
    }
}

/// A cached derived value that recomputes lazily when dependencies change.
///
/// Cloning a memo yields another handle to the same cache.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let source = count.clone();
/// let double = Memo::new(move || source.get() * 2);
///
/// assert_eq!(double.get(), 4);
/// count.set(3);
/// assert_eq!(double.get(), 6);
/// ```
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let target = Target::new();
        let state = Rc::new(Cell::new(MemoState::Dirty));

        let target_id = target.id();
        let flag = Rc::clone(&state);
        let effect = Effect::with_scheduler(
            compute,
            move || {
                if flag.get() == MemoState::Clean {
                    flag.set(MemoState::Dirty);
                    runtime::trigger(target_id);
                }
            },
            Retention::Owner,
        );

        Self {
            inner: Rc::new(MemoInner {
                target,
                state,
                value: RefCell::new(None),
                effect,
            }),
        }
    }

    /// Create a memo whose writes are forwarded to `set`.
    ///
    /// The setter is expected to write some upstream signal; the memo then
    /// goes dirty through the normal graph. The cache is never written
    /// directly.
    pub fn writable<G, S>(get: G, set: S) -> WritableMemo<T>
    where
        G: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        WritableMemo {
            memo: Self::new(get),
            setter: Rc::new(set),
        }
    }

    /// Get the memo's tracking target ID.
    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    /// Get the subscriber ID of the backing computation.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.effect.id()
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Read the value by reference, recomputing if necessary.
    ///
    /// `f` sees the value as of the call and may write to signals this memo
    /// depends on.
    ///
    /// # Panics
    ///
    /// Panics with a [`ReactiveError::MemoCycle`] payload when the
    /// computation reads its own memo before a first value exists.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.refresh();
        self.inner.target.track();
        match self.inner.cached() {
            Some(value) => f(&*value),
            None => std::panic::panic_any(ReactiveError::MemoCycle { target: self.id() }),
        }
    }

    /// Get the current value without subscribing the running computation.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        Runtime::untracked(|| self.get())
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        self.inner.state.get()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.cached().is_some()
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.id())
    }

    /// Get the number of targets the latest computation read.
    pub fn dependency_count(&self) -> usize {
        self.inner.effect.dependency_count()
    }

    /// Get the number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("value", &self.inner.cached())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// A memo with a setter.
pub struct WritableMemo<T: 'static> {
    memo: Memo<T>,
    setter: Rc<dyn Fn(T)>,
}

impl<T: 'static> WritableMemo<T> {
    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.memo.get()
    }

    /// Read the value by reference, recomputing if necessary.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.memo.with(f)
    }

    /// Forward a value to the setter.
    pub fn set(&self, value: T) {
        (self.setter)(value);
    }

    /// The read-only side of this memo.
    pub fn as_memo(&self) -> &Memo<T> {
        &self.memo
    }

    /// Get the memo's tracking target ID.
    pub fn id(&self) -> TargetId {
        self.memo.id()
    }
}

impl<T: 'static> Clone for WritableMemo<T> {
    fn clone(&self) -> Self {
        Self {
            memo: self.memo.clone(),
            setter: Rc::clone(&self.setter),
        }
    }
}

impl<T: Debug + 'static> Debug for WritableMemo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableMemo")
            .field("memo", &self.memo)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
