//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, all subscribers are notified. Writing an equal value is a no-op.
//!
//! 3. Notifications trigger re-execution of dependent computations before
//!    the write returns.
//!
//! # Equality
//!
//! [`Signal::new`] compares with `PartialEq`. Types without a useful
//! `PartialEq` (or floats, where `NaN != NaN`) can supply their own test
//! through [`Signal::with_equality`].

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::{Target, TargetId};

/// Same-value test used to suppress no-op writes.
pub type Equality<T> = fn(&T, &T) -> bool;

struct SignalInner<T> {
    target: Target,
    value: RefCell<Rc<T>>,
    equals: Equality<T>,
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equality(value, <T as PartialEq>::eq)
    }

    /// Create a signal that uses `equals` to decide whether a write changes it.
    pub fn with_equality(value: T, equals: Equality<T>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                target: Target::new(),
                value: RefCell::new(Rc::new(value)),
                equals,
            }),
        }
    }

    /// Get the signal's tracking target ID.
    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Read the value by reference. Tracks like [`get`](Self::get).
    ///
    /// `f` sees the value as of the call and may write to any signal,
    /// this one included.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.target.track();
        f(&*self.snapshot())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        T::clone(&*self.snapshot())
    }

    /// Set a new value and notify subscribers if it differs from the old one.
    pub fn set(&self, value: T) {
        self.write(value);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&*self.snapshot());
        self.write(next);
    }

    fn snapshot(&self) -> Rc<T> {
        Rc::clone(&self.inner.value.borrow())
    }

    fn write(&self, next: T) {
        let current = self.snapshot();
        if (self.inner.equals)(&*current, &next) {
            return;
        }
        let previous = self.inner.value.replace(Rc::new(next));
        drop((current, previous));
        self.inner.target.trigger();
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.id())
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.snapshot())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
