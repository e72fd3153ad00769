//! Watchers
//!
//! Watchers are the eager side of the runtime: they re-run synchronously,
//! inside the write that changed one of their dependencies.
//!
//! - [`watch_effect`] re-runs a body whenever anything it read changes.
//! - [`watch`] re-evaluates a source and calls a callback when the value
//!   differs from the previous one.
//! - [`watch_once`] is a [`watch`] that delivers a single callback.
//!
//! Every watcher hands back a [`StopHandle`]. The runtime keeps watchers
//! alive until they are stopped; dropping the handle does not stop them.
//!
//! There is no batching: N writes in a row to dependencies of one watcher
//! run it N times.
//!
//! # Cleanup
//!
//! Effect bodies and callbacks receive an [`OnCleanup`]. A registered
//! cleanup runs right before the next run of the same watcher, or when it is
//! stopped. A cleanup that panics is caught, logged and counted in
//! [`RuntimeStats::cleanup_failures`](super::RuntimeStats); it never blocks
//! the next run or the stop.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::effect::{Effect, Retention};
use super::memo::{Memo, WritableMemo};
use super::runtime;
use super::signal::Signal;
use super::subscriber::Subscriber;
use crate::error::ReactiveError;

/// Registration point for the cleanup of the current run.
#[derive(Default)]
pub struct OnCleanup {
    pending: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl OnCleanup {
    fn new() -> Self {
        Self::default()
    }

    /// Register `cleanup`, replacing any cleanup registered earlier in this run.
    pub fn register<F>(&self, cleanup: F)
    where
        F: FnOnce() + 'static,
    {
        *self.pending.borrow_mut() = Some(Box::new(cleanup));
    }

    /// Whether a cleanup is waiting to run.
    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Run and clear the pending cleanup, swallowing a panic.
    fn flush(&self) {
        let Some(cleanup) = self.pending.borrow_mut().take() else {
            return;
        };
        if let Err(error) = run_cleanup(cleanup) {
            runtime::record_cleanup_failure(&error);
        }
    }
}

impl fmt::Debug for OnCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnCleanup")
            .field("pending", &self.is_pending())
            .finish()
    }
}

fn run_cleanup(cleanup: Box<dyn FnOnce()>) -> Result<(), ReactiveError> {
    panic::catch_unwind(AssertUnwindSafe(cleanup))
        .map_err(|payload| ReactiveError::from_panic(payload.as_ref()))
}

/// Disposer returned by every watcher.
///
/// Cloning yields another handle to the same watcher.
#[derive(Clone)]
pub struct StopHandle {
    subscriber: Weak<dyn Subscriber>,
    cleanup: Rc<OnCleanup>,
}

impl StopHandle {
    fn new<T: 'static>(effect: &Rc<Effect<T>>, cleanup: Rc<OnCleanup>) -> Self {
        Self {
            subscriber: Rc::downgrade(effect) as Weak<dyn Subscriber>,
            cleanup,
        }
    }

    /// Run the pending cleanup, then deactivate the watcher.
    ///
    /// Calling it again is a no-op.
    pub fn stop(&self) {
        let Some(subscriber) = self.subscriber.upgrade() else {
            return;
        };
        if !subscriber.is_active() {
            return;
        }
        self.cleanup.flush();
        subscriber.stop();
    }

    /// Whether the watcher has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.subscriber
            .upgrade()
            .map_or(true, |subscriber| !subscriber.is_active())
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Options for [`watch`] and [`watch_once`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Call the callback once at construction, with no old value.
    pub immediate: bool,
}

impl WatchOptions {
    /// Options with `immediate` set.
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// Something a watcher can observe: a getter closure or a reactive holder.
pub trait WatchSource<T> {
    /// Turn the source into a plain getter.
    fn into_getter(self) -> Box<dyn Fn() -> T>;
}

impl<T, F> WatchSource<T> for F
where
    F: Fn() -> T + 'static,
{
    fn into_getter(self) -> Box<dyn Fn() -> T> {
        Box::new(self)
    }
}

impl<T: Clone + 'static> WatchSource<T> for Signal<T> {
    fn into_getter(self) -> Box<dyn Fn() -> T> {
        Box::new(move || self.get())
    }
}

impl<T: Clone + 'static> WatchSource<T> for Memo<T> {
    fn into_getter(self) -> Box<dyn Fn() -> T> {
        Box::new(move || self.get())
    }
}

impl<T: Clone + 'static> WatchSource<T> for WritableMemo<T> {
    fn into_getter(self) -> Box<dyn Fn() -> T> {
        Box::new(move || self.get())
    }
}

/// Run `body` now and again every time something it read changes.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::reactive::{watch_effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let (source, sink) = (count.clone(), Rc::clone(&seen));
/// let stop = watch_effect(move |_| sink.set(source.get()));
///
/// count.set(7);
/// assert_eq!(seen.get(), 7);
///
/// stop.stop();
/// count.set(8);
/// assert_eq!(seen.get(), 7);
/// ```
pub fn watch_effect<F>(body: F) -> StopHandle
where
    F: Fn(&OnCleanup) + 'static,
{
    let cleanup = Rc::new(OnCleanup::new());
    let pending = Rc::clone(&cleanup);
    let effect = Effect::new(
        move || {
            pending.flush();
            body(&*pending);
        },
        Retention::Runtime,
    );
    effect.run();
    StopHandle::new(&effect, cleanup)
}

struct WatchJob<T: 'static, F> {
    effect: OnceCell<Weak<Effect<T>>>,
    previous: RefCell<Option<T>>,
    cleanup: Rc<OnCleanup>,
    callback: F,
}

impl<T, F> WatchJob<T, F>
where
    T: Clone + PartialEq + 'static,
    F: Fn(&T, Option<&T>, &OnCleanup),
{
    fn run(&self) {
        let Some(effect) = self.effect.get().and_then(Weak::upgrade) else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let value = effect.run();
        let previous = {
            let mut previous = self.previous.borrow_mut();
            if previous.as_ref() == Some(&value) {
                return;
            }
            previous.replace(value.clone())
        };

        self.cleanup.flush();
        (self.callback)(&value, previous.as_ref(), &*self.cleanup);
    }
}

/// Call `callback` whenever the value of `source` changes.
///
/// The callback receives the new value, the previous one (`None` on the
/// immediate first call) and the cleanup registration point. Without
/// [`WatchOptions::immediate`] the source is still evaluated once at
/// construction to record the baseline, but the callback is not called.
pub fn watch<T, S, F>(source: S, callback: F, options: WatchOptions) -> StopHandle
where
    T: Clone + PartialEq + 'static,
    S: WatchSource<T>,
    F: Fn(&T, Option<&T>, &OnCleanup) + 'static,
{
    let job = Rc::new(WatchJob {
        effect: OnceCell::new(),
        previous: RefCell::new(None),
        cleanup: Rc::new(OnCleanup::new()),
        callback,
    });

    let scheduled = Rc::clone(&job);
    let effect = Effect::with_scheduler(
        source.into_getter(),
        move || scheduled.run(),
        Retention::Runtime,
    );
    let _ = job.effect.set(Rc::downgrade(&effect));

    if options.immediate {
        job.run();
    } else {
        let baseline = effect.run();
        *job.previous.borrow_mut() = Some(baseline);
    }

    StopHandle::new(&effect, Rc::clone(&job.cleanup))
}

/// Like [`watch`], but the callback runs at most once; the watcher stops
/// itself right after.
pub fn watch_once<T, S, F>(source: S, callback: F, options: WatchOptions) -> StopHandle
where
    T: Clone + PartialEq + 'static,
    S: WatchSource<T>,
    F: Fn(&T, Option<&T>, &OnCleanup) + 'static,
{
    let handle: Rc<RefCell<Option<StopHandle>>> = Rc::default();
    let fired = Rc::new(Cell::new(false));

    let (slot, done) = (Rc::clone(&handle), Rc::clone(&fired));
    let stop = watch(
        source,
        move |value: &T, previous: Option<&T>, on_cleanup: &OnCleanup| {
            if done.replace(true) {
                return;
            }
            callback(value, previous, on_cleanup);
            let own = slot.borrow().clone();
            if let Some(own) = own {
                own.stop();
            }
        },
        options,
    );

    // With `immediate` the callback already ran, before the handle existed.
    if fired.get() {
        stop.stop();
    } else {
        *handle.borrow_mut() = Some(stop.clone());
    }
    stop
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    fn bump(count: &Cell<u32>) {
        count.set(count.get() + 1);
    }

    #[test]
    fn watch_effect_runs_once_per_write() {
        let signal = Signal::new(0);
        let (runs, runs_clone) = counter();
        let source = signal.clone();
        let _stop = watch_effect(move |_| {
            source.get();
            bump(&runs_clone);
        });
        assert_eq!(runs.get(), 1);

        signal.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn watch_effect_does_not_coalesce_writes() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let (runs, runs_clone) = counter();
        let (sa, sb) = (a.clone(), b.clone());
        let _stop = watch_effect(move |_| {
            sa.get();
            sb.get();
            bump(&runs_clone);
        });

        a.set(1);
        b.set(1);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn cleanup_runs_before_next_run_and_on_stop() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (source, sink) = (signal.clone(), Rc::clone(&log));
        let stop = watch_effect(move |on_cleanup| {
            let value = source.get();
            sink.borrow_mut().push(format!("run {value}"));
            let sink = Rc::clone(&sink);
            on_cleanup.register(move || sink.borrow_mut().push(format!("cleanup {value}")));
        });

        signal.set(1);
        stop.stop();
        stop.stop();
        signal.set(2);

        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn panicking_cleanup_is_swallowed() {
        Runtime::reset_stats();
        let signal = Signal::new(0);
        let (runs, runs_clone) = counter();
        let source = signal.clone();
        let stop = watch_effect(move |on_cleanup| {
            source.get();
            bump(&runs_clone);
            on_cleanup.register(|| panic!("broken cleanup"));
        });

        signal.set(1);
        assert_eq!(runs.get(), 2);

        stop.stop();
        assert!(stop.is_stopped());
        assert_eq!(Runtime::stats().cleanup_failures, 2);
    }

    #[test]
    fn dropping_the_handle_does_not_stop() {
        let signal = Signal::new(0);
        let (runs, runs_clone) = counter();
        let source = signal.clone();
        drop(watch_effect(move |_| {
            source.get();
            bump(&runs_clone);
        }));

        signal.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn watch_is_lazy_without_immediate() {
        let signal = Signal::new(1);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let _stop = watch(
            signal.clone(),
            move |value: &i32, previous: Option<&i32>, _: &OnCleanup| {
                sink.borrow_mut().push((*value, previous.copied()));
            },
            WatchOptions::default(),
        );
        assert!(calls.borrow().is_empty());

        signal.set(2);
        signal.set(3);
        assert_eq!(*calls.borrow(), vec![(2, Some(1)), (3, Some(2))]);
    }

    #[test]
    fn watch_immediate_fires_with_no_old_value() {
        let signal = Signal::new(1);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let _stop = watch(
            signal.clone(),
            move |value: &i32, previous: Option<&i32>, _: &OnCleanup| {
                sink.borrow_mut().push((*value, previous.copied()));
            },
            WatchOptions::immediate(),
        );
        assert_eq!(*calls.borrow(), vec![(1, None)]);

        signal.set(5);
        assert_eq!(*calls.borrow(), vec![(1, None), (5, Some(1))]);
    }

    #[test]
    fn watch_skips_unchanged_derived_values() {
        let signal = Signal::new(1);
        let (calls, sink) = counter();
        let source = signal.clone();
        let _stop = watch(
            move || source.get() % 2,
            move |_: &i32, _: Option<&i32>, _: &OnCleanup| bump(&sink),
            WatchOptions::default(),
        );

        signal.set(3);
        assert_eq!(calls.get(), 0);
        signal.set(4);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn watch_cleanup_runs_before_next_callback() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let stop = watch(
            signal.clone(),
            move |value: &i32, _: Option<&i32>, on_cleanup: &OnCleanup| {
                sink.borrow_mut().push(format!("cb {value}"));
                let sink = Rc::clone(&sink);
                let value = *value;
                on_cleanup.register(move || sink.borrow_mut().push(format!("cleanup {value}")));
            },
            WatchOptions::default(),
        );

        signal.set(1);
        signal.set(2);
        stop.stop();

        assert_eq!(
            *log.borrow(),
            vec!["cb 1", "cleanup 1", "cb 2", "cleanup 2"]
        );
    }

    #[test]
    fn watch_accepts_memo_sources() {
        let signal = Signal::new(2);
        let source = signal.clone();
        let squared = Memo::new(move || source.get() * source.get());
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let _stop = watch(
            squared,
            move |value: &i32, _: Option<&i32>, _: &OnCleanup| sink.set(*value),
            WatchOptions::default(),
        );

        signal.set(3);
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn watch_once_fires_exactly_once() {
        let signal = Signal::new("a".to_string());
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let stop = watch_once(
            signal.clone(),
            move |value: &String, _: Option<&String>, _: &OnCleanup| {
                sink.borrow_mut().push(value.clone());
            },
            WatchOptions::default(),
        );

        signal.set("b".to_string());
        signal.set("c".to_string());
        assert_eq!(*calls.borrow(), vec!["b"]);
        assert!(stop.is_stopped());
    }

    #[test]
    fn watch_once_immediate_fires_exactly_once() {
        let signal = Signal::new(0);
        let (calls, sink) = counter();
        let stop = watch_once(
            signal.clone(),
            move |_: &i32, _: Option<&i32>, _: &OnCleanup| bump(&sink),
            WatchOptions::immediate(),
        );

        signal.set(1);
        signal.set(2);
        assert_eq!(calls.get(), 1);
        assert!(stop.is_stopped());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn stop_inside_own_body() {
        let signal = Signal::new(0);
        let handle: Rc<RefCell<Option<StopHandle>>> = Rc::default();
        let (runs, runs_clone) = counter();
        let (source, slot) = (signal.clone(), Rc::clone(&handle));
        let stop = watch_effect(move |_| {
            bump(&runs_clone);
            if source.get() > 0 {
                if let Some(stop) = slot.borrow().as_ref() {
                    stop.stop();
                }
            }
        });
        *handle.borrow_mut() = Some(stop.clone());

        signal.set(1);
        signal.set(2);
        assert_eq!(runs.get(), 2);
        assert!(stop.is_stopped());
    }
}
