//! Ripple Core
//!
//! This crate provides a fine-grained reactive dependency-tracking runtime.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Automatic dependency discovery, rebuilt on every run
//! - Eager watchers with per-run cleanup
//! - Derived collection helpers over plain and reactive vectors
//!
//! The runtime is synchronous, single-threaded and in-memory. Rendering,
//! templating and any I/O belong to the callers.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `collections`: `map_array` / `filter_array` / `reduce_array`
//! - `error`: Errors the runtime detects itself
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ripple_core::reactive::{watch_effect, Memo, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let source = count.clone();
//! let doubled = Memo::new(move || source.get() * 2);
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let (reader, sink) = (doubled.clone(), Rc::clone(&log));
//! let stop = watch_effect(move |_| sink.borrow_mut().push(reader.get()));
//!
//! // Update the signal; the effect runs before `set` returns
//! count.set(5);
//! assert_eq!(*log.borrow(), vec![0, 10]);
//!
//! stop.stop();
//! ```

pub mod collections;
pub mod error;
pub mod reactive;

pub use collections::{
    filter_array, map_array, reduce_array, reduce_array_first, ArrayMethods, ArraySource, Getter,
};
pub use error::ReactiveError;
pub use reactive::{
    watch, watch_effect, watch_once, Memo, OnCleanup, Runtime, Signal, StopHandle, WatchOptions,
    WritableMemo,
};
