//! Derived Collection Helpers
//!
//! `map_array`, `filter_array` and `reduce_array` work on both plain and
//! reactive collections:
//!
//! - Given a plain `Vec<T>` or `&[T]`, the transform runs right away and the
//!   result is returned as is.
//! - Given a reactive source (a signal or memo holding a `Vec<T>`, or a
//!   [`Getter`]), the result is a [`Memo`] that re-applies the transform
//!   whenever the source changes.
//!
//! There is no incremental diffing: any change to the source recomputes the
//! whole transform on the next read.
//!
//! Callbacks receive each item together with its index and the full slice.

use crate::reactive::{Memo, Signal, WritableMemo};

/// A collection the helpers can transform, plain or reactive.
pub trait ArraySource<T>: Sized {
    /// What a transform producing `R` returns for this source.
    type Output<R: 'static>;

    /// Apply `transform` to the items, now or reactively.
    fn derive<R, F>(self, transform: F) -> Self::Output<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static;
}

impl<T> ArraySource<T> for Vec<T> {
    type Output<R: 'static> = R;

    fn derive<R, F>(self, transform: F) -> R
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static,
    {
        transform(&self)
    }
}

impl<T> ArraySource<T> for &[T] {
    type Output<R: 'static> = R;

    fn derive<R, F>(self, transform: F) -> R
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static,
    {
        transform(self)
    }
}

impl<T: 'static> ArraySource<T> for Signal<Vec<T>> {
    type Output<R: 'static> = Memo<R>;

    fn derive<R, F>(self, transform: F) -> Memo<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static,
    {
        Memo::new(move || self.with(|items| transform(items)))
    }
}

impl<T: 'static> ArraySource<T> for Memo<Vec<T>> {
    type Output<R: 'static> = Memo<R>;

    fn derive<R, F>(self, transform: F) -> Memo<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static,
    {
        Memo::new(move || self.with(|items| transform(items)))
    }
}

impl<T: 'static> ArraySource<T> for WritableMemo<Vec<T>> {
    type Output<R: 'static> = Memo<R>;

    fn derive<R, F>(self, transform: F) -> Memo<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + 'static,
    {
        self.as_memo().clone().derive(transform)
    }
}

/// A reactive getter used as a collection source.
///
/// Closures need the wrapper so they are not mistaken for plain collections.
#[derive(Debug, Clone, Copy)]
pub struct Getter<F>(pub F);

impl<T, F> ArraySource<T> for Getter<F>
where
    T: 'static,
    F: Fn() -> Vec<T> + 'static,
{
    type Output<R: 'static> = Memo<R>;

    fn derive<R, G>(self, transform: G) -> Memo<R>
    where
        R: 'static,
        G: Fn(&[T]) -> R + 'static,
    {
        let Getter(getter) = self;
        Memo::new(move || transform(&getter()))
    }
}

/// Map every item.
pub fn map_array<T, U, S, F>(source: S, mapper: F) -> S::Output<Vec<U>>
where
    S: ArraySource<T>,
    U: 'static,
    F: Fn(&T, usize, &[T]) -> U + 'static,
{
    source.derive(move |items: &[T]| {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| mapper(item, index, items))
            .collect()
    })
}

/// Keep the items matching `predicate`.
pub fn filter_array<T, S, F>(source: S, predicate: F) -> S::Output<Vec<T>>
where
    S: ArraySource<T>,
    T: Clone + 'static,
    F: Fn(&T, usize, &[T]) -> bool + 'static,
{
    source.derive(move |items: &[T]| {
        items
            .iter()
            .enumerate()
            .filter(|(index, item)| predicate(*item, *index, items))
            .map(|(_, item)| item.clone())
            .collect()
    })
}

/// Fold the items into an accumulator starting from `initial`.
pub fn reduce_array<T, R, S, F>(source: S, reducer: F, initial: R) -> S::Output<R>
where
    S: ArraySource<T>,
    R: Clone + 'static,
    F: Fn(R, &T, usize, &[T]) -> R + 'static,
{
    source.derive(move |items: &[T]| {
        items
            .iter()
            .enumerate()
            .fold(initial.clone(), |acc, (index, item)| {
                reducer(acc, item, index, items)
            })
    })
}

/// Fold the items using the first one as the seed.
///
/// Yields `None` for an empty collection.
pub fn reduce_array_first<T, S, F>(source: S, reducer: F) -> S::Output<Option<T>>
where
    S: ArraySource<T>,
    T: Clone + 'static,
    F: Fn(T, &T, usize, &[T]) -> T + 'static,
{
    source.derive(move |items: &[T]| {
        let (first, rest) = items.split_first()?;
        Some(
            rest.iter()
                .enumerate()
                .fold(first.clone(), |acc, (offset, item)| {
                    reducer(acc, item, offset + 1, items)
                }),
        )
    })
}

/// Method-style access to the helpers on any clonable source.
///
/// ```rust
/// use ripple_core::collections::ArrayMethods;
/// use ripple_core::reactive::Signal;
///
/// let todos = Signal::new(vec!["write", "test", "ship"]);
/// let lengths = todos.map_items(|todo, _, _| todo.len());
///
/// assert_eq!(lengths.get(), vec![5, 4, 4]);
/// todos.update(|list| list[..2].to_vec());
/// assert_eq!(lengths.get(), vec![5, 4]);
/// ```
pub trait ArrayMethods<T>: ArraySource<T> + Clone {
    /// See [`map_array`].
    fn map_items<U, F>(&self, mapper: F) -> Self::Output<Vec<U>>
    where
        U: 'static,
        F: Fn(&T, usize, &[T]) -> U + 'static,
    {
        map_array(self.clone(), mapper)
    }

    /// See [`filter_array`].
    fn filter_items<F>(&self, predicate: F) -> Self::Output<Vec<T>>
    where
        T: Clone + 'static,
        F: Fn(&T, usize, &[T]) -> bool + 'static,
    {
        filter_array(self.clone(), predicate)
    }

    /// See [`reduce_array`].
    fn reduce_items<R, F>(&self, reducer: F, initial: R) -> Self::Output<R>
    where
        R: Clone + 'static,
        F: Fn(R, &T, usize, &[T]) -> R + 'static,
    {
        reduce_array(self.clone(), reducer, initial)
    }
}

impl<T, S> ArrayMethods<T> for S where S: ArraySource<T> + Clone {}
