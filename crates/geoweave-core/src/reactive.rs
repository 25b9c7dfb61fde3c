//! Multi-subscriber value streams.
//!
//! A [`Subject`] keeps an optional latest value and a list of subscribers.
//! Emissions are delivered synchronously under one lock, so every subscriber
//! observes values in the order they were emitted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::stream::{BoxStream, Stream, StreamExt};

struct Inner<T> {
    value: Option<T>,
    replay: bool,
    completed: bool,
    subscribers: Vec<UnboundedSender<T>>,
}

pub struct Subject<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// A subject holding `initial`; new subscribers receive the latest value first
    pub fn new(initial: T) -> Self {
        Self::with(Some(initial), true)
    }

    /// A subject replaying the latest value once one has been emitted
    pub fn replay() -> Self {
        Self::with(None, true)
    }

    /// A subject that only forwards emissions made after subscribing
    pub fn event() -> Self {
        Self::with(None, false)
    }

    fn with(value: Option<T>, replay: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                replay,
                completed: false,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a value to all subscribers. Ignored after completion.
    pub fn next(&self, value: T) {
        Self::emit(&mut self.lock(), value);
    }

    /// Derive the next value from the latest one under a single lock.
    ///
    /// `f` returns `None` to skip the emission. Returns whether a value was emitted.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut inner = self.lock();
        if inner.completed {
            return false;
        }
        let next = inner.value.as_ref().and_then(f);
        match next {
            Some(value) => {
                Self::emit(&mut inner, value);
                true
            }
            None => false,
        }
    }

    fn emit(inner: &mut Inner<T>, value: T) {
        if inner.completed {
            return;
        }
        inner
            .subscribers
            .retain(|subscriber| subscriber.unbounded_send(value.clone()).is_ok());
        if inner.replay {
            inner.value = Some(value);
        }
    }

    /// The latest value, if any
    pub fn get(&self) -> Option<T> {
        self.lock().value.clone()
    }

    /// Subscribe to all future emissions, starting with the latest value
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (sender, receiver) = unbounded();
        let mut inner = self.lock();
        if let Some(value) = &inner.value {
            // cannot fail, the receiver is still alive
            let _ = sender.unbounded_send(value.clone());
        }
        if !inner.completed {
            inner.subscribers.push(sender);
        }
        receiver
    }

    /// End all subscriptions; late subscribers get the last value and then end
    pub fn complete(&self) {
        let mut inner = self.lock();
        inner.completed = true;
        inner.subscribers.clear();
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }

    /// A projection of the value stream that skips consecutive duplicates
    pub fn select<U, F>(&self, f: F) -> BoxStream<'static, U>
    where
        U: Clone + PartialEq + Send + 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        distinct_until_changed(self.subscribe().map(move |value| f(&value))).boxed()
    }
}

/// Skip items equal to the previously forwarded item
pub fn distinct_until_changed<S, T>(stream: S) -> impl Stream<Item = T>
where
    S: Stream<Item = T>,
    T: Clone + PartialEq,
{
    let mut last: Option<T> = None;
    stream.filter_map(move |value| {
        let changed = last.as_ref() != Some(&value);
        if changed {
            last = Some(value.clone());
        }
        futures::future::ready(changed.then_some(value))
    })
}
