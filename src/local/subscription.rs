//! Replay-latest multicast of rate observations.

use std::sync::Mutex;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::observable::{ObservableResult, Observation};

/// Emissions a subscriber may leave unread before it is dropped.
pub const SUBSCRIBER_BUFFER: usize = 64;

struct Registry<T> {
    subscribers: Vec<mpsc::Sender<ObservableResult<T>>>,
    latest: Option<ObservableResult<T>>,
}

/// Registry of live subscribers.
///
/// The caller supplies the current state when subscribing; that value is
/// delivered first, followed by every published value in publish order.
/// Subscribers whose stream was dropped are pruned on the next publish.
///
/// Each subscriber has a bounded queue. A subscriber that falls
/// `capacity` emissions behind is disconnected: its stream yields what was
/// already queued and then ends.
pub(crate) struct Broadcaster<T> {
    registry: Mutex<Registry<T>>,
    capacity: usize,
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_BUFFER)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry {
                subscribers: Vec::new(),
                latest: None,
            }),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self, current: ObservableResult<T>) -> Observation<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        // Cannot fail: the queue is empty and the receiver is still in scope.
        let _ = tx.try_send(current.clone());

        let mut registry = self.lock();
        registry.latest = Some(current);
        registry.subscribers.push(tx);
        drop(registry);

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|value| (value, rx))
        })
        .boxed()
    }

    /// Deliver `value` to every live subscriber; returns how many received it.
    pub(crate) fn publish(&self, value: ObservableResult<T>) -> usize {
        let mut registry = self.lock();
        Self::deliver(&mut registry, value)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        let mut registry = self.lock();
        registry.subscribers.retain(|tx| !tx.is_closed());
        registry.subscribers.len()
    }

    fn deliver(registry: &mut Registry<T>, value: ObservableResult<T>) -> usize {
        registry
            .subscribers
            .retain(|tx| tx.try_send(value.clone()).is_ok());
        registry.latest = Some(value);
        registry.subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Publish `value` unless it equals the last value delivered or replayed.
    ///
    /// Returns `None` when nothing changed.
    pub(crate) fn publish_if_changed(&self, value: ObservableResult<T>) -> Option<usize> {
        let mut registry = self.lock();
        if registry.latest.as_ref() == Some(&value) {
            return None;
        }
        Some(Self::deliver(&mut registry, value))
    }
}
