//! Typed lifecycle events and the per-element subscription bus.
//!
//! Every element dispatches a small fixed set of events as it moves through
//! its lifecycle. Observers subscribe by [`EventKind`] with [`EventBus::on`]
//! (persistent) or [`EventBus::once`] (removed after the first dispatch), and
//! unsubscribe with [`EventBus::off`]. Dispatch is synchronous within the
//! emitting call; handlers run in subscription order.

use crate::lifecycle::EndReason;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A lifecycle event with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// The element was prepared. `direct` is false when a parent composite
    /// prepared the element as part of its own preparation pass.
    Prepare {
        /// Whether `prepare` was invoked directly rather than by a parent.
        direct: bool,
    },
    /// The element started running.
    Run,
    /// A sequence is about to advance past `position`.
    Step {
        /// Position of the sequence before this step's advancement.
        position: isize,
    },
    /// The element ended.
    End {
        /// Why the element ended.
        reason: EndReason,
    },
    /// Dispatched immediately after [`LifecycleEvent::End`], so one-shot
    /// observers can react once all end bookkeeping has been recorded.
    AfterEnd {
        /// Why the element ended.
        reason: EndReason,
    },
}

impl LifecycleEvent {
    /// The kind used for subscription filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Prepare { .. } => EventKind::Prepare,
            Self::Run => EventKind::Run,
            Self::Step { .. } => EventKind::Step,
            Self::End { .. } => EventKind::End,
            Self::AfterEnd { .. } => EventKind::AfterEnd,
        }
    }
}

/// Discriminant of [`LifecycleEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Preparation completed.
    Prepare,
    /// Run started.
    Run,
    /// A sequence stepped.
    Step,
    /// The element ended.
    End,
    /// Post-end notification.
    AfterEnd,
}

/// Opaque handle identifying a subscription, consumed by [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type Handler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Entry {
    id: u64,
    kind: EventKind,
    once: bool,
    handler: Handler,
}

/// Synchronous publish/subscribe bus owned by each element.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    entries: Vec<Entry>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, false, Arc::new(handler))
    }

    /// Subscribe to the next event of `kind` only; the subscription is
    /// removed before the handler runs.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, true, Arc::new(handler))
    }

    /// Remove a subscription. Removing an already-removed subscription is a
    /// no-op.
    pub fn off(&self, subscription: Subscription) {
        self.inner
            .lock()
            .entries
            .retain(|entry| entry.id != subscription.0);
    }

    fn subscribe(&self, kind: EventKind, once: bool, handler: Handler) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            kind,
            once,
            handler,
        });
        Subscription(id)
    }

    /// Dispatch `event` to all matching subscribers, in subscription order.
    ///
    /// The bus lock is released before any handler runs, so handlers may
    /// subscribe or unsubscribe reentrantly.
    pub fn emit(&self, event: &LifecycleEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let mut inner = self.inner.lock();
            let matching: Vec<Handler> = inner
                .entries
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| Arc::clone(&entry.handler))
                .collect();
            inner.entries.retain(|entry| entry.kind != kind || !entry.once);
            matching
        };
        for handler in handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: &Arc<AtomicUsize>) -> impl Fn(&LifecycleEvent) + Send + Sync {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn on_receives_every_matching_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        bus.on(EventKind::Run, counting_handler(&seen));

        bus.emit(&LifecycleEvent::Run);
        bus.emit(&LifecycleEvent::Run);
        bus.emit(&LifecycleEvent::Step { position: 0 });

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        bus.once(EventKind::AfterEnd, counting_handler(&seen));

        let event = LifecycleEvent::AfterEnd {
            reason: EndReason::Complete,
        };
        bus.emit(&event);
        bus.emit(&event);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_the_subscription() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let subscription = bus.on(EventKind::End, counting_handler(&seen));

        bus.off(subscription);
        bus.emit(&LifecycleEvent::End {
            reason: EndReason::Complete,
        });

        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handlers_may_resubscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let bus2 = Arc::clone(&bus);
            let seen2 = Arc::clone(&seen);
            bus.once(EventKind::Run, move |_| {
                seen2.fetch_add(1, Ordering::SeqCst);
                let seen3 = Arc::clone(&seen2);
                bus2.once(EventKind::Run, move |_| {
                    seen3.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        bus.emit(&LifecycleEvent::Run);
        bus.emit(&LifecycleEvent::Run);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
