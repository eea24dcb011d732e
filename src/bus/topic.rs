// Bus topics
// Every subscription drains its own queue on its own thread: publishing only
// enqueues, and a slow, failing or panicking subscriber never holds up the
// publisher or the other subscribers

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::bus::subscriber::{Subscriber, SubscriberError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscriptions the event was queued for
    pub queued: usize,

    /// Subscriptions whose queue had already stopped draining
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

type Entry<T> = (SubscriptionId, mpsc::UnboundedSender<T>);

pub struct Topic<T> {
    name: &'static str,
    next_id: AtomicU64,
    queues: Mutex<Vec<Entry<T>>>,
    counters: Arc<Counters>,
}

impl<T> Topic<T> {
    pub fn new(name: &'static str) -> Self {
        Topic {
            name,
            next_id: AtomicU64::new(1),
            queues: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Entry<T>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false if the id was not subscribed
    /// Events already queued for the subscription are still delivered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.entries().len()
    }

    /// Total successful deliveries since creation
    pub fn delivered_count(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    /// Total failed deliveries since creation
    pub fn failure_count(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, pending) = mpsc::unbounded_channel();
        let name = self.name;
        let counters = Arc::clone(&self.counters);

        thread::spawn(move || drain(name, id, subscriber, pending, &counters));

        self.entries().push((id, queue));
        log::debug!("Subscriber {} added to {}", id.0, self.name);
        id
    }

    /// Queue the event for every current subscriber; never waits on delivery
    pub fn publish(&self, event: &T) -> DeliveryReport {
        let snapshot: Vec<Entry<T>> = self.entries().clone();
        let mut report = DeliveryReport::default();

        for (id, queue) in snapshot {
            if queue.send(event.clone()).is_ok() {
                report.queued += 1;
            } else {
                report.dropped += 1;
                log::warn!("Subscriber {} on {} is no longer draining", id.0, self.name);
            }
        }

        report
    }
}

/// Deliver queued events until the subscription is removed
fn drain<T>(
    topic: &'static str,
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber<T>>,
    mut pending: mpsc::UnboundedReceiver<T>,
    counters: &Counters,
) {
    while let Some(event) = pending.blocking_recv() {
        let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.deliver(&event)))
            .unwrap_or_else(|panic| Err(SubscriberError::Panicked(panic_message(&*panic))));

        match outcome {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Delivery on {} to subscriber {} failed: {}", topic, id.0, e);
            }
        }
    }

    log::debug!("Subscriber {} on {} drained", id.0, topic);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
