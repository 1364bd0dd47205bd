//! Subscriber registry: fans decoded envelopes out to callbacks.
//!
//! Callbacks run in registration order against a snapshot of the list taken
//! when the dispatch starts, so subscribing or unsubscribing from inside a
//! callback only affects later dispatches. A callback that returns an error
//! or panics is logged and skipped; the remaining callbacks still run.

use parking_lot::Mutex;
use propsync_types::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, trace};
use uuid::Uuid;

/// Handle returned by [`SubscriberRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync>;

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks that returned `Ok`.
    pub delivered: usize,
    /// Callbacks that returned an error or panicked.
    pub failed: usize,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback. It receives every envelope dispatched after
    /// this call returns.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers.lock().push((id, Arc::new(callback)));
        trace!(%id, "subscriber added");
        id
    }

    /// Removes a callback. Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        let removed = subscribers.len() != before;
        if removed {
            trace!(%id, "subscriber removed");
        }
        removed
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().iter().any(|(sid, _)| *sid == id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Delivers `envelope` to every current subscriber.
    pub fn dispatch(&self, envelope: &EventEnvelope) -> DispatchReport {
        let snapshot: Vec<(SubscriptionId, Callback)> = self.subscribers.lock().clone();

        let mut report = DispatchReport::default();
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(envelope))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    error!(subscriber = %id, kind = %envelope.kind(), "subscriber failed: {e:#}");
                    report.failed += 1;
                }
                Err(panic) => {
                    error!(
                        subscriber = %id,
                        kind = %envelope.kind(),
                        "subscriber panicked: {}",
                        panic_message(panic.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
