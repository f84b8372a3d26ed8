//! Event Bus
//!
//! Broadcast channel carrying assistant status transitions and spoken
//! responses to whatever front ends are attached. Events serialize to
//! a tagged JSON envelope:
//!
//! ```json
//! {"type": "status", "data": {"status": "processing"}}
//! {"type": "response", "data": {"text": "Current PM2.5 level is ..."}}
//! ```
//!
//! Publishing never blocks on a slow consumer and a consumer that went
//! away is dropped on the next publish. Subscribers only see events
//! published after they subscribed.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Assistant pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Waiting for the wake word
    Listening,
    /// A query is being answered
    Processing,
    /// Response delivered, back to quiet
    Idle,
}

/// One event on the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum BusEvent {
    /// The assistant changed phase
    Status {
        /// The new phase
        status: StatusKind,
    },
    /// A sentence for the user
    Response {
        /// The sentence text
        text: String,
    },
}

impl BusEvent {
    /// A status transition event
    pub fn status(status: StatusKind) -> Self {
        Self::Status { status }
    }

    /// A spoken response event
    pub fn response(text: impl Into<String>) -> Self {
        Self::Response { text: text.into() }
    }

    /// The JSON envelope for wire transports
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A live subscription; dropping the receiver ends it
pub struct Subscription {
    /// Identifier for [`EventBus::unsubscribe`]
    pub id: u64,
    /// The event stream
    pub events: Receiver<BusEvent>,
}

/// Fan-out of bus events to any number of subscribers
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    senders: HashMap<u64, Sender<BusEvent>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.senders.insert(id, tx);
        Subscription { id, events: rx }
    }

    /// Detach a subscriber explicitly
    pub fn unsubscribe(&self, id: u64) {
        self.lock().senders.remove(&id);
    }

    /// Deliver an event to every live subscriber
    ///
    /// Returns the number of subscribers it reached.
    pub fn publish(&self, event: &BusEvent) -> usize {
        let mut inner = self.lock();
        // send() fails only when the receiver is gone; reap those.
        inner
            .senders
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.senders.len()
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
