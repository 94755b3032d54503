//! In-process fan-out for named time broadcasts.
//!
//! The host owns a [`HoverBus`] and hands clones to whoever publishes or
//! listens. A [`HoverSubscription`] stays registered until it is dropped.

use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, TryIter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const HOVERED_TIME_CHANGED: &str = "hovered-time-changed";

/// Payload of a time broadcast; `time` is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverEvent {
    pub time: f64,
}

struct Subscriber {
    id: u64,
    event: String,
    tx: Sender<HoverEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Clone, Default)]
pub struct HoverBus {
    registry: Arc<Mutex<Registry>>,
}

impl HoverBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to every live subscriber of `event`.
    /// Returns how many received it.
    pub fn publish(&self, event: &str, payload: HoverEvent) -> usize {
        let mut registry = self.registry.lock();
        let mut delivered = 0;
        registry.subscribers.retain(|sub| {
            if sub.event != event {
                return true;
            }
            match sub.tx.send(payload) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscribe(&self, event: &str) -> HoverSubscription {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push(Subscriber {
            id,
            event: event.to_string(),
            tx,
        });
        tracing::debug!(event, id, "hover subscription registered");

        HoverSubscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .subscribers
            .iter()
            .filter(|sub| sub.event == event)
            .count()
    }
}

pub struct HoverSubscription {
    id: u64,
    rx: Receiver<HoverEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl HoverSubscription {
    pub fn receiver(&self) -> &Receiver<HoverEvent> {
        &self.rx
    }

    pub fn try_iter(&self) -> TryIter<'_, HoverEvent> {
        self.rx.try_iter()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for HoverSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().subscribers.retain(|sub| sub.id != self.id);
            tracing::debug!(id = self.id, "hover subscription released");
        }
    }
}
