use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Per-subscriber mailbox size
const SUBSCRIBER_BUFFER: usize = 32;

/// A change made to a calendar through this service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CalendarChange {
    Created {
        event_id: String,
        summary: Option<String>,
    },
    Updated {
        event_id: String,
        summary: Option<String>,
    },
    Deleted {
        event_id: String,
    },
}

struct Subscriber {
    topic: String,
    sender: mpsc::Sender<CalendarChange>,
}

/// Publish/subscribe hub for calendar changes.
///
/// Subscribers register under a unique id and a topic (the owning user);
/// a change published to a topic reaches every subscriber of that topic.
#[derive(Clone, Default)]
pub struct CalendarNotifier {
    subscribers: Arc<RwLock<HashMap<String, Subscriber>>>,
}

impl CalendarNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Re-using an id replaces the previous registration.
    pub async fn subscribe(&self, subscriber_id: &str, topic: &str) -> mpsc::Receiver<CalendarChange> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(
            subscriber_id.to_string(),
            Subscriber {
                topic: topic.to_string(),
                sender,
            },
        );
        debug!("Subscriber {} registered for {}", subscriber_id, topic);
        receiver
    }

    /// Remove a subscriber; returns whether it was registered
    pub async fn unsubscribe(&self, subscriber_id: &str) -> bool {
        let removed = self.subscribers.write().await.remove(subscriber_id).is_some();
        if removed {
            debug!("Subscriber {} removed", subscriber_id);
        }
        removed
    }

    /// Deliver a change to all subscribers of `topic`. Subscribers whose
    /// receiver is gone are dropped. Returns the number of deliveries.
    pub async fn publish(&self, topic: &str, change: CalendarChange) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, subscriber) in subscribers.iter().filter(|(_, s)| s.topic == topic) {
                match subscriber.sender.try_send(change.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("Subscriber {} is lagging, dropping calendar change", id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(id.clone()),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
