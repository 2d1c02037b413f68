//! Event bus for live debate viewing
//!
//! One Tokio broadcast channel per debate id. Channels are created on first
//! subscribe and dropped with their last subscription, so a debate nobody
//! watches costs nothing to publish to.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::types::DebateEvent;
use crate::session::DebateId;

/// Channel capacity for broadcast
pub const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Per-debate fan-out of live events
pub struct EventBus {
    channels: RwLock<HashMap<DebateId, broadcast::Sender<DebateEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Bus whose per-debate channels buffer `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to everyone currently subscribed to its debate.
    ///
    /// Never blocks and never buffers for absent subscribers. Returns the
    /// number of subscribers reached.
    pub fn publish(&self, event: DebateEvent) -> usize {
        let event_type = event.event_type();
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(&event.debate_id) else {
            debug!(debate_id = %event.debate_id, event_type, "Event published (no receivers)");
            return 0;
        };
        match sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Event published");
                count
            }
            Err(_) => {
                debug!(event_type, "Event published (no receivers)");
                0
            }
        }
    }

    /// Subscribe to every event published for `debate_id` from now on
    pub fn subscribe(self: &Arc<Self>, debate_id: &str) -> Subscription {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .entry(debate_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let receiver = sender.subscribe();
        debug!(debate_id, subscribers = sender.receiver_count(), "Subscriber added");
        Subscription {
            debate_id: debate_id.to_string(),
            receiver: Some(receiver),
            bus: Arc::downgrade(self),
        }
    }

    /// Drop the channel for a debate. Live subscriptions drain what they
    /// already hold, then end.
    pub fn close(&self, debate_id: &str) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.remove(debate_id).is_some() {
            debug!(debate_id, "Event channel closed");
        }
    }

    /// Get the number of current subscribers for a debate
    pub fn subscriber_count(&self, debate_id: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(debate_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Number of debates with at least one live channel
    pub fn channel_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, debate_id: &str) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(debate_id)
            .is_some_and(|s| s.receiver_count() == 0)
        {
            channels.remove(debate_id);
            debug!(debate_id, "Last subscriber left, channel released");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered stream of one debate's events. Dropping it unsubscribes.
pub struct Subscription {
    debate_id: DebateId,
    receiver: Option<broadcast::Receiver<DebateEvent>>,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn debate_id(&self) -> &str {
        &self.debate_id
    }

    /// Next event, or `None` once the channel is closed.
    ///
    /// A subscriber that falls more than the channel capacity behind skips
    /// the events it missed.
    pub async fn recv(&mut self) -> Option<DebateEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(debate_id = %self.debate_id, skipped, "Subscriber lagged, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked.
        drop(self.receiver.take());
        if let Some(bus) = self.bus.upgrade() {
            bus.release(&self.debate_id);
        }
    }
}
