//! Audit event publication
//!
//! Publication is fire-and-forget: callers spawn the publish call and only log
//! a failure.

use async_trait::async_trait;
use model_registry_core::Event;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Default capacity of the broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Sink for audit events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> StoreResult<()>;
}

/// Publisher fanning events out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: Event) -> StoreResult<()> {
        if self.sender.receiver_count() == 0 {
            debug!(event = %event, "No event subscribers, dropping event");
            return Ok(());
        }

        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|e| StoreError::Publish(e.to_string()))
    }
}
