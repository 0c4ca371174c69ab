//! Fire-and-forget audit event publication

use std::sync::Arc;

use model_registry_core::Event;
use model_registry_store::EventPublisher;
use tracing::warn;

/// Publish `event` on a background task
///
/// A failure is logged and never reaches the caller.
pub fn spawn_publish(publisher: &Arc<dyn EventPublisher>, event: Event) {
    let publisher = publisher.clone();
    tokio::spawn(async move {
        let id = event.id;
        if let Err(e) = publisher.publish(event).await {
            warn!(event_id = %id, error = %e, "Failed to publish event");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_registry_core::EventAction;
    use model_registry_store::BroadcastEventPublisher;

    #[tokio::test]
    async fn test_spawned_event_reaches_subscriber() {
        let broadcast = Arc::new(BroadcastEventPublisher::new(4));
        let mut rx = broadcast.subscribe();
        let publisher: Arc<dyn EventPublisher> = broadcast;

        let event = Event::builder(EventAction::Register)
            .description("Imported 2 components for model argo")
            .build();
        spawn_publish(&publisher, event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
