use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::workflows::WorkflowEngine;

const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const STORE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Perform graceful shutdown once the server stopped accepting requests
pub async fn shutdown_services(engine: &WorkflowEngine) {
    info!("Initiating graceful shutdown of all services...");

    let pending = engine.pending_notifications();
    if pending > 0 {
        info!(pending, "Waiting for background notifications to finish...");
    }
    if !engine.drain_notifications(NOTIFICATION_DRAIN_TIMEOUT).await {
        warn!(
            timeout_secs = NOTIFICATION_DRAIN_TIMEOUT.as_secs(),
            abandoned = engine.pending_notifications(),
            "Timeout waiting for background notifications"
        );
    }

    engine.metrics().log_stats();

    if timeout(STORE_CLOSE_TIMEOUT, engine.store().close())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = STORE_CLOSE_TIMEOUT.as_secs(),
            "Timeout waiting for record store to close"
        );
    }

    info!("Graceful shutdown completed successfully");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{DisabledNotifier, RecordingNotifier};
    use crate::store::InMemoryStore;
    use crate::workflows::WorkflowOptions;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_shutdown_leaves_memory_store_readable() {
        let engine = WorkflowEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(DisabledNotifier),
            WorkflowOptions::default(),
        );
        engine.intake("Alice", "+15551234").await.unwrap();

        shutdown_services(&engine).await;

        assert_eq!(engine.status().await.unwrap().in_work.len(), 1);
    }

    #[test]
    fn test_shutdown_delivers_background_notifications_before_runtime_stops() {
        let notifier = Arc::new(RecordingNotifier::slow(Duration::from_millis(200)));
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let engine = WorkflowEngine::new(
                Arc::new(InMemoryStore::new()),
                notifier.clone(),
                WorkflowOptions::default(),
            );
            let intake = engine.intake("Alice", "+15551234").await.unwrap();
            engine
                .advance_to_ready(&intake.id, "Alice", "+15551234")
                .await
                .unwrap();

            shutdown_services(&engine).await;
        });
        drop(runtime);

        let sent = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(notifier.sent());
        assert_eq!(sent.len(), 1);
    }
}
