//! Notification hook that reports commits to the tracing pipeline.

use async_trait::async_trait;
use masail_core::error::DomainError;
use masail_core::notification::{CommitNotification, NotificationHook};
use tracing::info;

/// Emits one `info` record per committed document event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationHook;

#[async_trait]
impl NotificationHook for TracingNotificationHook {
    async fn notify(&self, notification: &CommitNotification) -> Result<(), DomainError> {
        info!(
            aggregate_id = %notification.aggregate_id,
            aggregate_type = %notification.aggregate_type,
            event_type = %notification.event_type,
            version = notification.version,
            sequence = notification.sequence,
            "event committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_tracing_hook_never_fails() {
        let notification = CommitNotification {
            aggregate_id: Uuid::new_v4(),
            aggregate_type: "Document".to_owned(),
            event_type: "DocumentCreated".to_owned(),
            version: 1,
            sequence: 1,
        };

        let result = TracingNotificationHook.notify(&notification).await;

        assert!(result.is_ok());
    }
}
