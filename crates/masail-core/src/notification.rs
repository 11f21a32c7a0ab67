//! Post-commit notification hook.
//!
//! Invoked after an event has been appended and the read model updated,
//! so that downstream collaborators (search indexers, caches) can react.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;

/// Summary of a committed event handed to notification hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitNotification {
    /// Aggregate the event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type tag.
    pub aggregate_type: String,
    /// Event type name.
    pub event_type: String,
    /// Aggregate version after the event.
    pub version: i64,
    /// Global sequence assigned by the event log.
    pub sequence: i64,
}

/// Receiver of post-commit notifications.
#[async_trait]
pub trait NotificationHook: Send + Sync {
    /// Deliver a notification.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if delivery fails. Callers treat
    /// this as non-fatal: the event is already committed.
    async fn notify(&self, notification: &CommitNotification) -> Result<(), DomainError>;
}

/// A hook that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationHook;

#[async_trait]
impl NotificationHook for NoopNotificationHook {
    async fn notify(&self, _notification: &CommitNotification) -> Result<(), DomainError> {
        Ok(())
    }
}
