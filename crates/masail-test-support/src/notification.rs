//! Test notification hooks.

use std::sync::Mutex;

use async_trait::async_trait;
use masail_core::error::DomainError;
use masail_core::notification::{CommitNotification, NotificationHook};

/// A hook that records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotificationHook {
    received: Mutex<Vec<CommitNotification>>,
}

impl RecordingNotificationHook {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all notifications received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn notifications(&self) -> Vec<CommitNotification> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationHook for RecordingNotificationHook {
    async fn notify(&self, notification: &CommitNotification) -> Result<(), DomainError> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// A hook whose delivery always fails.
#[derive(Debug)]
pub struct FailingNotificationHook;

#[async_trait]
impl NotificationHook for FailingNotificationHook {
    async fn notify(&self, _notification: &CommitNotification) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("indexer unreachable".into()))
    }
}
