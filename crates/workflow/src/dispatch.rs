//! Delivery of committed notification records. Delivery happens after the change that
//! produced the record has been committed, so a failure here never undoes that change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use grievance_core::domain::notification::Notification;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct DispatchError(pub String);

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Writes each delivery to the log. The default until a real transport is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
        info!(
            event_name = "notification.dispatch.logged",
            notification_id = notification.id.0,
            complaint_id = %notification.complaint_id,
            recipient = notification.recipient.as_ref().map_or("none", |user| user.0.as_str()),
            kind = notification.kind.as_str(),
            "notification handed to log transport"
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory; can be switched to fail on demand.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    delivered: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let dispatcher = Self::default();
        dispatcher.set_failing(true);
        dispatcher
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError(format!("transport rejected notification {}", notification.id.0)));
        }
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).push(notification.clone());
        Ok(())
    }
}
