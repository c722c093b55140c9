//! Outbound notification seam.
//!
//! Delivery is fire-and-forget from the core's point of view: callers log a
//! failed send and carry on.

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::Result;

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
    pub action_url: String,
}

/// Delivers notifications to users (push, e-mail...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that only writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = notification.recipient_id,
            url = %notification.action_url,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}
