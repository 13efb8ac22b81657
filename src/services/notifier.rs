// src/services/notifier.rs

//! Notification delivery seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Notification, NotificationTarget};

/// Delivers a notification to a single target.
///
/// Implementations may provision the destination lazily on first use; the
/// caller only sees success or `AppError::Delivery`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &NotificationTarget, notification: &Notification) -> Result<()>;

    /// Human-readable name for this backend (e.g., "discord", "log").
    fn backend_name(&self) -> &str;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &NotificationTarget, notification: &Notification) -> Result<()> {
        log::info!(
            "[{}] -> {}: {}",
            notification.title,
            target,
            notification.message
        );
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "log"
    }
}
