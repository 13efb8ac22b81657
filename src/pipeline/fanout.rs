// src/pipeline/fanout.rs

//! Notification fan-out.
//!
//! Delivers one notification per subscriber for each admitted release and
//! then marks the release notified. Delivery is at-most-once: a release is
//! marked after the attempt whether or not every delivery succeeded, and a
//! marked release is never delivered again.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Notification, NotificationTarget, Release, TitleId};
use crate::services::Notifier;
use crate::storage::{ReleaseStore, SubscriptionIndex};

/// Result of delivering to one subscriber.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub target: NotificationTarget,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Result of fanning out one release.
#[derive(Debug, Clone)]
pub struct NotifyOutcome {
    pub release: Release,
    pub deliveries: Vec<DeliveryOutcome>,
    /// Whether the release is now marked notified
    pub notified: bool,
    /// Subscriber lookup or marking failure
    pub error: Option<String>,
}

impl NotifyOutcome {
    pub fn failed_deliveries(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.success).count()
    }
}

pub struct FanOut {
    releases: Arc<dyn ReleaseStore>,
    subscriptions: Arc<dyn SubscriptionIndex>,
    notifier: Arc<dyn Notifier>,
    max_concurrent: usize,
}

impl FanOut {
    pub fn new(
        releases: Arc<dyn ReleaseStore>,
        subscriptions: Arc<dyn SubscriptionIndex>,
        notifier: Arc<dyn Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            releases,
            subscriptions,
            notifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    async fn deliver(&self, target: NotificationTarget, notification: &Notification) -> DeliveryOutcome {
        let start = Instant::now();
        let result = self.notifier.notify(&target, notification).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => DeliveryOutcome {
                target,
                success: true,
                error: None,
                duration_ms,
            },
            Err(e) => {
                log::warn!(
                    "Delivery of {} to {target} via {} failed: {e}",
                    notification.title,
                    self.notifier.backend_name()
                );
                DeliveryOutcome {
                    target,
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    /// Fan out a single release.
    ///
    /// When the subscriber lookup fails the release is left unmarked so a
    /// later recovery pass can retry it.
    pub async fn notify_release(&self, release: &Release) -> NotifyOutcome {
        let targets = match self.subscriptions.subscribers_of(&release.title).await {
            Ok(targets) => targets,
            Err(e) => {
                log::error!(
                    "Could not load subscribers for {}, leaving chapter {} pending: {e}",
                    release.title,
                    release.label()
                );
                return NotifyOutcome {
                    release: release.clone(),
                    deliveries: Vec::new(),
                    notified: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let notification = Notification::for_release(release);
        let deliveries: Vec<DeliveryOutcome> = stream::iter(targets)
            .map(|target| self.deliver(target, &notification))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let (notified, error) = match self.releases.mark_notified(release).await {
            Ok(()) => (true, None),
            Err(e) => {
                log::error!(
                    "Could not mark {} chapter {} notified: {e}",
                    release.title,
                    release.label()
                );
                (false, Some(e.to_string()))
            }
        };

        let mut marked = release.clone();
        marked.notified = notified;
        let outcome = NotifyOutcome {
            release: marked,
            deliveries,
            notified,
            error,
        };

        log::info!(
            "Notified {} chapter {}: {}/{} deliveries succeeded",
            release.title,
            release.label(),
            outcome.deliveries.len() - outcome.failed_deliveries(),
            outcome.deliveries.len()
        );
        outcome
    }

    /// Fan out several releases concurrently.
    pub async fn notify(&self, releases: &[Release]) -> Vec<NotifyOutcome> {
        stream::iter(releases.iter().cloned())
            .map(|release| async move { self.notify_release(&release).await })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}

/// Fan-out outcomes for every release still pending in `store`.
pub async fn notify_pending<'a, I>(
    fan_out: &FanOut,
    store: &dyn ReleaseStore,
    titles: I,
) -> Result<Vec<NotifyOutcome>>
where
    I: IntoIterator<Item = &'a TitleId>,
{
    let mut pending = Vec::new();
    for title in titles {
        pending.extend(store.get_unnotified(title).await?);
    }

    if pending.is_empty() {
        log::debug!("No pending releases to notify");
        return Ok(Vec::new());
    }

    log::info!("Recovering {} pending release(s)", pending.len());
    Ok(fan_out.notify(&pending).await)
}
