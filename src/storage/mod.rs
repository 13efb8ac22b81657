// src/storage/mod.rs

//! Storage abstractions for releases and subscriptions.
//!
//! The release store exclusively owns release rows and the subscription
//! index exclusively owns subscription rows. Both are keyed by [`TitleId`].
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Notifier configuration
//! ├── releases.json         # Every admitted release, all titles
//! └── subscriptions.json    # (title, target) pairs
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NotificationTarget, Release, TitleId};

// Re-export for convenience
pub use local::LocalStorage;

/// Durable record of known releases per title.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Release with the greatest `(release_number, sub_release_number)`, if any.
    async fn get_newest(&self, title: &TitleId) -> Result<Option<Release>>;

    /// Persist a new release.
    ///
    /// Fails with `AppError::Conflict` when the same chapter of the title
    /// is already stored.
    async fn add(&self, release: &Release) -> Result<()>;

    /// Releases of a title whose fan-out has not happened yet.
    async fn get_unnotified(&self, title: &TitleId) -> Result<Vec<Release>>;

    /// Set `notified = true`. Succeeds without change when already set;
    /// fails with `AppError::NotFound` for an unknown release.
    async fn mark_notified(&self, release: &Release) -> Result<()>;

    /// All releases of a title, newest first.
    async fn list(&self, title: &TitleId) -> Result<Vec<Release>>;
}

/// Durable mapping of title to notification targets.
#[async_trait]
pub trait SubscriptionIndex: Send + Sync {
    /// Distinct targets subscribed to a title; empty when there are none.
    async fn subscribers_of(&self, title: &TitleId) -> Result<Vec<NotificationTarget>>;

    /// Titles a target is subscribed to.
    async fn titles_of(&self, target: &NotificationTarget) -> Result<Vec<TitleId>>;

    /// Subscribe a target to a title. Duplicate pairs are a no-op.
    async fn add_subscription(&self, title: &TitleId, target: &NotificationTarget) -> Result<()>;

    /// Remove a subscription; `AppError::NotFound` if the pair did not exist.
    async fn remove_subscription(
        &self,
        title: &TitleId,
        target: &NotificationTarget,
    ) -> Result<()>;
}
