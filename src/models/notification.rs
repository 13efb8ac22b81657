// src/models/notification.rs

//! Notification message data structure.

use serde::Serialize;

use crate::models::{Release, TitleId};

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Title the release belongs to; notifiers use it to pick a channel
    pub title: TitleId,

    /// Message body
    pub message: String,
}

impl Notification {
    /// Build the announcement for a release.
    ///
    /// `Chapter 12 is here! Check it out at: {url}`, or `Chapter 12.3 ...`
    /// when the release has a non-zero sub-number.
    pub fn for_release(release: &Release) -> Self {
        Self {
            title: release.title.clone(),
            message: format!(
                "Chapter {} is here! Check it out at: {}",
                release.label(),
                release.url
            ),
        }
    }
}
