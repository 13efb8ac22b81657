// src/models/subscription.rs

//! Subscription data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::TitleId;

/// Opaque destination identifier for a notification (a Discord guild id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationTarget(String);

impl NotificationTarget {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Association between a title and a notification target.
///
/// Holds plain keys only; titles and targets are resolved through the stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub title: TitleId,
    pub target: NotificationTarget,
}

impl Subscription {
    pub fn new(title: TitleId, target: NotificationTarget) -> Self {
        Self { title, target }
    }
}
