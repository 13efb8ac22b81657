// src/models/mod.rs

//! Domain models for the release notifier.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod notification;
mod release;
mod subscription;
mod title;

// Re-export all public types
pub use config::{
    Config, LoggingConfig, NotifierConfig, NotifierKind, OrchestratorConfig, ScraperConfig,
    StorageConfig, TitleConfig,
};
pub use notification::Notification;
pub use release::{Release, ScrapeCandidate};
pub use subscription::{NotificationTarget, Subscription};
pub use title::{Title, TitleCatalog, TitleId};
