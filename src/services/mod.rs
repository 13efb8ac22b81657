// src/services/mod.rs

//! Service layer for the release notifier.
//!
//! This module contains the collaborators the pipeline talks to:
//! - Chapter scraping (`Scraper`, `HtmlScraper`)
//! - Notification delivery (`Notifier`, `DiscordNotifier`, `LogNotifier`)
//! - Subscription management (`SubscriptionService`)

mod discord;
mod notifier;
mod scrape;
mod subscriptions;

pub use discord::DiscordNotifier;
pub use notifier::{LogNotifier, Notifier};
pub use scrape::{HtmlScraper, Scraper, parse_chapter_numbers};
pub use subscriptions::{SubscriptionService, TitleChange};
