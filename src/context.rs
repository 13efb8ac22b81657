// src/context.rs

//! Application context.
//!
//! Owns the collaborators shared by the orchestrator and the CLI commands.
//! Everything behind a trait is held as `Arc<dyn _>` so tests can swap in
//! doubles.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, NotifierKind, TitleCatalog};
use crate::pipeline::{FanOut, Ingestor};
use crate::services::{
    DiscordNotifier, HtmlScraper, LogNotifier, Notifier, Scraper, SubscriptionService,
};
use crate::storage::{LocalStorage, ReleaseStore, SubscriptionIndex};
use crate::utils::http;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub catalog: TitleCatalog,
    pub releases: Arc<dyn ReleaseStore>,
    pub subscriptions: Arc<dyn SubscriptionIndex>,
    pub scraper: Arc<dyn Scraper>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    /// Assemble a context from explicit parts.
    pub fn new(
        config: Config,
        releases: Arc<dyn ReleaseStore>,
        subscriptions: Arc<dyn SubscriptionIndex>,
        scraper: Arc<dyn Scraper>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let catalog = TitleCatalog::from_config(&config.titles);
        Self {
            config: Arc::new(config),
            catalog,
            releases,
            subscriptions,
            scraper,
            notifier,
        }
    }

    /// Build the production context: local JSON storage under `base_path`,
    /// the HTML scraper and the configured notifier.
    pub async fn from_config(config: Config, base_path: &Path) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(LocalStorage::open(config.storage_path(base_path)).await?);
        let client = http::create_async_client(&config.scraper)?;
        let scraper = Arc::new(HtmlScraper::new(client.clone(), &config.titles)?);

        let notifier: Arc<dyn Notifier> = match config.notifier.kind {
            NotifierKind::Discord => {
                Arc::new(DiscordNotifier::from_config(client, &config.notifier)?)
            }
            NotifierKind::Log => Arc::new(LogNotifier),
        };
        log::info!(
            "Tracking {} title(s), delivering via {}",
            config.titles.len(),
            notifier.backend_name()
        );

        Ok(Self::new(config, storage.clone(), storage, scraper, notifier))
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.releases.clone())
    }

    pub fn fan_out(&self) -> FanOut {
        FanOut::new(
            self.releases.clone(),
            self.subscriptions.clone(),
            self.notifier.clone(),
            self.config.notifier.max_concurrent_deliveries,
        )
    }

    pub fn subscription_service(&self) -> SubscriptionService {
        SubscriptionService::new(self.subscriptions.clone(), self.catalog.clone())
    }
}
