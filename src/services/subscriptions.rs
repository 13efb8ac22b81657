// src/services/subscriptions.rs

//! Subscription management on top of the subscription index.
//!
//! Validates title names against the tracked-title catalog before touching
//! the index. Results are reported per title so one bad name does not hide
//! the outcome of the others.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{NotificationTarget, Title, TitleCatalog, TitleId};
use crate::storage::SubscriptionIndex;

/// Outcome of a subscription change for a single title.
#[derive(Debug)]
pub struct TitleChange {
    pub title: TitleId,
    pub result: Result<()>,
}

impl TitleChange {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Service for subscribing targets to tracked titles.
pub struct SubscriptionService {
    index: Arc<dyn SubscriptionIndex>,
    catalog: TitleCatalog,
}

impl SubscriptionService {
    pub fn new(index: Arc<dyn SubscriptionIndex>, catalog: TitleCatalog) -> Self {
        Self { index, catalog }
    }

    fn tracked(&self, name: &str) -> Result<TitleId> {
        let id = TitleId::new(name);
        if self.catalog.contains(&id) {
            Ok(id)
        } else {
            Err(AppError::not_found(format!("title '{id}' is not tracked")))
        }
    }

    /// Subscribe a target to each named title. Repeated subscriptions succeed.
    pub async fn subscribe(&self, target: &NotificationTarget, names: &[String]) -> Vec<TitleChange> {
        let mut changes = Vec::with_capacity(names.len());
        for name in names {
            let title = TitleId::new(name);
            let result = match self.tracked(name) {
                Ok(id) => self.index.add_subscription(&id, target).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                log::warn!("Subscribing {target} to {title} failed: {e}");
            }
            changes.push(TitleChange { title, result });
        }
        changes
    }

    /// Remove a target's subscription to each named title.
    pub async fn unsubscribe(
        &self,
        target: &NotificationTarget,
        names: &[String],
    ) -> Vec<TitleChange> {
        let mut changes = Vec::with_capacity(names.len());
        for name in names {
            let title = TitleId::new(name);
            let result = match self.tracked(name) {
                Ok(id) => self.index.remove_subscription(&id, target).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                log::warn!("Unsubscribing {target} from {title} failed: {e}");
            }
            changes.push(TitleChange { title, result });
        }
        changes
    }

    /// Titles a target is subscribed to.
    pub async fn subscriptions(&self, target: &NotificationTarget) -> Result<Vec<Title>> {
        let ids = self.index.titles_of(target).await?;
        Ok(ids
            .into_iter()
            .map(|id| {
                self.catalog.get(&id).cloned().unwrap_or(Title {
                    id,
                    description: String::new(),
                })
            })
            .collect())
    }

    /// Every title that can be subscribed to.
    pub fn available(&self) -> Vec<Title> {
        self.catalog.titles().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TitleConfig;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    async fn service(tmp: &TempDir) -> SubscriptionService {
        let storage = LocalStorage::open(tmp.path()).await.unwrap();
        let catalog = TitleCatalog::from_config(&[
            TitleConfig::new("drstone", "Dr. Stone", "https://example.com/a"),
            TitleConfig::new("martialpeak", "Martial Peak", "https://example.com/b"),
        ]);
        SubscriptionService::new(Arc::new(storage), catalog)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_subscribe_reports_per_title() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp).await;
        let guild = NotificationTarget::new("42");

        let changes = service
            .subscribe(&guild, &names(&["DrStone", "onepiece"]))
            .await;
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_ok());
        assert!(matches!(changes[1].result, Err(AppError::NotFound(_))));

        let titles = service.subscriptions(&guild).await.unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].description, "Dr. Stone");
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_ok() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp).await;
        let guild = NotificationTarget::new("42");

        service.subscribe(&guild, &names(&["drstone"])).await;
        let changes = service.subscribe(&guild, &names(&["drstone"])).await;
        assert!(changes[0].is_ok());
        assert_eq!(service.subscriptions(&guild).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_missing_pair() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp).await;
        let guild = NotificationTarget::new("42");

        let changes = service.unsubscribe(&guild, &names(&["martialpeak"])).await;
        assert!(matches!(changes[0].result, Err(AppError::NotFound(_))));

        service.subscribe(&guild, &names(&["martialpeak"])).await;
        let changes = service.unsubscribe(&guild, &names(&["martialpeak"])).await;
        assert!(changes[0].is_ok());
        assert!(service.subscriptions(&guild).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_lists_catalog() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp).await;
        let available: Vec<String> = service
            .available()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(available, vec!["drstone", "martialpeak"]);
    }
}
