// src/storage/local.rs

//! Local filesystem storage implementation.
//!
//! Both tables are held in memory behind a single async mutex and written
//! through to JSON files on every change.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── releases.json         # Vec<Release>
//! └── subscriptions.json    # Vec<Subscription>
//! ```
//!
//! Uniqueness is enforced on `(title, release_number, sub_release_number)`
//! for releases and on `(title, target)` for subscriptions. A failed write
//! rolls the in-memory change back, so memory never runs ahead of disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{NotificationTarget, Release, Subscription, TitleId};
use crate::storage::{ReleaseStore, SubscriptionIndex};

const RELEASES_KEY: &str = "releases.json";
const SUBSCRIPTIONS_KEY: &str = "subscriptions.json";

#[derive(Debug, Default)]
struct Tables {
    releases: Vec<Release>,
    subscriptions: Vec<Subscription>,
}

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    tables: Mutex<Tables>,
}

impl LocalStorage {
    /// Open storage rooted at the given directory, loading existing tables.
    ///
    /// Missing files are treated as empty tables.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let releases: Vec<Release> = read_json(&root_dir.join(RELEASES_KEY))
            .await?
            .unwrap_or_default();
        let subscriptions: Vec<Subscription> = read_json(&root_dir.join(SUBSCRIPTIONS_KEY))
            .await?
            .unwrap_or_default();

        log::debug!(
            "Opened storage at {}: {} releases, {} subscriptions",
            root_dir.display(),
            releases.len(),
            subscriptions.len()
        );

        Ok(Self {
            root_dir,
            tables: Mutex::new(Tables {
                releases,
                subscriptions,
            }),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }
}

/// Read JSON data, returning None if the file doesn't exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl ReleaseStore for LocalStorage {
    async fn get_newest(&self, title: &TitleId) -> Result<Option<Release>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .releases
            .iter()
            .filter(|r| &r.title == title)
            .max_by_key(|r| r.ordinal())
            .cloned())
    }

    async fn add(&self, release: &Release) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.releases.iter().any(|r| r.same_release(release)) {
            return Err(AppError::conflict(format!(
                "release {} of {} already stored",
                release.label(),
                release.title
            )));
        }

        tables.releases.push(release.clone());
        if let Err(e) = self.write_json(RELEASES_KEY, &tables.releases).await {
            tables.releases.pop();
            return Err(e);
        }

        log::debug!("Stored release {} of {}", release.label(), release.title);
        Ok(())
    }

    async fn get_unnotified(&self, title: &TitleId) -> Result<Vec<Release>> {
        let tables = self.tables.lock().await;
        let mut pending: Vec<Release> = tables
            .releases
            .iter()
            .filter(|r| &r.title == title && !r.notified)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.ordinal());
        Ok(pending)
    }

    async fn mark_notified(&self, release: &Release) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let Some(index) = tables.releases.iter().position(|r| r.same_release(release)) else {
            return Err(AppError::not_found(format!(
                "release {} of {}",
                release.label(),
                release.title
            )));
        };

        if tables.releases[index].notified {
            return Ok(());
        }

        tables.releases[index].notified = true;
        if let Err(e) = self.write_json(RELEASES_KEY, &tables.releases).await {
            tables.releases[index].notified = false;
            return Err(e);
        }
        Ok(())
    }

    async fn list(&self, title: &TitleId) -> Result<Vec<Release>> {
        let tables = self.tables.lock().await;
        let mut releases: Vec<Release> = tables
            .releases
            .iter()
            .filter(|r| &r.title == title)
            .cloned()
            .collect();
        releases.sort_by(|a, b| b.ordinal().cmp(&a.ordinal()));
        Ok(releases)
    }
}

#[async_trait]
impl SubscriptionIndex for LocalStorage {
    async fn subscribers_of(&self, title: &TitleId) -> Result<Vec<NotificationTarget>> {
        let tables = self.tables.lock().await;
        let mut targets: Vec<NotificationTarget> = tables
            .subscriptions
            .iter()
            .filter(|s| &s.title == title)
            .map(|s| s.target.clone())
            .collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    async fn titles_of(&self, target: &NotificationTarget) -> Result<Vec<TitleId>> {
        let tables = self.tables.lock().await;
        let mut titles: Vec<TitleId> = tables
            .subscriptions
            .iter()
            .filter(|s| &s.target == target)
            .map(|s| s.title.clone())
            .collect();
        titles.sort();
        titles.dedup();
        Ok(titles)
    }

    async fn add_subscription(&self, title: &TitleId, target: &NotificationTarget) -> Result<()> {
        let subscription = Subscription::new(title.clone(), target.clone());
        let mut tables = self.tables.lock().await;
        if tables.subscriptions.contains(&subscription) {
            return Ok(());
        }

        tables.subscriptions.push(subscription);
        if let Err(e) = self
            .write_json(SUBSCRIPTIONS_KEY, &tables.subscriptions)
            .await
        {
            tables.subscriptions.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn remove_subscription(
        &self,
        title: &TitleId,
        target: &NotificationTarget,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let Some(index) = tables
            .subscriptions
            .iter()
            .position(|s| &s.title == title && &s.target == target)
        else {
            return Err(AppError::not_found(format!(
                "subscription of {target} to {title}"
            )));
        };

        let removed = tables.subscriptions.remove(index);
        if let Err(e) = self
            .write_json(SUBSCRIPTIONS_KEY, &tables.subscriptions)
            .await
        {
            tables.subscriptions.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }
}
