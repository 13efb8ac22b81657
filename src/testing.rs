// src/testing.rs

//! Test doubles for the scraper, notifier and subscription seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Notification, NotificationTarget, Release, ScrapeCandidate, TitleId};
use crate::services::{Notifier, Scraper};
use crate::storage::{LocalStorage, ReleaseStore, SubscriptionIndex};

/// Scripted behaviour of [`MockScraper`] for one title.
#[derive(Debug, Clone)]
pub enum Scripted {
    Chapter(ScrapeCandidate),
    Fail(String),
    Panic,
}

#[derive(Default)]
pub struct MockScraper {
    script: Mutex<HashMap<TitleId, Scripted>>,
    pub calls: AtomicUsize,
}

impl MockScraper {
    pub fn set(&self, title: &str, scripted: Scripted) {
        self.script
            .lock()
            .unwrap()
            .insert(TitleId::new(title), scripted);
    }

    pub fn chapter(&self, title: &str, number: u32, sub: Option<u32>, url: &str) {
        self.set(title, Scripted::Chapter(ScrapeCandidate::new(number, sub, url)));
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, title: &TitleId) -> Result<ScrapeCandidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().get(title).cloned();
        match scripted {
            Some(Scripted::Chapter(candidate)) => Ok(candidate),
            Some(Scripted::Fail(msg)) => Err(AppError::scrape(title.as_str(), msg)),
            Some(Scripted::Panic) => panic!("scraper blew up on {title}"),
            None => Err(AppError::scrape(title.as_str(), "not scripted")),
        }
    }
}

/// Records deliveries; targets in `failing` are rejected.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationTarget, Notification)>>,
    pub failing: HashSet<NotificationTarget>,
    pub calls: AtomicUsize,
}

impl RecordingNotifier {
    pub fn failing_for(targets: &[&str]) -> Self {
        Self {
            failing: targets.iter().map(|t| NotificationTarget::new(*t)).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_to(&self, target: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t.as_str() == target)
            .map(|(_, n)| n.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: &NotificationTarget, notification: &Notification) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(target) {
            return Err(AppError::delivery(target.as_str(), "unreachable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), notification.clone()));
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "recording"
    }
}

/// Subscription index whose lookups always fail.
pub struct BrokenIndex;

#[async_trait]
impl SubscriptionIndex for BrokenIndex {
    async fn subscribers_of(&self, _title: &TitleId) -> Result<Vec<NotificationTarget>> {
        Err(AppError::Io(std::io::Error::other("index unavailable")))
    }

    async fn titles_of(&self, _target: &NotificationTarget) -> Result<Vec<TitleId>> {
        Err(AppError::Io(std::io::Error::other("index unavailable")))
    }

    async fn add_subscription(&self, _title: &TitleId, _target: &NotificationTarget) -> Result<()> {
        Err(AppError::Io(std::io::Error::other("index unavailable")))
    }

    async fn remove_subscription(
        &self,
        _title: &TitleId,
        _target: &NotificationTarget,
    ) -> Result<()> {
        Err(AppError::Io(std::io::Error::other("index unavailable")))
    }
}

/// Release store that fails on demand for chosen titles and otherwise
/// delegates to [`LocalStorage`].
pub struct FlakyStore {
    pub inner: Arc<LocalStorage>,
    /// `get_newest` fails with an I/O error
    pub broken_reads: HashSet<TitleId>,
    /// `add` reports a conflict without storing
    pub conflicting_adds: HashSet<TitleId>,
}

impl FlakyStore {
    pub fn new(inner: Arc<LocalStorage>) -> Self {
        Self {
            inner,
            broken_reads: HashSet::new(),
            conflicting_adds: HashSet::new(),
        }
    }

    pub fn break_reads(mut self, title: &str) -> Self {
        self.broken_reads.insert(TitleId::new(title));
        self
    }

    pub fn conflict_on_add(mut self, title: &str) -> Self {
        self.conflicting_adds.insert(TitleId::new(title));
        self
    }
}

#[async_trait]
impl ReleaseStore for FlakyStore {
    async fn get_newest(&self, title: &TitleId) -> Result<Option<Release>> {
        if self.broken_reads.contains(title) {
            return Err(AppError::Io(std::io::Error::other("disk read failed")));
        }
        self.inner.get_newest(title).await
    }

    async fn add(&self, release: &Release) -> Result<()> {
        if self.conflicting_adds.contains(&release.title) {
            return Err(AppError::conflict(format!(
                "release {} of {} stored concurrently",
                release.label(),
                release.title
            )));
        }
        self.inner.add(release).await
    }

    async fn get_unnotified(&self, title: &TitleId) -> Result<Vec<Release>> {
        self.inner.get_unnotified(title).await
    }

    async fn mark_notified(&self, release: &Release) -> Result<()> {
        self.inner.mark_notified(release).await
    }

    async fn list(&self, title: &TitleId) -> Result<Vec<Release>> {
        self.inner.list(title).await
    }
}
