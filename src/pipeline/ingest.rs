// src/pipeline/ingest.rs

//! Release ingestion.
//!
//! Turns scrape results into stored releases. A candidate is admitted only
//! when it is newer than the title's newest stored release; everything else
//! is classified and dropped.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Release, ScrapeCandidate, TitleId};
use crate::pipeline::novelty::is_newer;
use crate::storage::ReleaseStore;

/// Classification of one scrape result.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Persisted as a new, not yet notified release
    Admitted(Release),
    /// Not newer than the newest stored release
    RejectedNotNewer,
    /// The scrape itself failed
    RejectedScrapeError(String),
    /// Another writer stored the same chapter first
    RejectedStoreConflict,
    /// The release store failed for this title
    RejectedStoreError(String),
}

impl IngestOutcome {
    pub fn admitted(&self) -> Option<&Release> {
        match self {
            Self::Admitted(release) => Some(release),
            _ => None,
        }
    }
}

/// Ingestion outcome for a single title.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub title: TitleId,
    pub outcome: IngestOutcome,
}

/// Admits scrape candidates into the release store.
pub struct Ingestor {
    releases: Arc<dyn ReleaseStore>,
}

impl Ingestor {
    pub fn new(releases: Arc<dyn ReleaseStore>) -> Self {
        Self { releases }
    }

    /// Classify and store one scrape result.
    ///
    /// Every failure is reported in the outcome and stays local to the title.
    pub async fn ingest_one(
        &self,
        title: &TitleId,
        scraped: Result<ScrapeCandidate>,
    ) -> IngestOutcome {
        let candidate = match scraped {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("Scrape failed for {title}: {e}");
                return IngestOutcome::RejectedScrapeError(e.to_string());
            }
        };

        let newest = match self.releases.get_newest(title).await {
            Ok(newest) => newest,
            Err(e) => {
                log::error!("Could not read the newest release of {title}: {e}");
                return IngestOutcome::RejectedStoreError(e.to_string());
            }
        };
        if !is_newer(&candidate, newest.as_ref()) {
            log::debug!(
                "{title}: chapter {}.{} is not newer than the stored release",
                candidate.release_number,
                candidate.sub_release_number.unwrap_or(0)
            );
            return IngestOutcome::RejectedNotNewer;
        }

        let release = Release::from_candidate(title.clone(), &candidate);
        match self.releases.add(&release).await {
            Ok(()) => {
                log::info!("New release for {title}: chapter {}", release.label());
                IngestOutcome::Admitted(release)
            }
            Err(AppError::Conflict(msg)) => {
                log::warn!("Release for {title} already stored: {msg}");
                IngestOutcome::RejectedStoreConflict
            }
            Err(e) => {
                log::error!("Could not store chapter {} of {title}: {e}", release.label());
                IngestOutcome::RejectedStoreError(e.to_string())
            }
        }
    }

    /// Ingest scrape results in order, one outcome per title.
    pub async fn ingest(&self, scraped: Vec<(TitleId, Result<ScrapeCandidate>)>) -> Vec<Ingested> {
        let mut results = Vec::with_capacity(scraped.len());
        for (title, candidate) in scraped {
            let outcome = self.ingest_one(&title, candidate).await;
            results.push(Ingested { title, outcome });
        }
        results
    }
}
