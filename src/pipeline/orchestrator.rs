// src/pipeline/orchestrator.rs

//! Periodic scrape, ingest and notify loop.
//!
//! One cycle scrapes every tracked title concurrently, ingests the results
//! in order and fans out the admitted releases. Each cycle runs in its own
//! task, so a panic inside a cycle is logged and the loop keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::context::AppContext;
use crate::error::Result;
use crate::models::{Release, ScrapeCandidate, TitleId};
use crate::pipeline::fanout::{NotifyOutcome, notify_pending};
use crate::pipeline::ingest::IngestOutcome;

/// Whether a cycle is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Summary of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub titles: usize,
    pub admitted: usize,
    pub not_newer: usize,
    pub scrape_errors: usize,
    pub conflicts: usize,
    pub store_errors: usize,
    pub deliveries: usize,
    pub failed_deliveries: usize,
    pub marked_notified: usize,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, titles: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            titles,
            admitted: 0,
            not_newer: 0,
            scrape_errors: 0,
            conflicts: 0,
            store_errors: 0,
            deliveries: 0,
            failed_deliveries: 0,
            marked_notified: 0,
        }
    }

    fn count_ingest(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Admitted(_) => self.admitted += 1,
            IngestOutcome::RejectedNotNewer => self.not_newer += 1,
            IngestOutcome::RejectedScrapeError(_) => self.scrape_errors += 1,
            IngestOutcome::RejectedStoreConflict => self.conflicts += 1,
            IngestOutcome::RejectedStoreError(_) => self.store_errors += 1,
        }
    }

    fn count_notify(&mut self, outcomes: &[NotifyOutcome]) {
        for outcome in outcomes {
            self.deliveries += outcome.deliveries.len();
            self.failed_deliveries += outcome.failed_deliveries();
            if outcome.notified {
                self.marked_notified += 1;
            }
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    ctx: AppContext,
    state: Arc<watch::Sender<LoopState>>,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            ctx,
            state: Arc::new(state),
        }
    }

    /// Observe the loop state.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Scrape every tracked title, at most `scraper.max_concurrent` at once.
    pub async fn scrape_all(&self) -> Vec<(TitleId, Result<ScrapeCandidate>)> {
        let scraper = self.ctx.scraper.clone();
        let limit = self.ctx.config.scraper.max_concurrent.max(1);
        let delay = Duration::from_millis(self.ctx.config.scraper.request_delay_ms);
        let titles = self.ctx.catalog.ids();

        stream::iter(titles)
            .map(|title| {
                let scraper = scraper.clone();
                async move {
                    let result = scraper.scrape(&title).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (title, result)
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Run one full scrape, ingest and notify cycle.
    ///
    /// Failures stay with the title or subscriber they belong to and are
    /// counted in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let mut report = CycleReport::new(started_at, self.ctx.catalog.len());
        log::info!("Starting cycle over {} title(s)", report.titles);

        let scraped = self.scrape_all().await;
        let ingested = self.ctx.ingestor().ingest(scraped).await;

        let mut admitted: Vec<Release> = Vec::new();
        for entry in &ingested {
            report.count_ingest(&entry.outcome);
            if let IngestOutcome::Admitted(release) = &entry.outcome {
                admitted.push(release.clone());
            }
        }

        let outcomes = self.ctx.fan_out().notify(&admitted).await;
        report.count_notify(&outcomes);

        report.finished_at = Utc::now();
        log::info!(
            "Cycle finished in {}ms: {} new, {} unchanged, {} scrape error(s), {} conflict(s), {} store error(s), {}/{} deliveries failed",
            report.duration().num_milliseconds(),
            report.admitted,
            report.not_newer,
            report.scrape_errors,
            report.conflicts,
            report.store_errors,
            report.failed_deliveries,
            report.deliveries
        );
        report
    }

    /// Fan out releases that were admitted but never notified.
    pub async fn recover_unnotified(&self) -> Result<Vec<NotifyOutcome>> {
        let titles = self.ctx.catalog.ids();
        notify_pending(&self.ctx.fan_out(), self.ctx.releases.as_ref(), &titles).await
    }

    /// Run a cycle in its own task and log how it ended.
    ///
    /// Returns the report when the cycle completed.
    pub async fn guarded_cycle(&self) -> Option<CycleReport> {
        self.state.send_replace(LoopState::Running);
        let this = self.clone();
        let joined = tokio::spawn(async move { this.run_cycle().await }).await;
        self.state.send_replace(LoopState::Idle);

        match joined {
            Ok(report) => Some(report),
            Err(e) => {
                log::error!("Cycle aborted: {e}");
                None
            }
        }
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. Shutdown is observed between
    /// cycles; a running cycle is allowed to finish.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.ctx.config.orchestrator.interval();

        if self.ctx.config.orchestrator.notify_pending_on_startup {
            self.state.send_replace(LoopState::Running);
            match self.recover_unnotified().await {
                Ok(outcomes) if !outcomes.is_empty() => {
                    log::info!("Recovered {} pending release(s)", outcomes.len())
                }
                Ok(_) => {}
                Err(e) => log::error!("Pending release recovery failed: {e}"),
            }
            self.state.send_replace(LoopState::Idle);
        }

        loop {
            self.guarded_cycle().await;

            log::debug!("Sleeping {}s until the next cycle", interval.as_secs());
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

/// Listen for SIGINT and SIGTERM.
///
/// The handlers are installed when this is called, so a signal that arrives
/// while a cycle is running is held until `run` next checks for shutdown.
#[cfg(unix)]
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => log::info!("Received SIGINT"),
            _ = terminate.recv() => log::info!("Received SIGTERM"),
        }
    })
}

/// Listen for ctrl-c.
///
/// The listener task is spawned when this is called.
#[cfg(not(unix))]
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                log::error!("Failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        }
    });
    Ok(async move {
        let _ = rx.await;
    })
}
