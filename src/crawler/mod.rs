//! Crawl orchestration: wait for a trigger, scan, extract, ingest, repeat
//!
//! One [`CrawlOrchestrator`] runs per process. It owns the loop and the
//! [`CrawlTrigger`]; outside callers get a cloneable [`CrawlHandle`] to request
//! crawls and read status.

/// Cancellable pauses
pub mod delay;
/// Single-flight trigger primitive
pub mod trigger;

pub use delay::{Delay, TokioDelay};
pub use trigger::CrawlTrigger;

use crate::config::{CrawlConfig, GitConfig};
use crate::error::CrawlError;
use crate::git::{CommandRunner, GitIntegration, ProcessRunner, RepositoryDetector, SnapshotExtractor};
use crate::scanner::{RepositoryScanner, RepositorySource};
use crate::store::IngestionStore;
use crate::types::{CrawlReport, CrawlStatus};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Helper macro to stop a crawl early when cancellation was requested
macro_rules! stop_if_cancelled {
    ($cancel:expr, $report:expr) => {
        if $cancel.is_cancelled() {
            tracing::info!("Crawl cancelled");
            $report.cancelled = true;
            return Ok($report);
        }
    };
}

/// Everything the orchestrator talks to, passed in once at construction
#[derive(Clone)]
pub struct CrawlDependencies {
    pub scanner: Arc<dyn RepositorySource>,
    pub extractor: Arc<dyn SnapshotExtractor>,
    pub store: Arc<dyn IngestionStore>,
    pub delay: Arc<dyn Delay>,
}

impl CrawlDependencies {
    /// Git-backed scanner and extractor sharing one process runner and detector
    pub fn with_git(git: &GitConfig, store: Arc<dyn IngestionStore>) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(
            ProcessRunner::new(&git.binary)
                .with_timeout(git.metadata_timeout())
                .with_export_timeout(git.export_timeout()),
        );
        let detector = Arc::new(RepositoryDetector::new(runner.clone()));

        Self {
            scanner: Arc::new(RepositoryScanner::new(detector.clone())),
            extractor: Arc::new(GitIntegration::new(runner).with_detector(detector)),
            store,
            delay: Arc::new(TokioDelay),
        }
    }
}

/// What to crawl and how long to pause
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub root_directories: Vec<PathBuf>,
    pub remote_urls: Vec<String>,
    pub inter_repository_delay: Duration,
    pub error_recovery_delay: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            root_directories: config.root_directories.clone(),
            remote_urls: config.remote_urls.clone(),
            inter_repository_delay: config.inter_repository_delay(),
            error_recovery_delay: config.error_recovery_delay(),
        }
    }
}

/// Cloneable front door for triggering crawls and reading status
#[derive(Clone)]
pub struct CrawlHandle {
    trigger: Arc<CrawlTrigger>,
    last_report: Arc<RwLock<Option<CrawlReport>>>,
}

impl CrawlHandle {
    /// Request a crawl; `false` if one is already running
    pub fn trigger(&self) -> bool {
        self.trigger.trigger()
    }

    pub fn is_crawling(&self) -> bool {
        self.trigger.is_crawling()
    }

    pub async fn status(&self) -> CrawlStatus {
        CrawlStatus {
            is_crawling: self.trigger.is_crawling(),
            last_report: self.last_report.read().await.clone(),
        }
    }

    pub async fn last_report(&self) -> Option<CrawlReport> {
        self.last_report.read().await.clone()
    }
}

/// Long-lived crawl loop
pub struct CrawlOrchestrator {
    deps: CrawlDependencies,
    settings: CrawlSettings,
    trigger: Arc<CrawlTrigger>,
    last_report: Arc<RwLock<Option<CrawlReport>>>,
}

impl CrawlOrchestrator {
    pub fn new(deps: CrawlDependencies, settings: CrawlSettings) -> Self {
        Self {
            deps,
            settings,
            trigger: Arc::new(CrawlTrigger::new()),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn handle(&self) -> CrawlHandle {
        CrawlHandle {
            trigger: self.trigger.clone(),
            last_report: self.last_report.clone(),
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Run until `cancel` fires
    ///
    /// Each trigger produces exactly one crawl. Failures inside a crawl are
    /// logged, the crawl is completed, and after a recovery pause the loop
    /// goes back to waiting.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Crawl orchestrator started");

        loop {
            if !self.trigger.wait_for_trigger(&cancel).await {
                break;
            }

            tracing::info!("Crawl started");
            match self.run_crawl_guarded(&cancel).await {
                Ok(report) => {
                    tracing::info!(
                        "Crawl finished in {}ms: {} repositories found, {} ingested, {} new commits, {} errors",
                        report.duration_ms,
                        report.repositories_found,
                        report.repositories_ingested,
                        report.commits_added,
                        report.errors.len()
                    );
                    let cancelled = report.cancelled;
                    *self.last_report.write().await = Some(report);
                    self.trigger.complete_crawl();
                    if cancelled {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Crawl failed: {}", e);
                    self.trigger.complete_crawl();
                    if !self
                        .deps
                        .delay
                        .pause(self.settings.error_recovery_delay, &cancel)
                        .await
                    {
                        break;
                    }
                }
            }
        }

        tracing::info!("Crawl orchestrator stopped");
    }

    /// Run and complete a single crawl in the caller's task
    ///
    /// Claims the active flag without waking the loop, so a concurrently
    /// running [`run`](Self::run) keeps waiting and never sees this crawl.
    pub async fn crawl_once(&self, cancel: &CancellationToken) -> Result<CrawlReport, CrawlError> {
        if !self.trigger.try_begin() {
            return Err(CrawlError::AlreadyRunning);
        }

        let result = self.run_crawl_guarded(cancel).await;
        if let Ok(report) = &result {
            *self.last_report.write().await = Some(report.clone());
        }
        self.trigger.complete_crawl();
        result
    }

    async fn run_crawl_guarded(&self, cancel: &CancellationToken) -> Result<CrawlReport, CrawlError> {
        match AssertUnwindSafe(self.run_crawl(cancel)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CrawlError::Panicked(panic_message(panic.as_ref()))),
        }
    }

    /// One crawl over every configured root
    ///
    /// Per-repository failures end up in [`CrawlReport::errors`]; only failures
    /// of the crawl as a whole are returned as `Err`.
    pub async fn run_crawl(&self, cancel: &CancellationToken) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        let mut report = CrawlReport {
            roots_scanned: self.settings.root_directories.len(),
            remote_urls_skipped: self.settings.remote_urls.len(),
            ..Default::default()
        };

        for root in &self.settings.root_directories {
            tracing::info!("Root directory: {}", root.display());
        }
        for url in &self.settings.remote_urls {
            tracing::warn!("Remote URL crawling is not supported, skipping: {}", url);
        }

        let repositories = self
            .deps
            .scanner
            .find_repositories(&self.settings.root_directories, cancel)
            .await
            .map_err(|e| CrawlError::ScanFailed(format!("{:#}", e)))?;
        report.repositories_found = repositories.len();
        tracing::info!("Found {} repositories", repositories.len());

        for (index, path) in repositories.iter().enumerate() {
            stop_if_cancelled!(cancel, report);

            if index > 0
                && !self
                    .deps
                    .delay
                    .pause(self.settings.inter_repository_delay, cancel)
                    .await
            {
                tracing::info!("Crawl cancelled");
                report.cancelled = true;
                return Ok(report);
            }

            tracing::debug!(
                "Processing repository {}/{}: {}",
                index + 1,
                repositories.len(),
                path.display()
            );

            let Some(snapshot) = self.deps.extractor.extract(path, cancel).await else {
                stop_if_cancelled!(cancel, report);
                tracing::warn!("Could not extract repository data from {}", path.display());
                report
                    .errors
                    .push(format!("{}: extraction failed", path.display()));
                continue;
            };
            stop_if_cancelled!(cancel, report);

            match self.deps.store.upsert_snapshot(&snapshot).await {
                Ok(outcome) => {
                    report.repositories_ingested += 1;
                    report.commits_processed += snapshot.commits.len();
                    report.commits_added += outcome.commits_added;
                }
                Err(e) => {
                    tracing::error!("Failed to store {}: {}", path.display(), e);
                    report.errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        report.totals = self
            .deps
            .store
            .totals()
            .await
            .map_err(|e| CrawlError::TotalsFailed(e.to_string()))?;
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Inventory now holds {} projects, {} commits, {} authors",
            report.totals.projects,
            report.totals.commits,
            report.totals.authors
        );

        Ok(report)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
