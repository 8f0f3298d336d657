//! Snapshot extraction: identity, history and working-tree state of one repository

use super::detector::{RepositoryDetector, RepositoryProbe};
use super::log_parser::{LOG_FORMAT_ARG, parse_initial_commit_sha, parse_log};
use super::process::{CommandKind, CommandRunner, ProcessOutput};
use crate::types::{CommitRecord, ExtractedRepository};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Name used when a path has no final segment
pub const UNKNOWN_PROJECT_NAME: &str = "Unknown";

/// Produces one snapshot per repository path
#[async_trait]
pub trait SnapshotExtractor: Send + Sync {
    /// `None` for anything that is not a usable repository; never panics or errors
    async fn extract(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Option<ExtractedRepository>;
}

/// Extracts snapshots by running git commands
pub struct GitIntegration {
    runner: Arc<dyn CommandRunner>,
    detector: Arc<dyn RepositoryProbe>,
}

impl GitIntegration {
    /// Build an extractor whose detector shares the same runner
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let detector = Arc::new(RepositoryDetector::new(runner.clone()));
        Self { runner, detector }
    }

    /// Replace the repository detector
    pub fn with_detector(mut self, detector: Arc<dyn RepositoryProbe>) -> Self {
        self.detector = detector;
        self
    }

    /// Root commit reachable from HEAD, if any
    pub async fn initial_commit_sha(&self, path: &Path, cancel: &CancellationToken) -> Option<String> {
        let output = self
            .git(path, &["rev-list", "--max-parents=0", "HEAD"], CommandKind::Metadata, cancel)
            .await?;
        parse_initial_commit_sha(&output.stdout)
    }

    /// Every commit on every ref; empty when the log command fails
    pub async fn commit_history(&self, path: &Path, cancel: &CancellationToken) -> Vec<CommitRecord> {
        match self
            .git(path, &["log", "--all", LOG_FORMAT_ARG, "--no-patch"], CommandKind::Export, cancel)
            .await
        {
            Some(output) => parse_log(&output.stdout),
            None => Vec::new(),
        }
    }

    /// Whether `status --porcelain` reports anything; false when the command fails
    pub async fn has_uncommitted_changes(&self, path: &Path, cancel: &CancellationToken) -> bool {
        self.git(path, &["status", "--porcelain"], CommandKind::Metadata, cancel)
            .await
            .is_some_and(|output| !output.stdout.trim().is_empty())
    }

    /// Run git and keep the output only when it exited successfully
    async fn git(
        &self,
        path: &Path,
        args: &[&str],
        kind: CommandKind,
        cancel: &CancellationToken,
    ) -> Option<ProcessOutput> {
        match self.runner.run(path, args, kind, cancel).await {
            Ok(output) if output.success => Some(output),
            Ok(output) => {
                tracing::debug!(
                    "git {} failed in {} (exit {:?}, {:?}): {}",
                    args.join(" "),
                    path.display(),
                    output.exit_code,
                    output.failure,
                    output.stderr
                );
                None
            }
            Err(e) => {
                tracing::debug!("git {} rejected in {}: {}", args.join(" "), path.display(), e);
                None
            }
        }
    }

    async fn extract_snapshot(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Option<ExtractedRepository> {
        if path.as_os_str().is_empty() || !path.exists() {
            return None;
        }

        if !self.detector.is_repository(path, cancel).await {
            tracing::debug!("Not a repository: {}", path.display());
            return None;
        }

        let Some(initial_commit_sha) = self.initial_commit_sha(path, cancel).await else {
            tracing::warn!("No initial commit found for {}, skipping", path.display());
            return None;
        };

        let commits = self.commit_history(path, cancel).await;
        let has_uncommitted_changes = self.has_uncommitted_changes(path, cancel).await;

        // A cancelled log or status reads as empty or clean; never report that
        if cancel.is_cancelled() {
            tracing::debug!("Extraction of {} cancelled", path.display());
            return None;
        }

        tracing::debug!(
            "Extracted {} commits from {} (dirty: {})",
            commits.len(),
            path.display(),
            has_uncommitted_changes
        );

        Some(ExtractedRepository {
            path: path.to_path_buf(),
            project_name: project_name(path),
            initial_commit_sha: Some(initial_commit_sha),
            has_uncommitted_changes,
            commits,
        })
    }
}

#[async_trait]
impl SnapshotExtractor for GitIntegration {
    async fn extract(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Option<ExtractedRepository> {
        match AssertUnwindSafe(self.extract_snapshot(path, cancel))
            .catch_unwind()
            .await
        {
            Ok(snapshot) => snapshot,
            Err(_) => {
                tracing::error!("Extraction panicked for {}", path.display());
                None
            }
        }
    }
}

/// Final path segment, or [`UNKNOWN_PROJECT_NAME`]
pub fn project_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_PROJECT_NAME.to_string())
}
