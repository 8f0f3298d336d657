//! Recursive repository discovery under configured root directories

use crate::git::RepositoryProbe;
use crate::paths::normalize_path;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Directory names never descended into (matched case-insensitively)
pub const EXCLUDED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "bin",
    "obj",
    ".vs",
    ".vscode",
    ".idea",
    "target",
    "dist",
    "build",
    ".gradle",
    ".nuget",
    "packages",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".env",
    "Temp",
    "tmp",
    "temp",
    ".tmp",
    "cache",
    ".cache",
    "logs",
    "log",
    ".git",
    ".svn",
    ".hg",
];

/// Source of repository paths for a crawl
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Repository paths under `roots`, de-duplicated, in scan order
    async fn find_repositories(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<PathBuf>>;
}

/// Walks directory trees and asks a probe about every directory
///
/// Once a directory is confirmed as a repository its subtree is pruned, so
/// nested repositories and submodules are reported through their outermost
/// working tree only.
pub struct RepositoryScanner {
    probe: Arc<dyn RepositoryProbe>,
}

/// Check whether a directory name is on the denylist
pub fn is_excluded(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    EXCLUDED_DIRECTORIES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(&name))
}

impl RepositoryScanner {
    pub fn new(probe: Arc<dyn RepositoryProbe>) -> Self {
        Self { probe }
    }

    /// Scan one root
    ///
    /// Missing or unreadable roots produce an empty set. A cancelled scan
    /// returns whatever was found before cancellation.
    pub async fn scan(&self, root: &Path, cancel: &CancellationToken) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();

        if root.as_os_str().is_empty() {
            return found;
        }

        // Directory reads happen on a blocking thread; probing stays async
        let (visits, mut pending) = mpsc::channel::<Visit>(1);
        let walker = {
            let root = root.to_path_buf();
            tokio::task::spawn_blocking(move || walk_directories(&root, visits))
        };

        loop {
            let visit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                visit = pending.recv() => visit,
            };
            let Some((path, verdict)) = visit else {
                break;
            };

            let is_repository = self.probe.is_repository(&path, cancel).await;
            if is_repository {
                tracing::debug!("Found repository: {}", path.display());
                found.insert(path);
            }
            // The walker may already have stopped
            let _ = verdict.send(is_repository);
        }

        if cancel.is_cancelled() {
            tracing::info!(
                "Scan of {} cancelled after {} repositories",
                root.display(),
                found.len()
            );
        }

        drop(pending);
        if let Err(e) = walker.await {
            tracing::warn!("Directory walk of {} failed: {}", root.display(), e);
        }

        found
    }

    /// Scan several roots and merge the results
    ///
    /// Roots are normalized first so the same directory reached through
    /// different spellings is scanned once.
    pub async fn scan_many(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
    ) -> BTreeSet<PathBuf> {
        let mut scanned = BTreeSet::new();
        let mut found = BTreeSet::new();

        for root in roots {
            if cancel.is_cancelled() {
                break;
            }

            if root.as_os_str().is_empty() {
                tracing::warn!("Ignoring empty root directory entry");
                continue;
            }

            let root = {
                let root = root.clone();
                match tokio::task::spawn_blocking(move || normalize_path(&root)).await {
                    Ok(root) => root,
                    Err(e) => {
                        tracing::warn!("Failed to resolve root directory: {}", e);
                        continue;
                    }
                }
            };
            if !scanned.insert(root.clone()) {
                tracing::debug!("Root already scanned: {}", root.display());
                continue;
            }

            let is_dir = tokio::fs::metadata(&root)
                .await
                .is_ok_and(|metadata| metadata.is_dir());
            if !is_dir {
                tracing::warn!("Root directory does not exist: {}", root.display());
                continue;
            }

            tracing::info!("Scanning {}", root.display());
            let repositories = self.scan(&root, cancel).await;
            tracing::info!(
                "Found {} repositories under {}",
                repositories.len(),
                root.display()
            );
            found.extend(repositories);
        }

        found
    }
}

/// A directory awaiting a verdict; `true` prunes its subtree
type Visit = (PathBuf, oneshot::Sender<bool>);

/// Blocking walk that hands every candidate directory to the probe loop
///
/// Returns as soon as the probe loop goes away.
fn walk_directories(root: &Path, visits: mpsc::Sender<Visit>) {
    let mut entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        if entry.depth() > 0 && is_excluded(entry.file_name()) {
            tracing::trace!("Skipping excluded directory: {}", entry.path().display());
            entries.skip_current_dir();
            continue;
        }

        let (reply, verdict) = oneshot::channel();
        if visits.blocking_send((entry.into_path(), reply)).is_err() {
            return;
        }
        match verdict.blocking_recv() {
            Ok(true) => entries.skip_current_dir(),
            Ok(false) => {}
            Err(_) => return,
        }
    }
}

#[async_trait]
impl RepositorySource for RepositoryScanner {
    async fn find_repositories(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self.scan_many(roots, cancel).await.into_iter().collect())
    }
}
