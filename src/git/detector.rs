//! Working-tree detection

use super::process::{CommandKind, CommandRunner, ProcessFailure};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Answers "is this directory a working tree?"
#[async_trait]
pub trait RepositoryProbe: Send + Sync {
    /// Never errors; anything unexpected is a negative answer
    async fn is_repository(&self, path: &Path, cancel: &CancellationToken) -> bool;
}

/// Asks git whether a path is inside a work tree
///
/// The git answer is authoritative. Only when git cannot be started at all does
/// the detector fall back to looking for a `.git` entry in the directory.
pub struct RepositoryDetector {
    runner: Arc<dyn CommandRunner>,
}

impl RepositoryDetector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl RepositoryProbe for RepositoryDetector {
    async fn is_repository(&self, path: &Path, cancel: &CancellationToken) -> bool {
        if path.as_os_str().is_empty() || !path.is_dir() {
            return false;
        }

        let output = match self
            .runner
            .run(
                path,
                &["rev-parse", "--is-inside-work-tree"],
                CommandKind::Metadata,
                cancel,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Repository check rejected for {}: {}", path.display(), e);
                return false;
            }
        };

        if output.failure == Some(ProcessFailure::SpawnFailed) {
            let has_git_entry = path.join(".git").exists();
            tracing::trace!(
                "git unavailable, .git entry present in {}: {}",
                path.display(),
                has_git_entry
            );
            return has_git_entry;
        }

        output.success && output.stdout.trim().eq_ignore_ascii_case("true")
    }
}
