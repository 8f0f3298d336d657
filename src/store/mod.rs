//! Persistence of projects, locations, authors and commits
//!
//! The crawler only talks to [`IngestionStore`]. [`SqliteStore`] is the
//! implementation shipped with the binary.

pub mod sqlite;

pub use sqlite::{SCHEMA_VERSION, SqliteStore};

use crate::error::StoreError;
use crate::types::{ExtractedRepository, IngestOutcome, ProjectSummary, StoreTotals};
use async_trait::async_trait;

/// Idempotent merge target for repository snapshots
///
/// Implementations must make `upsert_snapshot` atomic: either the whole
/// snapshot is merged or nothing is.
#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Merge one snapshot
    ///
    /// Projects are keyed by initial commit SHA, locations by (project, path),
    /// authors by email and commits by SHA. A snapshot without an initial
    /// commit SHA is refused with [`StoreError::MissingIdentity`].
    async fn upsert_snapshot(
        &self,
        snapshot: &ExtractedRepository,
    ) -> Result<IngestOutcome, StoreError>;

    async fn total_projects(&self) -> Result<u64, StoreError>;

    async fn total_commits(&self) -> Result<u64, StoreError>;

    async fn total_authors(&self) -> Result<u64, StoreError>;

    /// All three counters
    async fn totals(&self) -> Result<StoreTotals, StoreError> {
        Ok(StoreTotals {
            projects: self.total_projects().await?,
            commits: self.total_commits().await?,
            authors: self.total_authors().await?,
        })
    }

    /// Project summaries ordered by name
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError>;
}
