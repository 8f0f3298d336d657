use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single commit parsed from `git log` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit SHA (40 lowercase hex characters)
    pub sha: String,
    /// Author display name (may be empty)
    pub author_name: String,
    /// Author email, the author's identity
    pub author_email: String,
    /// Author timestamp including the original UTC offset
    pub author_timestamp: DateTime<FixedOffset>,
    /// Subject line of the commit message
    pub message: String,
}

/// One extraction pass's view of a repository
///
/// Built once by the extractor and handed to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRepository {
    /// Absolute path of the working tree
    pub path: PathBuf,
    /// Final path segment of `path`, or "Unknown"
    pub project_name: String,
    /// SHA of the root commit reachable from HEAD
    pub initial_commit_sha: Option<String>,
    /// Whether `git status --porcelain` reported anything
    pub has_uncommitted_changes: bool,
    /// Commits from all refs, in `git log` order
    pub commits: Vec<CommitRecord>,
}

impl ExtractedRepository {
    /// Durable identity of the snapshot, if one could be derived
    pub fn identity(&self) -> Option<&str> {
        self.initial_commit_sha
            .as_deref()
            .filter(|sha| !sha.trim().is_empty())
    }
}

/// What a single `upsert_snapshot` call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// A new project row was created
    pub project_created: bool,
    /// A new location row was created
    pub location_created: bool,
    /// Commits inserted by this call
    pub commits_added: usize,
    /// Commits skipped because their SHA was already stored
    pub commits_skipped: usize,
    /// Authors created by this call
    pub authors_added: usize,
}

/// Read-back counters from the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTotals {
    pub projects: u64,
    pub commits: u64,
    pub authors: u64,
}

/// Project listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub initial_commit_sha: String,
    pub commit_count: u64,
    pub location_count: u64,
    /// True if any known location had uncommitted changes when last crawled
    pub has_uncommitted_changes: bool,
}

/// Aggregate result of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Root directories that were scanned
    pub roots_scanned: usize,
    /// Remote URLs that were configured but skipped
    pub remote_urls_skipped: usize,
    /// Repositories found by the scanner
    pub repositories_found: usize,
    /// Repositories successfully handed to the store
    pub repositories_ingested: usize,
    /// Commits seen across all ingested snapshots
    pub commits_processed: usize,
    /// Commits newly stored by this run
    pub commits_added: usize,
    /// Per-repository failures (extraction or ingestion)
    pub errors: Vec<String>,
    /// Store counters read after the run
    pub totals: StoreTotals,
    /// True if cancellation stopped the run early
    pub cancelled: bool,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Status query response for external callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStatus {
    pub is_crawling: bool,
    /// Report of the most recent finished crawl, if any
    #[serde(default)]
    pub last_report: Option<CrawlReport>,
}
