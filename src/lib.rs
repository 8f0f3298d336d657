//! # code-inventory - Git Repository Crawler and Inventory
//!
//! Discovers git working trees under configured root directories, extracts
//! their identity and commit history through the `git` binary, and keeps an
//! append-only, deduplicated inventory of projects, authors and commits.
//!
//! ## Overview
//!
//! A single background loop waits for a crawl trigger, scans every root,
//! extracts one snapshot per repository, and merges each snapshot into the
//! store. Projects are identified by their root commit, so the same project
//! checked out in several places is stored once with several locations.
//!
//! ## Architecture
//!
//! ```text
//! trigger ──► CrawlOrchestrator ──► RepositoryScanner ──► RepositoryDetector
//!                    │                                          │
//!                    ├──► GitIntegration ──► ProcessRunner ◄─────┘
//!                    │         │
//!                    │         └──► log_parser
//!                    │
//!                    └──► IngestionStore (SQLite)
//! ```
//!
//! ## Modules
//!
//! - [`crawler`]: Trigger primitive and the orchestration loop
//! - [`scanner`]: Recursive repository discovery
//! - [`git`]: Process runner, detector, log parser and snapshot extraction
//! - [`store`]: Ingestion contract and its SQLite implementation
//! - [`control`]: Line-oriented control channel for a running service
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Snapshots, reports and store records
//! - [`error`]: Error types
//! - [`paths`]: Platform paths and path normalization
//!
//! ## Usage Example
//!
//! ```no_run
//! use code_inventory::config::Config;
//! use code_inventory::crawler::{CrawlDependencies, CrawlOrchestrator, CrawlSettings};
//! use code_inventory::store::SqliteStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new(None)?;
//!     let store = Arc::new(SqliteStore::open(&config.storage.database_path).await?);
//!     let deps = CrawlDependencies::with_git(&config.git, store);
//!     let orchestrator = CrawlOrchestrator::new(deps, CrawlSettings::from(&config.crawl));
//!
//!     let report = orchestrator.crawl_once(&CancellationToken::new()).await?;
//!     println!("{} new commits", report.commits_added);
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Line-oriented control channel (trigger, status, stats, projects)
pub mod control;

/// Crawl trigger and orchestration loop
pub mod crawler;

/// Error types and utilities
pub mod error;

/// Git process integration
pub mod git;

/// Platform paths and path normalization
pub mod paths;

/// Recursive repository discovery
pub mod scanner;

/// Ingestion store contract and SQLite implementation
pub mod store;

/// Shared data types
pub mod types;
