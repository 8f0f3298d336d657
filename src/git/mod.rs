//! Git integration through the external `git` binary
//!
//! Everything here shells out to git with argument vectors and parses its text
//! output. Each layer sits behind a trait so the crawler can be exercised
//! without a real repository on disk.

/// Working-tree detection
pub mod detector;
/// Snapshot extraction for one repository
pub mod extractor;
/// Parsing of `git log` / `git rev-list` output
pub mod log_parser;
/// Process execution with timeouts and cancellation
pub mod process;

pub use detector::{RepositoryDetector, RepositoryProbe};
pub use extractor::{GitIntegration, SnapshotExtractor};
pub use log_parser::{parse_initial_commit_sha, parse_log};
pub use process::{CommandKind, CommandRunner, ProcessFailure, ProcessOutput, ProcessRunner};
