/// Centralized error types for code-inventory using thiserror
///
/// Not-found conditions (missing directory, not a repository) are never errors in
/// this crate; they surface as `false` / `None` results. These types cover caller
/// mistakes, store failures, crawl failures and configuration problems.
use thiserror::Error;

/// Error type for loading and validating configuration
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors raised by the process runner before a child is spawned
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
}

/// Errors related to the ingestion store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Failed to initialize schema: {0}")]
    SchemaFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Snapshot for '{0}' has no initial commit SHA")]
    MissingIdentity(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Empty {0}")]
    Empty(String),
}

/// Unexpected failures inside a crawl run (the orchestrator recovers from these)
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Repository scan failed: {0}")]
    ScanFailed(String),

    #[error("Failed to read store totals: {0}")]
    TotalsFailed(String),

    #[error("Crawl body panicked: {0}")]
    Panicked(String),

    #[error("A crawl is already running")]
    AlreadyRunning,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

impl InventoryError {
    /// Check if this is a user error (bad input or config) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            InventoryError::Validation(_) | InventoryError::Config(ConfigError::InvalidValue { .. })
        )
    }
}
