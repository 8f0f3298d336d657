/// Configuration system for code-inventory
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, InventoryError, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log levels accepted by `log_level`
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to crawl and how fast
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// External git binary settings
    #[serde(default)]
    pub git: GitConfig,

    /// Ingestion store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fallback log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Root directories to scan, in order
    #[serde(default)]
    pub root_directories: Vec<PathBuf>,

    /// Remote repository URLs (accepted, logged, never cloned)
    #[serde(default)]
    pub remote_urls: Vec<String>,

    /// Pause between two repository extractions
    #[serde(default = "default_inter_repository_delay_ms")]
    pub inter_repository_delay_ms: u64,

    /// Pause after an unexpected crawl failure before waiting again
    #[serde(default = "default_error_recovery_delay_ms")]
    pub error_recovery_delay_ms: u64,

    /// Trigger one crawl as soon as the service starts
    #[serde(default)]
    pub execute_on_start: bool,
}

/// Git process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Executable name or path
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Timeout for metadata commands (rev-parse, rev-list, status)
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Timeout for bulk-export commands (log --all)
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_inter_repository_delay_ms() -> u64 {
    100
}

fn default_error_recovery_delay_ms() -> u64 {
    5_000
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_metadata_timeout() -> u64 {
    30
}

fn default_export_timeout() -> u64 {
    60
}

fn default_database_path() -> PathBuf {
    crate::paths::PlatformPaths::default_database_path()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            git: GitConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_directories: Vec::new(),
            remote_urls: Vec::new(),
            inter_repository_delay_ms: default_inter_repository_delay_ms(),
            error_recovery_delay_ms: default_error_recovery_delay_ms(),
            execute_on_start: false,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            metadata_timeout_secs: default_metadata_timeout(),
            export_timeout_secs: default_export_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl CrawlConfig {
    pub fn inter_repository_delay(&self) -> Duration {
        Duration::from_millis(self.inter_repository_delay_ms)
    }

    pub fn error_recovery_delay(&self) -> Duration {
        Duration::from_millis(self.error_recovery_delay_ms)
    }
}

impl GitConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, InventoryError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// File `load_or_default` reads: the given path, else the default location if it exists
    pub fn source_path(path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(path.to_path_buf());
        }

        let config_path = crate::paths::PlatformPaths::default_config_path();
        config_path.exists().then_some(config_path)
    }

    /// Load configuration from the given file, the default location, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, InventoryError> {
        match Self::source_path(path) {
            Some(config_path) => {
                tracing::info!("Loading config from: {}", config_path.display());
                Self::from_file(&config_path)
            }
            None => {
                tracing::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), InventoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, InventoryError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)).into())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "git.binary".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.git.metadata_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "git.metadata_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.git.export_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "git.export_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "log_level".to_string(),
                reason: format!(
                    "must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    self.log_level
                ),
            }
            .into());
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(ValidationError::Empty("storage.database_path".to_string()).into());
        }

        if let Some(index) = self
            .crawl
            .root_directories
            .iter()
            .position(|root| root.as_os_str().is_empty())
        {
            return Err(ValidationError::InvalidPath(format!(
                "crawl.root_directories[{}] is empty",
                index
            ))
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(roots) = lookup("CODE_INVENTORY_ROOTS") {
            self.crawl.root_directories = crate::paths::split_path_list(&roots);
        }

        if let Some(urls) = lookup("CODE_INVENTORY_REMOTE_URLS") {
            self.crawl.remote_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(path) = lookup("CODE_INVENTORY_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        if let Some(binary) = lookup("CODE_INVENTORY_GIT_BINARY") {
            self.git.binary = binary;
        }

        if let Some(level) = lookup("CODE_INVENTORY_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Create a new Config from file (or defaults) plus environment overrides
    pub fn new(path: Option<&Path>) -> Result<Self, InventoryError> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
