/// Centralized platform-specific path computation
///
/// Directory roots come from the `dirs` crate (XDG on Linux, Known Folders on
/// Windows, `~/Library` on macOS). Every location falls back to the current
/// directory when the platform does not report one.
use std::path::{Path, PathBuf};

/// Application folder name under each platform directory
const APP_DIR: &str = "code-inventory";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate config directory for the current platform
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/code-inventory
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/code-inventory
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Returns: {data_dir}/code-inventory/inventory.db
    pub fn default_database_path() -> PathBuf {
        Self::project_data_dir().join("inventory.db")
    }

    /// Returns: {config_dir}/code-inventory/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

/// Normalize a path to an absolute, canonical form when possible
///
/// Falls back to joining onto the current directory when the path does not
/// exist (canonicalize requires existence).
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Split a platform path list (`:` on Unix, `;` on Windows), dropping empty entries
pub fn split_path_list(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths_end_with_app_dir() {
        assert!(PlatformPaths::project_data_dir().ends_with(APP_DIR));
        assert!(PlatformPaths::project_config_dir().ends_with(APP_DIR));
        assert!(PlatformPaths::default_database_path().ends_with("code-inventory/inventory.db"));
        assert!(PlatformPaths::default_config_path().ends_with("code-inventory/config.toml"));
    }

    #[test]
    fn test_normalize_existing_path() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let dotted = nested.join("..").join("a");
        assert_eq!(normalize_path(&dotted), normalize_path(&nested));
    }

    #[test]
    fn test_normalize_missing_relative_path_is_absolute() {
        let normalized = normalize_path(Path::new("does-not-exist-12345"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("does-not-exist-12345"));
    }

    #[cfg(unix)]
    #[test]
    fn test_split_path_list() {
        let paths = split_path_list("/a::/b");
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(split_path_list("").is_empty());
    }
}
