use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage key the mutation queue persists under. Stable across releases:
/// changing it orphans any writes still pending on a device.
pub const DEFAULT_QUEUE_STORAGE_KEY: &str = "sync/pending-operations";

/// Namespace prefix for cached read results.
pub const DEFAULT_CACHE_PREFIX: &str = "cache/";

/// Platform data directory for the sync core:
/// - Linux: `$XDG_DATA_HOME/caseworker-sync` or `~/.local/share/caseworker-sync`
/// - macOS: `~/Library/Application Support/caseworker-sync`
/// - Windows: `%APPDATA%\caseworker-sync`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Failed to resolve platform data directory")?;
    Ok(base.join("caseworker-sync"))
}

/// Ensures the data directory exists and returns it.
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

/// Log file path inside the data directory.
pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("caseworker-sync.log"))
}

/// Default location of the optional settings file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("sync-config.toml"))
}

/// Tunable sync settings.
///
/// Every field has a working default, so the settings file is optional and
/// may name only the fields it overrides. The storage keys exist mainly so a
/// staging build can point at a separate namespace without touching
/// production data on the same device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Key the pending operation queue persists under.
    pub queue_storage_key: String,
    /// Namespace prefix for cached read results.
    pub cache_prefix: String,
    /// Additional attempts granted to an OCR extraction call.
    pub ocr_max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_storage_key: DEFAULT_QUEUE_STORAGE_KEY.to_string(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            ocr_max_retries: crate::ocr::DEFAULT_OCR_RETRIES,
        }
    }
}

impl SyncConfig {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist. A file that exists but does not parse is still an
    /// error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_paths_are_rooted_in_the_app_directory() {
        let dir = data_dir().unwrap();
        assert!(dir.to_string_lossy().contains("caseworker-sync"));

        let log = log_file_path().unwrap();
        assert!(log.to_string_lossy().ends_with("caseworker-sync.log"));

        let config = config_file_path().unwrap();
        assert!(config.to_string_lossy().ends_with("sync-config.toml"));
    }

    #[test]
    fn defaults_match_the_stable_storage_keys() {
        let config = SyncConfig::default();
        assert_eq!(config.queue_storage_key, "sync/pending-operations");
        assert_eq!(config.cache_prefix, "cache/");
        assert_eq!(config.ocr_max_retries, 2);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sync-config.toml");
        std::fs::write(&path, "ocr_max_retries = 5\n").unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.ocr_max_retries, 5);
        assert_eq!(config.queue_storage_key, DEFAULT_QUEUE_STORAGE_KEY);
        assert_eq!(config.cache_prefix, DEFAULT_CACHE_PREFIX);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = SyncConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sync-config.toml");
        std::fs::write(&path, "queue_storage_key = [not toml").unwrap();

        assert!(SyncConfig::load_or_default(&path).is_err());
    }
}
