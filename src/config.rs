//! Store Configuration.
//!
//! Selects the storage backend and its location, loaded from a JSON file or
//! from `EVENT_STORE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ═══════════════════════════════════════════════════════════════════════════════
// STORE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend selection variable
pub const ENV_BACKEND: &str = "EVENT_STORE_BACKEND";
/// Data directory variable
pub const ENV_DATA_DIR: &str = "EVENT_STORE_DATA_DIR";
/// Broadcast capacity variable
pub const ENV_BROADCAST_CAPACITY: &str = "EVENT_STORE_BROADCAST_CAPACITY";

/// Event store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage backend
    pub backend: BackendKind,
    /// Data directory for file and RocksDB backends
    pub data_dir: PathBuf,
    /// Capacity of the async update channel
    pub broadcast_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            data_dir: default_data_dir(),
            broadcast_capacity: 256,
        }
    }
}

impl StoreConfig {
    /// Configuration for an ephemeral in-memory store
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-backed store rooted at `data_dir`
    pub fn file(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::File,
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Load from `EVENT_STORE_*` environment variables. Unset variables keep
    /// their defaults; malformed ones are rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(capacity) = std::env::var(ENV_BROADCAST_CAPACITY) {
            config.broadcast_capacity = capacity.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_BROADCAST_CAPACITY, capacity
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Validation(
                "Broadcast capacity must be greater than 0".into(),
            ));
        }

        if self.backend.is_persistent() && self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} backend requires a data directory",
                self.backend
            )));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ephemeral, lost on drop
    Memory,
    /// JSON file in the data directory
    File,
    /// RocksDB database (requires `rocksdb-storage`)
    Rocks,
}

impl BackendKind {
    /// Get backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Rocks => "rocks",
        }
    }

    /// Check if records survive a restart
    pub fn is_persistent(&self) -> bool {
        !matches!(self, BackendKind::Memory)
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "file" | "json" => Ok(BackendKind::File),
            "rocks" | "rocksdb" => Ok(BackendKind::Rocks),
            _ => Err(ConfigError::Validation(format!("Unknown backend: {}", s))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Get default data directory
fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".event-instances");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/EventInstances");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("EventInstances");
        }
    }

    PathBuf::from(".event-instances")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("FILE".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("rocksdb".parse::<BackendKind>().unwrap(), BackendKind::Rocks);
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = StoreConfig::default();
        config.broadcast_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = StoreConfig::file("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = StoreConfig::file(temp_dir.path().join("data"));
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "backend": "file", "data_dir": "/tmp/events" }"#).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.backend, BackendKind::File);
        assert_eq!(loaded.broadcast_capacity, 256);
    }

    // Single test so no other test observes the variables mid-change
    #[test]
    fn test_from_env() {
        let clear = || {
            for var in [ENV_BACKEND, ENV_DATA_DIR, ENV_BROADCAST_CAPACITY] {
                std::env::remove_var(var);
            }
        };

        clear();
        assert_eq!(StoreConfig::from_env().unwrap(), StoreConfig::default());

        std::env::set_var(ENV_BACKEND, "File");
        std::env::set_var(ENV_DATA_DIR, "/var/lib/events");
        std::env::set_var(ENV_BROADCAST_CAPACITY, "32");
        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/events"));
        assert_eq!(config.broadcast_capacity, 32);

        // A typo must not silently fall back to memory
        std::env::set_var(ENV_BACKEND, "fiel");
        assert!(matches!(StoreConfig::from_env(), Err(ConfigError::Validation(_))));

        std::env::set_var(ENV_BACKEND, "memory");
        std::env::set_var(ENV_BROADCAST_CAPACITY, "lots");
        assert!(matches!(StoreConfig::from_env(), Err(ConfigError::Validation(_))));

        std::env::set_var(ENV_BROADCAST_CAPACITY, "0");
        assert!(matches!(StoreConfig::from_env(), Err(ConfigError::Validation(_))));

        clear();
    }

    #[test]
    fn test_load_missing_file() {
        let result = StoreConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
