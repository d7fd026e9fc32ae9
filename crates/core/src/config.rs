//! Inspector Configuration
//!
//! Read-only settings for an analysis run:
//! - digest chunk size for streamed file hashing
//! - size guard for the binary manifest entry
//! - output formatting and log level
//!
//! The configuration file is optional and is never written back.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::debug;

use crate::error::{InspectError, Result};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "APK_INSPECT_CONFIG";

/// Largest accepted `digest_chunk_size`
pub const MAX_DIGEST_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Largest accepted `max_manifest_size`
pub const MAX_MANIFEST_SIZE_LIMIT: u64 = 64 * 1024 * 1024;

/// Main inspector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Read size used when hashing the whole APK
    pub digest_chunk_size: usize,
    /// Largest uncompressed AndroidManifest.xml accepted
    pub max_manifest_size: u64,
    /// Pretty-print the JSON report
    pub pretty: bool,
    /// Default tracing filter directive
    pub log_level: String,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            digest_chunk_size: 1024 * 1024,
            max_manifest_size: 8 * 1024 * 1024,
            pretty: true,
            log_level: "warn".to_string(),
        }
    }
}

impl InspectConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "apkinspect", "apk-inspect")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the default configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Resolve and load the configuration.
    ///
    /// An explicit path from `APK_INSPECT_CONFIG` must exist; the default
    /// location is only used when present. Falls back to defaults.
    pub fn load() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                return Err(InspectError::Config(format!(
                    "{} points to a missing file: {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::from_file(&path);
        }

        match Self::config_file() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: InspectConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.digest_chunk_size == 0 {
            return Err(InspectError::Config("digest_chunk_size must be greater than zero".into()));
        }
        if self.digest_chunk_size > MAX_DIGEST_CHUNK_SIZE {
            return Err(InspectError::Config(format!(
                "digest_chunk_size must be at most {} bytes",
                MAX_DIGEST_CHUNK_SIZE
            )));
        }
        if self.max_manifest_size == 0 {
            return Err(InspectError::Config("max_manifest_size must be greater than zero".into()));
        }
        if self.max_manifest_size > MAX_MANIFEST_SIZE_LIMIT {
            return Err(InspectError::Config(format!(
                "max_manifest_size must be at most {} bytes",
                MAX_MANIFEST_SIZE_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InspectConfig::default();
        assert_eq!(config.digest_chunk_size, 1024 * 1024);
        assert!(config.pretty);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InspectConfig::from_toml("pretty = false\n").unwrap();
        assert!(!config.pretty);
        assert_eq!(config.digest_chunk_size, 1024 * 1024);
        assert_eq!(config.max_manifest_size, 8 * 1024 * 1024);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = InspectConfig::from_toml("digest_chunk_size = 0\n").unwrap_err();
        assert!(matches!(err, InspectError::Config(_)));
    }

    #[test]
    fn test_oversized_limits_rejected() {
        let err = InspectConfig::from_toml("digest_chunk_size = 9223372036854775807\n").unwrap_err();
        assert!(err.to_string().contains("digest_chunk_size must be at most"));

        let err = InspectConfig::from_toml("max_manifest_size = 67108865\n").unwrap_err();
        assert!(matches!(err, InspectError::Config(_)));

        let config = InspectConfig::from_toml("digest_chunk_size = 67108864\nmax_manifest_size = 67108864\n").unwrap();
        assert_eq!(config.digest_chunk_size, MAX_DIGEST_CHUNK_SIZE);
        assert_eq!(config.max_manifest_size, MAX_MANIFEST_SIZE_LIMIT);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "digest_chunk_size = 4096\nlog_level = \"debug\"\n").unwrap();

        let config = InspectConfig::from_file(&path).unwrap();
        assert_eq!(config.digest_chunk_size, 4096);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_malformed_toml() {
        let err = InspectConfig::from_toml("pretty = [").unwrap_err();
        assert!(matches!(err, InspectError::TomlParse(_)));
    }
}
