//! Error types for APK Inspect
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for an analysis run
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("{0}")]
    Usage(String),

    #[error("APK not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for APK Inspect operations
pub type Result<T> = std::result::Result<T, InspectError>;

impl InspectError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            InspectError::Usage(_) => 2,
            _ => 1,
        }
    }

    /// Build the usage error for the given program name
    pub fn usage(program: &str) -> Self {
        InspectError::Usage(format!("Usage: {} /absolute/path/to/app.apk", program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(InspectError::usage("apk-inspect").exit_code(), 2);
        assert_eq!(InspectError::NotFound(PathBuf::from("/x.apk")).exit_code(), 1);
        assert_eq!(InspectError::Archive("bad zip".into()).exit_code(), 1);
    }

    #[test]
    fn test_not_found_names_path() {
        let err = InspectError::NotFound(PathBuf::from("/tmp/missing.apk"));
        assert_eq!(err.to_string(), "APK not found: /tmp/missing.apk");
    }

    #[test]
    fn test_usage_message() {
        let err = InspectError::usage("apk-inspect");
        assert_eq!(err.to_string(), "Usage: apk-inspect /absolute/path/to/app.apk");
    }
}
