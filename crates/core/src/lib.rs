//! APK Inspect Core - shared types
//!
//! Error taxonomy and configuration used by every stage of an analysis run.

pub mod config;
pub mod error;

pub use config::InspectConfig;
pub use error::{InspectError, Result};

/// APK Inspect version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "apk-inspect";

/// Android platform XML namespace. Attribute lookups are qualified with this
/// fixed URI regardless of the prefix a document binds to it.
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
