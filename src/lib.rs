//! APK Inspect - security metadata extraction for Android packages
//!
//! Reads an APK and produces a single JSON report covering:
//!
//! - **Identity**: package name, version fields and SDK bounds
//! - **Components**: activities, services, receivers and providers with
//!   their exported flag and intent filters
//! - **Permissions**: the sorted set of requested permissions
//! - **Signing**: SHA-256 fingerprints of every signer across the v1, v2
//!   and v3 signature schemes
//! - **Heuristics**: a fixed set of checks over the application policy
//!
//! ## Architecture
//!
//! - `apk-inspect-core`: error taxonomy and configuration
//! - `apk-inspect-manifest`: binary manifest decoding and projection
//! - `apk-inspect-archive`: zip access, file digest and signing inspection
//! - this crate: heuristics, report assembly and the command line

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod heuristics;
pub mod report;

// Re-export workspace crates for library usage
pub use apk_inspect_archive as archive;
pub use apk_inspect_core as core;
pub use apk_inspect_manifest as manifest;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::heuristics::{evaluate, Heuristic, Severity};
    pub use crate::report::{resolve_input, AnalysisReport, FailureReport, ReportAssembler};
    pub use apk_inspect_archive::{ApkArchive, SigningInspector, SigningReport};
    pub use apk_inspect_core::{InspectConfig, InspectError};
    pub use apk_inspect_manifest::{BadgingInfo, ManifestParser, ManifestRecord};
}
