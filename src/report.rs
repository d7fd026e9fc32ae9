//! Report Assembler
//!
//! Drives one analysis run: file identity, manifest decoding, projection,
//! signing inspection and heuristics. Only a failure to open the archive
//! or read its manifest entry aborts the run; every other stage degrades
//! its own section of the report.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use apk_inspect_archive::{sha256_file, ApkArchive, SigningInspector, SigningReport};
use apk_inspect_core::{InspectConfig, InspectError, Result};
use apk_inspect_manifest::{axml, project_binary, ApplicationPolicy, Badging, BadgingInfo, ManifestRecord};

use crate::heuristics::{self, Heuristic};

/// Successful analysis result
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Always `true`
    pub ok: bool,
    /// Absolute path of the analyzed file
    pub file_path: String,
    /// Size of the file in bytes
    pub file_size_bytes: u64,
    /// Lowercase hex SHA-256 of the whole file
    pub sha256: String,
    /// Identity summary, `null` when the binary manifest could not be read
    pub badging: Option<Badging>,
    /// Full manifest projection or its parse error
    pub manifest: ManifestRecord,
    /// Sorted, deduplicated permission names
    pub permissions_declared: Vec<String>,
    /// Launcher activity, fully qualified
    pub main_activity: Option<String>,
    /// Sorted activity names
    pub activities_all: Vec<String>,
    /// Sorted service names
    pub services_all: Vec<String>,
    /// Sorted receiver names
    pub receivers_all: Vec<String>,
    /// Sorted provider names
    pub providers_all: Vec<String>,
    /// Signer fingerprints or the signing error
    pub signing: SigningReport,
    /// Triggered heuristics in rule order
    pub heuristics: Vec<Heuristic>,
}

/// Report emitted in place of [`AnalysisReport`] when a run fails
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Always `false`
    pub ok: bool,
    /// Error message
    pub error: String,
}

impl FailureReport {
    /// Failure report carrying the error's message
    pub fn new(error: impl fmt::Display) -> Self {
        Self { ok: false, error: error.to_string() }
    }
}

/// Fold `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Make `arg` absolute against the current directory, normalize it and
/// check it exists
pub fn resolve_input(arg: &Path) -> Result<PathBuf> {
    let path = if arg.is_absolute() {
        normalize(arg)
    } else {
        normalize(&std::env::current_dir()?.join(arg))
    };
    if !path.exists() {
        return Err(InspectError::NotFound(path));
    }
    Ok(path)
}

/// Assembles [`AnalysisReport`]s
pub struct ReportAssembler<'a> {
    config: &'a InspectConfig,
}

impl<'a> ReportAssembler<'a> {
    /// Assembler using the given configuration
    pub fn new(config: &'a InspectConfig) -> Self {
        Self { config }
    }

    /// Analyze the APK at an already resolved path
    pub fn analyze(&self, path: &Path) -> Result<AnalysisReport> {
        info!("Analyzing {:?}", path);
        let file_size_bytes = std::fs::metadata(path)?.len();
        let sha256 = sha256_file(path, self.config.digest_chunk_size)?;
        debug!("{} bytes, sha256 {}", file_size_bytes, sha256);

        let mut apk = ApkArchive::open(path).map_err(|e| InspectError::Archive(e.to_string()))?;
        let manifest_bytes = apk
            .manifest_bytes(self.config.max_manifest_size)
            .map_err(|e| InspectError::Archive(e.to_string()))?;

        let (badging, manifest) = match axml::decode(&manifest_bytes) {
            Ok(document) => {
                let badging = match BadgingInfo::from_document(&document) {
                    Ok(info) => Some(info),
                    Err(e) => {
                        warn!("Badging unavailable: {}", e);
                        None
                    }
                };
                (badging, project_binary(&document))
            }
            Err(e) => {
                warn!("Binary manifest could not be decoded: {}", e);
                (None, ManifestRecord::failed(e.to_string()))
            }
        };

        let signing = SigningInspector::new(&mut apk).inspect();

        let default_policy = ApplicationPolicy::default();
        let heuristics = heuristics::evaluate(manifest.application().unwrap_or(&default_policy));
        debug!("{} heuristic(s) triggered", heuristics.len());

        let summary = badging.as_ref().map(|info| info.badging.clone());
        let info = badging.unwrap_or_default();

        Ok(AnalysisReport {
            ok: true,
            file_path: path.display().to_string(),
            file_size_bytes,
            sha256,
            badging: summary,
            manifest,
            permissions_declared: info.permissions,
            main_activity: info.main_activity,
            activities_all: info.activities,
            services_all: info.services,
            receivers_all: info.receivers,
            providers_all: info.providers,
            signing,
            heuristics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.apk");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(resolve_input(&file).unwrap(), file);

        let missing = dir.path().join("missing.apk");
        let err = resolve_input(&missing).unwrap_err();
        assert_eq!(err.to_string(), format!("APK not found: {}", missing.display()));
    }

    #[test]
    fn test_dot_segments_folded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.apk");
        std::fs::write(&file, b"x").unwrap();

        let dotted = dir.path().join(".").join("sub").join("..").join("app.apk");
        assert_eq!(resolve_input(&dotted).unwrap(), file);

        let missing = dir.path().join("sub/./../missing.apk");
        let err = resolve_input(&missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("APK not found: {}", dir.path().join("missing.apk").display())
        );
    }

    #[test]
    fn test_normalize_stops_at_root() {
        assert_eq!(normalize(Path::new("/a/./b/../../../c.apk")), PathBuf::from("/c.apk"));
        assert_eq!(normalize(Path::new("/a/b/./c.apk")), PathBuf::from("/a/b/c.apk"));
    }

    #[test]
    fn test_relative_missing_path_is_absolute() {
        let err = resolve_input(Path::new("definitely-not-here.apk")).unwrap_err();
        match err {
            InspectError::NotFound(path) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("definitely-not-here.apk"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failure_report_shape() {
        let report = FailureReport::new(&InspectError::Archive("Invalid APK: bad".into()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"ok": false, "error": "Archive error: Invalid APK: bad"}));
    }

    #[test]
    fn test_not_a_zip_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.apk");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let config = InspectConfig::default();
        let err = ReportAssembler::new(&config).analyze(&path).unwrap_err();
        assert!(matches!(err, InspectError::Archive(_)));
    }
}
