mod common;

use apk_inspect::heuristics::Severity;
use apk_inspect::prelude::*;
use apk_inspect_archive::SignatureScheme;
use apk_inspect_manifest::AttrFlag;

use common::{garbled_manifest_apk, signed_apk, write_fixture};

#[test]
fn test_analyze_signed_apk() {
    let (_dir, path) = write_fixture("shop.apk", &signed_apk());
    let config = InspectConfig::default();

    let report = ReportAssembler::new(&config).analyze(&path).unwrap();
    assert!(report.ok);
    assert_eq!(report.file_size_bytes, std::fs::metadata(&path).unwrap().len());

    let badging = report.badging.as_ref().unwrap();
    assert_eq!(badging.package_name.as_deref(), Some(common::PACKAGE));
    assert_eq!(report.services_all, vec!["com.example.shop.SyncService"]);
    assert_eq!(report.providers_all, vec!["androidx.core.content.FileProvider"]);

    let application = report.manifest.application().unwrap();
    assert!(application.debuggable);
    assert_eq!(application.uses_cleartext_traffic, AttrFlag::True);

    assert_eq!(report.signing.signers().len(), 2);
    assert_eq!(report.signing.signers()[1].schemes, vec![SignatureScheme::V1]);

    let high: Vec<&str> = report
        .heuristics
        .iter()
        .filter(|h| h.severity == Severity::High)
        .map(|h| h.id)
        .collect();
    assert_eq!(high, vec!["CL002"]);
}

#[test]
fn test_small_digest_chunks_match() {
    let (_dir, path) = write_fixture("shop.apk", &signed_apk());
    let default = InspectConfig::default();
    let tiny = InspectConfig { digest_chunk_size: 7, ..InspectConfig::default() };

    let a = ReportAssembler::new(&default).analyze(&path).unwrap();
    let b = ReportAssembler::new(&tiny).analyze(&path).unwrap();
    assert_eq!(a.sha256, b.sha256);
}

#[test]
fn test_manifest_size_guard() {
    let (_dir, path) = write_fixture("shop.apk", &signed_apk());
    let config = InspectConfig { max_manifest_size: 16, ..InspectConfig::default() };

    let err = ReportAssembler::new(&config).analyze(&path).unwrap_err();
    assert!(matches!(err, InspectError::Archive(_)));
    assert!(err.to_string().contains("limit is 16"));
}

#[test]
fn test_scoped_manifest_failure() {
    let (_dir, path) = write_fixture("text.apk", &garbled_manifest_apk());
    let config = InspectConfig::default();

    let report = ReportAssembler::new(&config).analyze(&path).unwrap();
    assert!(report.badging.is_none());
    assert!(report.manifest.parse_error().is_some());
    assert!(report.activities_all.is_empty());
    assert!(report.signing.error().is_some());
}
