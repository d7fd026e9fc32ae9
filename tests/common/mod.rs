//! Synthetic APK fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use apk_inspect_archive::signing_block::{APK_SIGNATURE_SCHEME_V2_ID, APK_SIGNATURE_SCHEME_V3_ID};
use apk_inspect_archive::test_support::{
    build_zip, fake_certificate, pkcs7_signed_data, scheme_block, signing_block, splice_signing_block,
};
use apk_inspect_core::ANDROID_NS;
use apk_inspect_manifest::test_support::{Attr, AxmlBuilder, TypedValue};
use tempfile::TempDir;

pub const PACKAGE: &str = "com.example.shop";

fn name(value: &str) -> Vec<Attr> {
    vec![Attr::android("name", TypedValue::string(value))]
}

/// Binary manifest with a debuggable application, a launcher activity, a
/// deep-link activity and components without intent filters
pub fn sample_manifest() -> Vec<u8> {
    AxmlBuilder::new()
        .namespace("android", ANDROID_NS)
        .start("manifest", vec![
            Attr::plain("package", TypedValue::string(PACKAGE)),
            Attr::android("versionCode", TypedValue::Int(42)),
            Attr::android("versionName", TypedValue::string("4.2.0")),
        ])
        .leaf("uses-sdk", vec![
            Attr::android("minSdkVersion", TypedValue::Int(21)),
            Attr::android("targetSdkVersion", TypedValue::Int(33)),
        ])
        .leaf("uses-permission", name("android.permission.INTERNET"))
        .leaf("uses-permission", name("android.permission.CAMERA"))
        .leaf("uses-permission", name("android.permission.INTERNET"))
        .leaf("uses-permission-sdk-23", name("android.permission.ACCESS_FINE_LOCATION"))
        .start("application", vec![
            Attr::android("debuggable", TypedValue::Bool(true)),
            Attr::android("usesCleartextTraffic", TypedValue::Bool(true)),
            Attr::android("networkSecurityConfig", TypedValue::Reference(0x7f14_0003)),
        ])
        .start("activity", vec![
            Attr::android("name", TypedValue::string(".MainActivity")),
            Attr::android("exported", TypedValue::Bool(true)),
        ])
        .start("intent-filter", vec![])
        .leaf("action", name("android.intent.action.MAIN"))
        .leaf("category", name("android.intent.category.LAUNCHER"))
        .end("intent-filter")
        .end("activity")
        .start("activity", name("com.example.shop.ui.LinkActivity"))
        .start("intent-filter", vec![])
        .leaf("action", name("android.intent.action.VIEW"))
        .leaf("action", vec![])
        .leaf("category", name("android.intent.category.BROWSABLE"))
        .leaf("data", vec![
            Attr::android("scheme", TypedValue::string("https")),
            Attr::android("host", TypedValue::string("shop.example.com")),
        ])
        .end("intent-filter")
        .end("activity")
        .leaf("service", vec![
            Attr::android("name", TypedValue::string(".SyncService")),
            Attr::android("exported", TypedValue::Bool(false)),
        ])
        .leaf("receiver", name("BootReceiver"))
        .leaf("provider", name("androidx.core.content.FileProvider"))
        .end("application")
        .end("manifest")
        .build()
}

/// Signed APK: certificate 1 under v2, v3 and v1, certificate 2 under v1 only
pub fn signed_apk() -> Vec<u8> {
    let zip = build_zip(&[
        ("AndroidManifest.xml", sample_manifest()),
        ("classes.dex", b"dex\n035\0".to_vec()),
        ("META-INF/CERT.RSA", pkcs7_signed_data(&[fake_certificate(1)])),
        ("META-INF/OTHER.EC", pkcs7_signed_data(&[fake_certificate(2)])),
    ]);
    let block = signing_block(&[
        (APK_SIGNATURE_SCHEME_V2_ID, scheme_block(&[fake_certificate(1)], false)),
        (APK_SIGNATURE_SCHEME_V3_ID, scheme_block(&[fake_certificate(1)], true)),
    ]);
    splice_signing_block(&zip, &block)
}

/// APK whose manifest entry is not binary XML
pub fn garbled_manifest_apk() -> Vec<u8> {
    build_zip(&[("AndroidManifest.xml", b"<manifest package=\"text.only\"/>".to_vec())])
}

/// APK with no manifest entry
pub fn manifestless_apk() -> Vec<u8> {
    build_zip(&[("classes.dex", b"dex\n035\0".to_vec())])
}

/// Write `bytes` to a fresh temporary directory
pub fn write_fixture(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    (dir, path)
}
