//! Android Manifest Manager
//!
//! Decodes the binary AndroidManifest.xml found inside an APK and projects
//! it into the security-oriented records used by the inspection report.
//!
//! Two independent views are offered: the [`BadgingInfo`] summary computed
//! straight from the decoded tree, and the full [`ProjectedManifest`]
//! obtained by re-serializing the tree as XML and walking it.

pub mod axml;
pub mod badging;
pub mod components;
pub mod intent_filters;
pub mod manifest;
pub mod parser;
pub mod permissions;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use axml::{AxmlAttribute, AxmlDocument, AxmlElement, DecodeError};
pub use badging::{Badging, BadgingError, BadgingInfo};
pub use components::{ComponentDescriptor, ComponentKind};
pub use intent_filters::{DataSpec, IntentFilterDescriptor};
pub use manifest::{ApplicationPolicy, AttrFlag, ManifestRecord, PackageIdentity, ProjectedManifest};
pub use parser::{ManifestParser, ParseError};
pub use writer::{AxmlWriter, WriteError};

/// Decode a binary manifest and project it, degrading every failure to a
/// parse-error record.
pub fn project_binary(document: &AxmlDocument) -> ManifestRecord {
    match AxmlWriter::new().write_to_string(document) {
        Ok(xml) => ManifestParser::project(&xml),
        Err(e) => {
            tracing::warn!("Manifest re-serialization failed: {}", e);
            ManifestRecord::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apk_inspect_core::ANDROID_NS;
    use test_support::{Attr, AxmlBuilder, TypedValue};

    #[test]
    fn test_binary_manifest_projection() {
        let bytes = AxmlBuilder::new()
            .namespace("android", ANDROID_NS)
            .start("manifest", vec![
                Attr::plain("package", TypedValue::string("com.example.app")),
                Attr::android("versionCode", TypedValue::Int(3)),
            ])
            .start("application", vec![
                Attr::android("allowBackup", TypedValue::Bool(false)),
                Attr::android("usesCleartextTraffic", TypedValue::Bool(true)),
                Attr::unnamed(0x0101_000f, TypedValue::Bool(true)),
            ])
            .start("receiver", vec![
                Attr::android("name", TypedValue::string(".Boot")),
                Attr::android("exported", TypedValue::Bool(false)),
            ])
            .start("intent-filter", vec![])
            .leaf("action", vec![Attr::android(
                "name",
                TypedValue::string("android.intent.action.BOOT_COMPLETED"),
            )])
            .end("intent-filter")
            .end("receiver")
            .end("application")
            .end("manifest")
            .build();

        let document = axml::decode(&bytes).unwrap();
        let manifest = match project_binary(&document) {
            ManifestRecord::Parsed(manifest) => manifest,
            other => panic!("projection failed: {:?}", other),
        };

        assert_eq!(manifest.identity.package_name.as_deref(), Some("com.example.app"));
        assert_eq!(manifest.identity.version_code, Some(3));
        assert!(manifest.application.debuggable);
        assert_eq!(manifest.application.allow_backup, AttrFlag::False);
        assert_eq!(manifest.application.uses_cleartext_traffic, AttrFlag::True);
        assert_eq!(manifest.receivers.len(), 1);
        assert_eq!(manifest.receivers[0].exported, AttrFlag::False);
        assert_eq!(
            manifest.receivers[0].intent_filters[0].actions,
            vec!["android.intent.action.BOOT_COMPLETED"]
        );
    }

    #[test]
    fn test_unwritable_tree_degrades() {
        let document = AxmlDocument {
            root: AxmlElement { name: String::new(), ..Default::default() },
            namespaces: Default::default(),
        };
        assert!(project_binary(&document).parse_error().is_some());
    }
}
