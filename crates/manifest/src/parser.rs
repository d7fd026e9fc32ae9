//! AndroidManifest.xml Projector
//!
//! Projects manifest XML text into a [`ProjectedManifest`]. Android
//! attributes are always looked up under the fixed platform namespace URI,
//! whatever prefix the document binds to it.

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use apk_inspect_core::ANDROID_NS;

use crate::components::{ComponentDescriptor, ComponentKind};
use crate::intent_filters::{DataSpec, IntentFilterDescriptor, CATEGORY_LAUNCHER};
use crate::manifest::{ApplicationPolicy, AttrFlag, ManifestRecord, PackageIdentity, ProjectedManifest};
use crate::permissions;

/// Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),
    #[error("Invalid manifest structure: {0}")]
    InvalidStructure(String),
}

/// Manifest parser
pub struct ManifestParser;

impl ManifestParser {
    /// Parse manifest from string
    pub fn parse_string(xml: &str) -> Result<ProjectedManifest, ParseError> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if !root.has_tag_name("manifest") {
            return Err(ParseError::InvalidStructure(format!(
                "root element is <{}>, expected <manifest>",
                root.tag_name().name()
            )));
        }

        let mut manifest = ProjectedManifest {
            identity: Self::parse_identity(root),
            ..Default::default()
        };

        manifest.permissions = permissions::normalize(
            Self::children(root, "uses-permission").filter_map(|p| get_android_attr(p, "name")),
        );

        if let Some(app) = Self::children(root, "application").next() {
            manifest.application = Self::parse_application(app);
            for kind in ComponentKind::ALL {
                let components = Self::children(app, kind.tag())
                    .filter_map(|node| Self::parse_component(node, kind))
                    .collect();
                match kind {
                    ComponentKind::Activity => manifest.activities = components,
                    ComponentKind::Service => manifest.services = components,
                    ComponentKind::Receiver => manifest.receivers = components,
                    ComponentKind::Provider => manifest.providers = components,
                }
            }
        } else {
            debug!("manifest has no <application> element");
        }

        Ok(manifest)
    }

    /// Project manifest XML, degrading to a parse-error record on failure
    pub fn project(xml: &str) -> ManifestRecord {
        match Self::parse_string(xml) {
            Ok(manifest) => ManifestRecord::Parsed(Box::new(manifest)),
            Err(e) => {
                warn!("Manifest projection failed: {}", e);
                ManifestRecord::failed(e.to_string())
            }
        }
    }

    fn children<'a, 'input: 'a>(
        node: Node<'a, 'input>,
        tag: &'a str,
    ) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
        node.children().filter(move |n| n.is_element() && n.has_tag_name(tag))
    }

    fn parse_identity(root: Node) -> PackageIdentity {
        let mut identity = PackageIdentity {
            package_name: get_attr(root, "package"),
            version_code: get_android_attr(root, "versionCode").and_then(|v| parse_number(&v)),
            version_name: get_android_attr(root, "versionName"),
            ..Default::default()
        };

        if let Some(sdk) = Self::children(root, "uses-sdk").next() {
            identity.min_sdk = get_android_attr(sdk, "minSdkVersion").and_then(|v| parse_number(&v));
            identity.target_sdk = get_android_attr(sdk, "targetSdkVersion").and_then(|v| parse_number(&v));
            identity.max_sdk = get_android_attr(sdk, "maxSdkVersion").and_then(|v| parse_number(&v));
        }
        identity
    }

    fn parse_application(app: Node) -> ApplicationPolicy {
        let flag = |name: &str| AttrFlag::from_attr(app.attribute((ANDROID_NS, name)));
        ApplicationPolicy {
            debuggable: app.attribute((ANDROID_NS, "debuggable")) == Some("true"),
            allow_backup: flag("allowBackup"),
            uses_cleartext_traffic: flag("usesCleartextTraffic"),
            network_security_config: get_android_attr(app, "networkSecurityConfig"),
            requests_legacy_external_storage: flag("requestLegacyExternalStorage"),
            backup_agent: get_android_attr(app, "backupAgent"),
        }
    }

    fn parse_component(node: Node, kind: ComponentKind) -> Option<ComponentDescriptor> {
        let Some(name) = get_android_attr(node, "name") else {
            warn!("Skipping <{}> without android:name", kind.tag());
            return None;
        };

        let mut component = ComponentDescriptor::new(name);
        component.exported = AttrFlag::from_attr(node.attribute((ANDROID_NS, "exported")));
        component.intent_filters = Self::children(node, "intent-filter")
            .map(Self::parse_intent_filter)
            .collect();
        Some(component)
    }

    fn parse_intent_filter(filter: Node) -> IntentFilterDescriptor {
        IntentFilterDescriptor {
            has_launcher_category: Self::children(filter, "category")
                .any(|c| c.attribute((ANDROID_NS, "name")) == Some(CATEGORY_LAUNCHER)),
            actions: Self::children(filter, "action")
                .filter_map(|a| get_android_attr(a, "name"))
                .collect(),
            data: Self::children(filter, "data").map(Self::parse_data).collect(),
        }
    }

    fn parse_data(data: Node) -> DataSpec {
        DataSpec {
            scheme: get_android_attr(data, "scheme"),
            host: get_android_attr(data, "host"),
            path: get_android_attr(data, "path"),
            mime_type: get_android_attr(data, "mimeType"),
        }
    }
}

/// Get attribute in the Android namespace
fn get_android_attr(node: Node, name: &str) -> Option<String> {
    node.attribute((ANDROID_NS, name)).map(str::to_string)
}

/// Get attribute without namespace
fn get_attr(node: Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        debug!("non-numeric manifest value {:?}", value);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:a="http://schemas.android.com/apk/res/android"
    package="com.example.app"
    a:versionCode="7"
    a:versionName="1.0.0">

    <uses-sdk a:minSdkVersion="21" a:targetSdkVersion="33" />
    <uses-sdk a:minSdkVersion="1" />

    <uses-permission a:name="android.permission.INTERNET" />
    <uses-permission a:name="android.permission.CAMERA" />
    <uses-permission a:name="android.permission.INTERNET" />
    <uses-permission name="not.namespaced" />

    <application
        a:label="@string/app_name"
        a:debuggable="true"
        a:usesCleartextTraffic="false"
        a:networkSecurityConfig="@xml/nsc">

        <activity a:name=".MainActivity" a:exported="true">
            <intent-filter>
                <action a:name="android.intent.action.MAIN" />
                <action />
                <category a:name="android.intent.category.LAUNCHER" />
            </intent-filter>
            <intent-filter>
                <action a:name="android.intent.action.VIEW" />
                <data a:scheme="https" a:host="example.com" />
            </intent-filter>
        </activity>

        <activity a:name=".SettingsActivity" />
        <activity a:exported="true" />

        <service a:name=".SyncService" a:exported="false" />
        <receiver a:name=".BootReceiver" />
        <provider a:name=".DataProvider" a:exported="@7F040001" />
    </application>

    <application a:debuggable="false" />
</manifest>"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ManifestParser::parse_string(SAMPLE_MANIFEST).unwrap();

        assert_eq!(manifest.identity.package_name.as_deref(), Some("com.example.app"));
        assert_eq!(manifest.identity.version_code, Some(7));
        assert_eq!(manifest.identity.version_name.as_deref(), Some("1.0.0"));
        assert_eq!(manifest.identity.min_sdk, Some(21));
        assert_eq!(manifest.identity.target_sdk, Some(33));
        assert_eq!(manifest.identity.max_sdk, None);
        assert_eq!(
            manifest.permissions,
            vec!["android.permission.CAMERA", "android.permission.INTERNET"]
        );
    }

    #[test]
    fn test_application_policy_first_match() {
        let manifest = ManifestParser::parse_string(SAMPLE_MANIFEST).unwrap();
        let app = &manifest.application;

        assert!(app.debuggable);
        assert_eq!(app.allow_backup, AttrFlag::Unspecified);
        assert_eq!(app.uses_cleartext_traffic, AttrFlag::False);
        assert_eq!(app.network_security_config.as_deref(), Some("@xml/nsc"));
        assert_eq!(app.requests_legacy_external_storage, AttrFlag::Unspecified);
        assert_eq!(app.backup_agent, None);
    }

    #[test]
    fn test_components() {
        let manifest = ManifestParser::parse_string(SAMPLE_MANIFEST).unwrap();

        let names: Vec<&str> = manifest.activities.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec![".MainActivity", ".SettingsActivity"]);

        let main = &manifest.activities[0];
        assert_eq!(main.exported, AttrFlag::True);
        assert_eq!(main.intent_filters.len(), 2);
        assert!(main.intent_filters[0].has_launcher_category);
        assert_eq!(main.intent_filters[0].actions, vec!["android.intent.action.MAIN"]);
        assert!(!main.intent_filters[1].has_launcher_category);
        assert_eq!(main.intent_filters[1].data[0].scheme.as_deref(), Some("https"));
        assert_eq!(main.intent_filters[1].data[0].path, None);

        assert!(manifest.activities[1].intent_filters.is_empty());
        assert_eq!(manifest.services[0].exported, AttrFlag::False);
        assert_eq!(manifest.receivers[0].exported, AttrFlag::Unspecified);
        assert_eq!(manifest.providers[0].exported, AttrFlag::Other("@7F040001".to_string()));
    }

    #[test]
    fn test_unprefixed_attributes_are_not_android() {
        let xml = r#"<manifest package="p"><application debuggable="true" allowBackup="false"/></manifest>"#;
        let manifest = ManifestParser::parse_string(xml).unwrap();
        assert!(!manifest.application.debuggable);
        assert_eq!(manifest.application.allow_backup, AttrFlag::Unspecified);
    }

    #[test]
    fn test_non_numeric_versions() {
        let xml = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
            android:versionCode="@7F0A0001"><uses-sdk android:minSdkVersion="Q"/></manifest>"#;
        let manifest = ManifestParser::parse_string(xml).unwrap();
        assert_eq!(manifest.identity.version_code, None);
        assert_eq!(manifest.identity.min_sdk, None);
        assert_eq!(manifest.identity.package_name, None);
    }

    #[test]
    fn test_project_failure() {
        let record = ManifestParser::project("<manifest><application></manifest>");
        assert!(record.parse_error().is_some());

        let record = ManifestParser::project("<resources/>");
        assert!(record.parse_error().unwrap().contains("expected <manifest>"));
    }
}
