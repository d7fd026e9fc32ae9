//! Projected Manifest Record
//!
//! The security-oriented view of AndroidManifest.xml: package identity,
//! application policy flags, permissions and component exposure.

use serde::{Serialize, Serializer};

use crate::components::ComponentDescriptor;

/// Tri-state value of a boolean-like manifest attribute.
///
/// Absence is kept distinct from an explicit `"false"`, since platform
/// defaults only apply to the unspecified case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttrFlag {
    #[default]
    Unspecified,
    True,
    False,
    /// Anything that is not a literal boolean (e.g. a resource reference)
    Other(String),
}

impl AttrFlag {
    /// Classify a raw attribute value
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            None => AttrFlag::Unspecified,
            Some("true") => AttrFlag::True,
            Some("false") => AttrFlag::False,
            Some(other) => AttrFlag::Other(other.to_string()),
        }
    }

    /// Raw textual value, `None` when unspecified
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrFlag::Unspecified => None,
            AttrFlag::True => Some("true"),
            AttrFlag::False => Some("false"),
            AttrFlag::Other(raw) => Some(raw),
        }
    }
}

impl Serialize for AttrFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(raw) => serializer.serialize_str(raw),
            None => serializer.serialize_none(),
        }
    }
}

/// Package identity from the `<manifest>` and `<uses-sdk>` elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageIdentity {
    pub package_name: Option<String>,
    pub version_code: Option<u64>,
    pub version_name: Option<String>,
    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,
    pub max_sdk: Option<u32>,
}

/// Security-relevant attributes of the `<application>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationPolicy {
    pub debuggable: bool,
    #[serde(rename = "allowBackup")]
    pub allow_backup: AttrFlag,
    #[serde(rename = "usesCleartextTraffic")]
    pub uses_cleartext_traffic: AttrFlag,
    #[serde(rename = "networkSecurityConfig")]
    pub network_security_config: Option<String>,
    #[serde(rename = "requestsLegacyExternalStorage")]
    pub requests_legacy_external_storage: AttrFlag,
    #[serde(rename = "backupAgent")]
    pub backup_agent: Option<String>,
}

/// Fully projected manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectedManifest {
    #[serde(flatten)]
    pub identity: PackageIdentity,
    pub application: ApplicationPolicy,
    /// Sorted, deduplicated permission names
    pub permissions: Vec<String>,
    pub activities: Vec<ComponentDescriptor>,
    pub services: Vec<ComponentDescriptor>,
    pub receivers: Vec<ComponentDescriptor>,
    pub providers: Vec<ComponentDescriptor>,
}

/// Projection outcome as it appears in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestRecord {
    Parsed(Box<ProjectedManifest>),
    Failed { manifest_parse_error: String },
}

impl ManifestRecord {
    pub fn failed(message: impl Into<String>) -> Self {
        ManifestRecord::Failed { manifest_parse_error: message.into() }
    }

    /// Application policy, when the manifest was projected
    pub fn application(&self) -> Option<&ApplicationPolicy> {
        match self {
            ManifestRecord::Parsed(manifest) => Some(&manifest.application),
            ManifestRecord::Failed { .. } => None,
        }
    }

    pub fn parse_error(&self) -> Option<&str> {
        match self {
            ManifestRecord::Parsed(_) => None,
            ManifestRecord::Failed { manifest_parse_error } => Some(manifest_parse_error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_flag_classification() {
        assert_eq!(AttrFlag::from_attr(None), AttrFlag::Unspecified);
        assert_eq!(AttrFlag::from_attr(Some("true")), AttrFlag::True);
        assert_eq!(AttrFlag::from_attr(Some("false")), AttrFlag::False);
        assert_eq!(
            AttrFlag::from_attr(Some("@7F050001")),
            AttrFlag::Other("@7F050001".to_string())
        );
    }

    #[test]
    fn test_attr_flag_serialization() {
        let json = serde_json::to_value(ApplicationPolicy::default()).unwrap();
        assert_eq!(json["debuggable"], false);
        assert!(json["allowBackup"].is_null());
        assert!(json["usesCleartextTraffic"].is_null());
        assert!(json["requestsLegacyExternalStorage"].is_null());

        let policy = ApplicationPolicy {
            allow_backup: AttrFlag::False,
            uses_cleartext_traffic: AttrFlag::True,
            ..Default::default()
        };
        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["allowBackup"], "false");
        assert_eq!(json["usesCleartextTraffic"], "true");
    }

    #[test]
    fn test_record_shapes() {
        let failed = ManifestRecord::failed("unexpected end of stream");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json, serde_json::json!({"manifest_parse_error": "unexpected end of stream"}));
        assert!(failed.application().is_none());

        let parsed = ManifestRecord::Parsed(Box::default());
        let json = serde_json::to_value(&parsed).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "package_name", "version_code", "version_name", "min_sdk", "target_sdk", "max_sdk",
                "application", "permissions", "activities", "services", "receivers", "providers",
            ]
        );
        assert!(parsed.parse_error().is_none());
    }
}
