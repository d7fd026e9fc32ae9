//! Badging Summary
//!
//! Quick accessors computed straight from the decoded binary tree, without
//! going through XML text: identity, permissions, fully-qualified component
//! names and the launcher activity.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::axml::{AxmlDocument, AxmlElement};
use crate::components::ComponentKind;
use crate::intent_filters::{ACTION_MAIN, CATEGORY_LAUNCHER};
use crate::permissions;

/// Badging errors
#[derive(Debug, thiserror::Error)]
pub enum BadgingError {
    #[error("root element is <{0}>, expected <manifest>")]
    NotAManifest(String),
}

/// Identity fields as reported under `badging`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Badging {
    pub package_name: Option<String>,
    pub version_name: Option<String>,
    pub version_code: Option<String>,
    pub min_sdk: Option<String>,
    pub target_sdk: Option<String>,
    pub max_sdk: Option<String>,
}

/// Everything the badging pass extracts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgingInfo {
    pub badging: Badging,
    /// Sorted `uses-permission` and `uses-permission-sdk-23` names
    pub permissions: Vec<String>,
    pub main_activity: Option<String>,
    pub activities: Vec<String>,
    pub services: Vec<String>,
    pub receivers: Vec<String>,
    pub providers: Vec<String>,
}

impl BadgingInfo {
    /// Compute the badging summary of a decoded manifest
    pub fn from_document(document: &AxmlDocument) -> Result<Self, BadgingError> {
        let root = &document.root;
        if root.name != "manifest" {
            return Err(BadgingError::NotAManifest(root.name.clone()));
        }

        let package = root.attribute(None, "package").map(str::to_string);
        let sdk = root.first_child("uses-sdk");
        let sdk_attr = |name: &str| sdk.and_then(|s| s.android_attr(name)).map(str::to_string);

        let badging = Badging {
            package_name: package.clone(),
            version_name: root.android_attr("versionName").map(str::to_string),
            version_code: root.android_attr("versionCode").map(str::to_string),
            min_sdk: sdk_attr("minSdkVersion"),
            target_sdk: sdk_attr("targetSdkVersion"),
            max_sdk: sdk_attr("maxSdkVersion"),
        };

        let permissions = permissions::normalize(
            root.children
                .iter()
                .filter(|c| c.name == "uses-permission" || c.name == "uses-permission-sdk-23")
                .filter_map(|c| c.android_attr("name")),
        );

        let mut info = BadgingInfo { badging, permissions, ..Default::default() };
        let package = package.as_deref().unwrap_or_default();

        if let Some(app) = root.first_child("application") {
            let names = |kind: ComponentKind| -> Vec<String> {
                app.children_named(kind.tag())
                    .filter_map(|c| c.android_attr("name"))
                    .map(|name| qualify_class_name(package, name))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            };
            info.activities = names(ComponentKind::Activity);
            info.services = names(ComponentKind::Service);
            info.receivers = names(ComponentKind::Receiver);
            info.providers = names(ComponentKind::Provider);

            info.main_activity = app
                .children
                .iter()
                .filter(|c| c.name == "activity" || c.name == "activity-alias")
                .find(|c| is_launcher(c))
                .and_then(|c| c.android_attr("name"))
                .map(|name| qualify_class_name(package, name));
        }

        Ok(info)
    }
}

fn is_launcher(component: &AxmlElement) -> bool {
    component.children_named("intent-filter").any(|filter| {
        let has_main = filter
            .children_named("action")
            .any(|a| a.android_attr("name") == Some(ACTION_MAIN));
        let has_launcher = filter
            .children_named("category")
            .any(|c| c.android_attr("name") == Some(CATEGORY_LAUNCHER));
        has_main && has_launcher
    })
}

/// Expand a manifest class name against the package name
pub fn qualify_class_name(package: &str, name: &str) -> String {
    if package.is_empty() {
        return name.to_string();
    }
    if name.starts_with('.') {
        format!("{}{}", package, name)
    } else if !name.contains('.') {
        format!("{}.{}", package, name)
    } else {
        name.to_string()
    }
}
