//! Intent Filter Summaries
//!
//! Compact view of an `<intent-filter>` as it matters for exposure review:
//! whether it makes the component a launcher entry, which actions it
//! answers, and which data URIs or MIME types it accepts.

use serde::Serialize;

/// Action carried by a launcher entry point
pub const ACTION_MAIN: &str = "android.intent.action.MAIN";

/// Category that places an activity in the launcher
pub const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// One `<data>` element; every field is absent unless explicitly declared
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataSpec {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Summary of one `<intent-filter>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentFilterDescriptor {
    #[serde(rename = "hasCategoryLAUNCHER")]
    pub has_launcher_category: bool,
    /// Named actions in document order
    pub actions: Vec<String>,
    pub data: Vec<DataSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_keys() {
        let filter = IntentFilterDescriptor {
            has_launcher_category: false,
            actions: vec!["android.intent.action.VIEW".to_string()],
            data: vec![DataSpec {
                scheme: Some("https".to_string()),
                host: Some("example.com".to_string()),
                ..Default::default()
            }],
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["hasCategoryLAUNCHER"], false);
        assert_eq!(json["actions"][0], "android.intent.action.VIEW");
        assert_eq!(json["data"][0]["host"], "example.com");
        assert!(json["data"][0]["path"].is_null());
        assert!(json["data"][0]["mimeType"].is_null());
    }
}
