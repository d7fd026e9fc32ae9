//! Android Component Exposure
//!
//! Activities, services, receivers and providers share one descriptor:
//! the class name, the explicit `exported` state and the intent filters
//! that make the component reachable.

use serde::Serialize;

use crate::intent_filters::IntentFilterDescriptor;
use crate::manifest::AttrFlag;

/// Component type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Activity,
    Service,
    Receiver,
    Provider,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Activity,
        ComponentKind::Service,
        ComponentKind::Receiver,
        ComponentKind::Provider,
    ];

    /// Manifest element name
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentKind::Activity => "activity",
            ComponentKind::Service => "service",
            ComponentKind::Receiver => "receiver",
            ComponentKind::Provider => "provider",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// One declared component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentDescriptor {
    /// Class name as written in the manifest
    pub name: String,
    /// Explicit exported state; unspecified means it is implied by the filters
    pub exported: AttrFlag,
    pub intent_filters: Vec<IntentFilterDescriptor>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exported: AttrFlag::Unspecified,
            intent_filters: Vec::new(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(ComponentKind::from_tag("receiver"), Some(ComponentKind::Receiver));
        assert_eq!(ComponentKind::from_tag("activity-alias"), None);
        assert_eq!(ComponentKind::Provider.tag(), "provider");
    }

    #[test]
    fn test_empty_filters_serialize_as_list() {
        let json = serde_json::to_value(ComponentDescriptor::new(".Main")).unwrap();
        assert_eq!(json["intent_filters"], serde_json::json!([]));
        assert!(json["exported"].is_null());
    }
}
