//! Security heuristics over the projected application policy.
//!
//! Rules run in a fixed order and that order is kept in the output.
//! Platform defaults are applied here, never during projection.

use serde::Serialize;

use apk_inspect_manifest::{ApplicationPolicy, AttrFlag};

/// Heuristic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth knowing, not a finding on its own
    Info,
    /// Risky configuration
    Medium,
    /// Directly exploitable configuration
    High,
}

/// A triggered heuristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heuristic {
    /// Stable rule code
    pub id: &'static str,
    /// Rule severity
    pub severity: Severity,
    /// Human-readable description
    pub title: String,
}

impl Heuristic {
    fn new(id: &'static str, severity: Severity, title: impl Into<String>) -> Self {
        Self { id, severity, title: title.into() }
    }
}

type Rule = fn(&ApplicationPolicy) -> Option<Heuristic>;

/// Evaluation order
const RULES: &[Rule] = &[debuggable, backup, cleartext, network_security_config];

/// Evaluate every rule against the application policy
pub fn evaluate(policy: &ApplicationPolicy) -> Vec<Heuristic> {
    RULES.iter().filter_map(|rule| rule(policy)).collect()
}

fn debuggable(policy: &ApplicationPolicy) -> Option<Heuristic> {
    policy
        .debuggable
        .then(|| Heuristic::new("DBG001", Severity::Medium, "Application is debuggable"))
}

/// Backups default to enabled when the attribute is absent.
fn backup(policy: &ApplicationPolicy) -> Option<Heuristic> {
    matches!(policy.allow_backup, AttrFlag::Unspecified | AttrFlag::True).then(|| {
        Heuristic::new(
            "BK001",
            Severity::Medium,
            "allowBackup is enabled or unspecified (defaults true)",
        )
    })
}

fn cleartext(policy: &ApplicationPolicy) -> Option<Heuristic> {
    match policy.uses_cleartext_traffic {
        AttrFlag::Unspecified => Some(Heuristic::new(
            "CL001",
            Severity::Info,
            "usesCleartextTraffic not explicitly set",
        )),
        AttrFlag::True => Some(Heuristic::new(
            "CL002",
            Severity::High,
            "Cleartext traffic is allowed for the application",
        )),
        _ => None,
    }
}

fn network_security_config(policy: &ApplicationPolicy) -> Option<Heuristic> {
    let nsc = policy.network_security_config.as_deref().filter(|v| !v.is_empty())?;
    Some(Heuristic::new(
        "NSC001",
        Severity::Info,
        format!("Custom networkSecurityConfig present: {}", nsc),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(policy: &ApplicationPolicy) -> Vec<&'static str> {
        evaluate(policy).into_iter().map(|h| h.id).collect()
    }

    #[test]
    fn test_rule_order() {
        let policy = ApplicationPolicy {
            debuggable: true,
            allow_backup: AttrFlag::Unspecified,
            uses_cleartext_traffic: AttrFlag::True,
            network_security_config: Some("@xml/nsc".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&policy), vec!["DBG001", "BK001", "CL002", "NSC001"]);

        let nsc = evaluate(&policy).pop().unwrap();
        assert_eq!(nsc.title, "Custom networkSecurityConfig present: @xml/nsc");
        assert_eq!(nsc.severity, Severity::Info);
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(ids(&ApplicationPolicy::default()), vec!["BK001", "CL001"]);
    }

    #[test]
    fn test_cleartext_false_is_silent() {
        let policy = ApplicationPolicy {
            uses_cleartext_traffic: AttrFlag::False,
            allow_backup: AttrFlag::False,
            ..Default::default()
        };
        assert!(evaluate(&policy).is_empty());
    }

    #[test]
    fn test_backup_explicit_true() {
        let policy = ApplicationPolicy {
            allow_backup: AttrFlag::True,
            uses_cleartext_traffic: AttrFlag::False,
            ..Default::default()
        };
        assert_eq!(ids(&policy), vec!["BK001"]);
    }

    #[test]
    fn test_non_literal_values_do_not_trigger() {
        let policy = ApplicationPolicy {
            allow_backup: AttrFlag::Other("@7F050001".to_string()),
            uses_cleartext_traffic: AttrFlag::Other("@7F050002".to_string()),
            network_security_config: Some(String::new()),
            ..Default::default()
        };
        assert!(evaluate(&policy).is_empty());
    }

    #[test]
    fn test_severity_json() {
        let h = Heuristic::new("CL002", Severity::High, "x");
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json, serde_json::json!({"id": "CL002", "severity": "high", "title": "x"}));
    }
}
