//! Permission Lists
//!
//! Declared permissions are reported as a sorted set.

use std::collections::BTreeSet;

/// Sort and deduplicate permission names, dropping empty entries
pub fn normalize<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
