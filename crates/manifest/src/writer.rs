//! Manifest Writer
//!
//! Re-serializes a decoded binary manifest as textual XML so it can be
//! projected with an ordinary XML parser.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Cursor;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use apk_inspect_core::ANDROID_NS;

use crate::axml::{AxmlDocument, AxmlElement};

/// Writer errors
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("XML write error: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid element name {0:?}")]
    InvalidName(String),
}

/// Binary manifest to XML writer
pub struct AxmlWriter {
    indent: usize,
}

impl Default for AxmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AxmlWriter {
    /// Create a new writer with default settings
    pub fn new() -> Self {
        Self { indent: 4 }
    }

    /// Write the document to a string
    pub fn write_to_string(&self, document: &AxmlDocument) -> Result<String, WriteError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', self.indent);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;

        let prefixes = assign_prefixes(document);
        self.write_element(&mut writer, &document.root, &prefixes, true)?;

        let bytes = writer.into_inner().into_inner();
        Ok(String::from_utf8(bytes)?)
    }

    fn write_element(
        &self,
        writer: &mut Writer<Cursor<Vec<u8>>>,
        element: &AxmlElement,
        prefixes: &IndexMap<String, String>,
        is_root: bool,
    ) -> Result<(), WriteError> {
        if !is_xml_name(&element.name) {
            return Err(WriteError::InvalidName(element.name.clone()));
        }
        let qname = qualify(element.namespace.as_deref(), &element.name, prefixes);
        let mut start = BytesStart::new(qname.as_str());

        if is_root {
            for (uri, prefix) in prefixes {
                let decl = format!("xmlns:{}", prefix);
                start.push_attribute((decl.as_str(), &*sanitize(uri)));
            }
        }

        let mut seen = HashSet::new();
        for attr in &element.attributes {
            if !is_xml_name(&attr.name) {
                debug!("dropping attribute with unusable name {:?} on <{}>", attr.name, element.name);
                continue;
            }
            let attr_name = qualify(attr.namespace.as_deref(), &attr.name, prefixes);
            if !seen.insert(attr_name.clone()) {
                debug!("dropping duplicate attribute {} on <{}>", attr_name, element.name);
                continue;
            }
            start.push_attribute((attr_name.as_str(), &*sanitize(&attr.value)));
        }

        if element.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &element.children {
                self.write_element(writer, child, prefixes, false)?;
            }
            writer.write_event(Event::End(BytesEnd::new(qname.as_str())))?;
        }
        Ok(())
    }
}

/// Bind a prefix to every namespace URI in use. The platform namespace is
/// always `android`; other declared prefixes are kept when usable.
fn assign_prefixes(document: &AxmlDocument) -> IndexMap<String, String> {
    let mut uris: Vec<&str> = document.namespaces.keys().map(String::as_str).collect();
    collect_uris(&document.root, &mut uris);

    let mut prefixes: IndexMap<String, String> = IndexMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    if uris.contains(&ANDROID_NS) {
        prefixes.insert(ANDROID_NS.to_string(), "android".to_string());
        taken.insert("android".to_string());
    }

    let mut generated = 0;
    for uri in uris {
        if prefixes.contains_key(uri) {
            continue;
        }
        let declared = document
            .namespaces
            .get(uri)
            .filter(|p| is_xml_name(p) && !p.starts_with("xml") && !taken.contains(p.as_str()))
            .cloned();
        let prefix = match declared {
            Some(prefix) => prefix,
            None => loop {
                let candidate = format!("ns{}", generated);
                generated += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            },
        };
        taken.insert(prefix.clone());
        prefixes.insert(uri.to_string(), prefix);
    }
    prefixes
}

fn collect_uris<'a>(element: &'a AxmlElement, uris: &mut Vec<&'a str>) {
    let used = element
        .namespace
        .iter()
        .chain(element.attributes.iter().filter_map(|a| a.namespace.as_ref()));
    for uri in used {
        if !uris.contains(&uri.as_str()) {
            uris.push(uri.as_str());
        }
    }
    for child in &element.children {
        collect_uris(child, uris);
    }
}

fn qualify(namespace: Option<&str>, name: &str, prefixes: &IndexMap<String, String>) -> String {
    match namespace.and_then(|uri| prefixes.get(uri)) {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

/// Local XML name check; colons are excluded since prefixes are ours to assign
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Replace characters XML 1.0 cannot carry
fn sanitize(value: &str) -> Cow<'_, str> {
    let allowed = |c: char| {
        matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
    };
    if value.chars().all(allowed) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().map(|c| if allowed(c) { c } else { '\u{FFFD}' }).collect())
    }
}
