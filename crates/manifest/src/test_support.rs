//! Binary XML encoder for building manifest fixtures in tests.

use apk_inspect_core::ANDROID_NS;

use crate::axml::{
    ANDROID_ATTRIBUTES, RES_STRING_POOL_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
    RES_XML_TYPE, TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX, TYPE_REFERENCE, TYPE_STRING,
};

const NO_INDEX: u32 = 0xffff_ffff;

/// Attribute value as stored in a binary manifest
#[derive(Debug, Clone)]
pub enum TypedValue {
    String(String),
    Int(i32),
    Bool(bool),
    Reference(u32),
    Hex(u32),
}

impl TypedValue {
    pub fn string(value: impl Into<String>) -> Self {
        TypedValue::String(value.into())
    }
}

/// Attribute to encode
#[derive(Debug, Clone)]
pub struct Attr {
    namespace: Option<String>,
    name: String,
    resource_id: Option<u32>,
    value: TypedValue,
}

impl Attr {
    /// Android-namespaced attribute; public framework names get their
    /// resource id like aapt assigns them
    pub fn android(name: &str, value: TypedValue) -> Self {
        let resource_id = ANDROID_ATTRIBUTES
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(id, _)| *id);
        Self {
            namespace: Some(ANDROID_NS.to_string()),
            name: name.to_string(),
            resource_id,
            value,
        }
    }

    /// Attribute with no namespace
    pub fn plain(name: &str, value: TypedValue) -> Self {
        Self { namespace: None, name: name.to_string(), resource_id: None, value }
    }

    /// Android attribute whose name string is blank, identified only by its
    /// resource id
    pub fn unnamed(resource_id: u32, value: TypedValue) -> Self {
        Self {
            namespace: Some(ANDROID_NS.to_string()),
            name: String::new(),
            resource_id: Some(resource_id),
            value,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Start(String, Vec<Attr>),
    End(String),
}

/// Builder producing a binary XML document
#[derive(Debug, Default)]
pub struct AxmlBuilder {
    utf8: bool,
    namespaces: Vec<(String, String)>,
    nodes: Vec<Node>,
}

impl AxmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the string pool as UTF-8 instead of UTF-16
    pub fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        self
    }

    pub fn start(mut self, name: &str, attrs: Vec<Attr>) -> Self {
        self.nodes.push(Node::Start(name.to_string(), attrs));
        self
    }

    pub fn end(mut self, name: &str) -> Self {
        self.nodes.push(Node::End(name.to_string()));
        self
    }

    /// Element with no children
    pub fn leaf(self, name: &str, attrs: Vec<Attr>) -> Self {
        self.start(name, attrs).end(name)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();

        // Resource-mapped names occupy the first pool slots, one per id.
        for node in &self.nodes {
            if let Node::Start(_, attrs) = node {
                for attr in attrs {
                    if let Some(id) = attr.resource_id {
                        pool.mapped(&attr.name, id);
                    }
                }
            }
        }

        let mut body = Vec::new();
        for (prefix, uri) in &self.namespaces {
            let (p, u) = (pool.intern(prefix), pool.intern(uri));
            namespace_chunk(&mut body, RES_XML_START_NAMESPACE_TYPE, p, u);
        }
        for node in &self.nodes {
            match node {
                Node::Start(name, attrs) => {
                    let name = pool.intern(name);
                    let mut encoded = Vec::new();
                    for attr in attrs {
                        encoded.push(encode_attr(&mut pool, attr));
                    }
                    start_element_chunk(&mut body, name, &encoded);
                }
                Node::End(name) => {
                    let name = pool.intern(name);
                    let mut chunk = Vec::new();
                    push_header(&mut chunk, RES_XML_END_ELEMENT_TYPE, 16, 24);
                    push_u32(&mut chunk, 1);
                    push_u32(&mut chunk, NO_INDEX);
                    push_u32(&mut chunk, NO_INDEX);
                    push_u32(&mut chunk, name);
                    body.extend(chunk);
                }
            }
        }
        for (prefix, uri) in self.namespaces.iter().rev() {
            let (p, u) = (pool.intern(prefix), pool.intern(uri));
            namespace_chunk(&mut body, RES_XML_END_NAMESPACE_TYPE, p, u);
        }

        let string_pool = pool.encode(self.utf8);
        let resource_map = pool.resource_map();

        let total = 8 + string_pool.len() + resource_map.len() + body.len();
        let mut out = Vec::with_capacity(total);
        push_header(&mut out, RES_XML_TYPE, 8, total as u32);
        out.extend(string_pool);
        out.extend(resource_map);
        out.extend(body);
        out
    }
}

#[derive(Debug, Default)]
struct Pool {
    strings: Vec<String>,
    resource_ids: Vec<u32>,
}

impl Pool {
    fn mapped(&mut self, name: &str, id: u32) -> u32 {
        if let Some(pos) = self.resource_ids.iter().position(|known| *known == id) {
            return pos as u32;
        }
        self.strings.push(name.to_string());
        self.resource_ids.push(id);
        (self.strings.len() - 1) as u32
    }

    fn intern(&mut self, s: &str) -> u32 {
        let mapped = self.resource_ids.len();
        if let Some(pos) = self.strings[mapped..].iter().position(|known| known == s) {
            return (mapped + pos) as u32;
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as u32
    }

    fn encode(&self, utf8: bool) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len());
        for s in &self.strings {
            offsets.push(data.len() as u32);
            if utf8 {
                push_utf8_len(&mut data, s.chars().count());
                push_utf8_len(&mut data, s.len());
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            } else {
                let units: Vec<u16> = s.encode_utf16().collect();
                push_u16(&mut data, units.len() as u16);
                for unit in units {
                    push_u16(&mut data, unit);
                }
                push_u16(&mut data, 0);
            }
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let header_size = 28u32;
        let strings_start = header_size + 4 * offsets.len() as u32;
        let total = strings_start + data.len() as u32;
        let mut chunk = Vec::with_capacity(total as usize);
        push_header(&mut chunk, RES_STRING_POOL_TYPE, header_size as u16, total);
        push_u32(&mut chunk, offsets.len() as u32);
        push_u32(&mut chunk, 0);
        push_u32(&mut chunk, if utf8 { 1 << 8 } else { 0 });
        push_u32(&mut chunk, strings_start);
        push_u32(&mut chunk, 0);
        for offset in offsets {
            push_u32(&mut chunk, offset);
        }
        chunk.extend(data);
        chunk
    }

    fn resource_map(&self) -> Vec<u8> {
        if self.resource_ids.is_empty() {
            return Vec::new();
        }
        let mut chunk = Vec::new();
        let size = 8 + 4 * self.resource_ids.len() as u32;
        push_header(&mut chunk, RES_XML_RESOURCE_MAP_TYPE, 8, size);
        for id in &self.resource_ids {
            push_u32(&mut chunk, *id);
        }
        chunk
    }
}

fn encode_attr(pool: &mut Pool, attr: &Attr) -> [u8; 20] {
    let ns = attr.namespace.as_deref().map_or(NO_INDEX, |uri| pool.intern(uri));
    let name = match attr.resource_id {
        Some(id) => pool.mapped(&attr.name, id),
        None => pool.intern(&attr.name),
    };
    let (raw, data_type, data) = match &attr.value {
        TypedValue::String(s) => {
            let index = pool.intern(s);
            (index, TYPE_STRING, index)
        }
        TypedValue::Int(v) => (NO_INDEX, TYPE_INT_DEC, *v as u32),
        TypedValue::Bool(v) => (NO_INDEX, TYPE_INT_BOOLEAN, if *v { 0xffff_ffff } else { 0 }),
        TypedValue::Reference(id) => (NO_INDEX, TYPE_REFERENCE, *id),
        TypedValue::Hex(v) => (NO_INDEX, TYPE_INT_HEX, *v),
    };

    let mut out = Vec::with_capacity(20);
    push_u32(&mut out, ns);
    push_u32(&mut out, name);
    push_u32(&mut out, raw);
    push_u16(&mut out, 8);
    out.push(0);
    out.push(data_type);
    push_u32(&mut out, data);
    let mut encoded = [0u8; 20];
    encoded.copy_from_slice(&out);
    encoded
}

fn namespace_chunk(out: &mut Vec<u8>, ty: u16, prefix: u32, uri: u32) {
    push_header(out, ty, 16, 24);
    push_u32(out, 1);
    push_u32(out, NO_INDEX);
    push_u32(out, prefix);
    push_u32(out, uri);
}

fn start_element_chunk(out: &mut Vec<u8>, name: u32, attrs: &[[u8; 20]]) {
    let size = 16 + 20 + 20 * attrs.len() as u32;
    push_header(out, RES_XML_START_ELEMENT_TYPE, 16, size);
    push_u32(out, 1);
    push_u32(out, NO_INDEX);
    push_u32(out, NO_INDEX);
    push_u32(out, name);
    push_u16(out, 20);
    push_u16(out, 20);
    push_u16(out, attrs.len() as u16);
    push_u16(out, 0);
    push_u16(out, 0);
    push_u16(out, 0);
    for attr in attrs {
        out.extend_from_slice(attr);
    }
}

fn push_header(out: &mut Vec<u8>, ty: u16, header_size: u16, size: u32) {
    push_u16(out, ty);
    push_u16(out, header_size);
    push_u32(out, size);
}

fn push_utf8_len(out: &mut Vec<u8>, len: usize) {
    if len > 0x7f {
        out.push(((len >> 8) as u8) | 0x80);
    }
    out.push((len & 0xff) as u8);
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
