//! Binary XML (AXML) Decoder
//!
//! AndroidManifest.xml is stored inside an APK as a chunked binary
//! resource document. This module decodes it into an element tree with
//! namespace-qualified attributes whose typed values are rendered back to
//! their textual form.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use tracing::{debug, trace};

use apk_inspect_core::ANDROID_NS;

pub const RES_NULL_TYPE: u16 = 0x0000;
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_FIRST_COLOR_INT: u8 = 0x1c;
pub const TYPE_LAST_COLOR_INT: u8 = 0x1f;

const CHUNK_HEADER_SIZE: u16 = 8;
const UTF8_FLAG: u32 = 1 << 8;

const RADIX_MULTS: [f32; 4] = [0.003_906_25, 3.051_758e-5, 1.192_093e-7, 4.656_613e-10];
const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

/// Public framework attribute ids, used when an attribute's name string has
/// been blanked out.
pub(crate) const ANDROID_ATTRIBUTES: &[(u32, &str)] = &[
    (0x0101_0001, "label"),
    (0x0101_0002, "icon"),
    (0x0101_0003, "name"),
    (0x0101_0006, "permission"),
    (0x0101_000f, "debuggable"),
    (0x0101_0010, "exported"),
    (0x0101_0026, "mimeType"),
    (0x0101_0027, "scheme"),
    (0x0101_0028, "host"),
    (0x0101_002a, "path"),
    (0x0101_020c, "minSdkVersion"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
    (0x0101_0270, "targetSdkVersion"),
    (0x0101_0271, "maxSdkVersion"),
    (0x0101_027f, "backupAgent"),
    (0x0101_0280, "allowBackup"),
    (0x0101_04ec, "usesCleartextTraffic"),
    (0x0101_0527, "networkSecurityConfig"),
    (0x0101_0603, "requestLegacyExternalStorage"),
];

/// Decoder errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated binary XML: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a binary XML document (chunk type 0x{0:04x})")]
    NotBinaryXml(u16),
    #[error("invalid chunk at offset {offset}: {reason}")]
    InvalidChunk { offset: u64, reason: String },
    #[error("string index {0} out of range")]
    StringIndex(u32),
    #[error("unbalanced element tree: {0}")]
    Unbalanced(String),
    #[error("document has no root element")]
    Empty,
}

/// A decoded attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxmlAttribute {
    /// Namespace URI, if any
    pub namespace: Option<String>,
    /// Local name
    pub name: String,
    /// Value rendered as text
    pub value: String,
    /// Framework resource id from the resource map
    pub resource_id: Option<u32>,
}

/// A decoded element with its children in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<AxmlAttribute>,
    pub children: Vec<AxmlElement>,
}

impl AxmlElement {
    /// Look up an attribute by namespace URI and local name
    pub fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == namespace && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Look up an attribute in the Android platform namespace
    pub fn android_attr(&self, name: &str) -> Option<&str> {
        self.attribute(Some(ANDROID_NS), name)
    }

    /// Direct children with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AxmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given tag name
    pub fn first_child(&self, name: &str) -> Option<&AxmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A decoded binary XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxmlDocument {
    pub root: AxmlElement,
    /// Namespace URI to prefix, in declaration order
    pub namespaces: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    ty: u16,
    header_size: u16,
    size: u32,
}

impl ChunkHeader {
    fn read(r: &mut Cursor<&[u8]>) -> Result<Self, DecodeError> {
        let ty = r.read_u16::<LittleEndian>()?;
        let header_size = r.read_u16::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        Ok(Self { ty, header_size, size })
    }
}

/// String pool of a binary XML document
#[derive(Debug, Default)]
struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn parse(chunk: &[u8], header: &ChunkHeader) -> Result<Self, DecodeError> {
        let mut r = Cursor::new(chunk);
        r.set_position(CHUNK_HEADER_SIZE as u64);
        let string_count = r.read_u32::<LittleEndian>()?;
        let _style_count = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let strings_start = r.read_u32::<LittleEndian>()? as u64;
        let _styles_start = r.read_u32::<LittleEndian>()?;

        if strings_start > chunk.len() as u64 {
            return Err(DecodeError::InvalidChunk {
                offset: 0,
                reason: format!("string data starts past end of pool ({})", strings_start),
            });
        }
        // Each offset takes four bytes, which bounds the count before allocating.
        if (string_count as u64) * 4 > chunk.len() as u64 {
            return Err(DecodeError::InvalidChunk {
                offset: 0,
                reason: format!("string count {} exceeds pool size", string_count),
            });
        }

        r.set_position(header.header_size as u64);
        let mut offsets = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            offsets.push(r.read_u32::<LittleEndian>()? as u64);
        }

        let utf8 = flags & UTF8_FLAG != 0;
        let mut strings = Vec::with_capacity(offsets.len());
        for offset in offsets {
            r.set_position(strings_start + offset);
            let s = if utf8 {
                Self::read_utf8(&mut r)?
            } else {
                Self::read_utf16(&mut r)?
            };
            strings.push(s);
        }

        trace!("string pool: {} strings (utf8: {})", strings.len(), utf8);
        Ok(Self { strings })
    }

    fn read_utf8(r: &mut Cursor<&[u8]>) -> Result<String, DecodeError> {
        let _chars = Self::read_utf8_len(r)?;
        let bytes = Self::read_utf8_len(r)?;
        let mut buf = vec![0; bytes];
        std::io::Read::read_exact(r, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn read_utf8_len(r: &mut Cursor<&[u8]>) -> Result<usize, DecodeError> {
        let first = r.read_u8()? as usize;
        if first & 0x80 != 0 {
            let second = r.read_u8()? as usize;
            Ok(((first & 0x7f) << 8) | second)
        } else {
            Ok(first)
        }
    }

    fn read_utf16(r: &mut Cursor<&[u8]>) -> Result<String, DecodeError> {
        let first = r.read_u16::<LittleEndian>()? as usize;
        let len = if first & 0x8000 != 0 {
            let second = r.read_u16::<LittleEndian>()? as usize;
            ((first & 0x7fff) << 16) | second
        } else {
            first
        };
        let remaining = (r.get_ref().len() as u64).saturating_sub(r.position()) / 2;
        if len as u64 > remaining {
            return Err(DecodeError::InvalidChunk {
                offset: r.position(),
                reason: format!("UTF-16 string of {} units overruns pool", len),
            });
        }
        let mut units = Vec::with_capacity(len);
        for _ in 0..len {
            units.push(r.read_u16::<LittleEndian>()?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    fn get(&self, index: u32) -> Result<&str, DecodeError> {
        self.strings
            .get(index as usize)
            .map(|s| s.as_str())
            .ok_or(DecodeError::StringIndex(index))
    }

    /// Resolve an optional string reference (-1 means none)
    fn optional(&self, index: i32) -> Result<Option<String>, DecodeError> {
        if index < 0 {
            return Ok(None);
        }
        let s = self.get(index as u32)?;
        Ok(if s.is_empty() { None } else { Some(s.to_string()) })
    }
}

/// Decode a binary XML document
pub fn decode(bytes: &[u8]) -> Result<AxmlDocument, DecodeError> {
    let mut r = Cursor::new(bytes);
    let header = ChunkHeader::read(&mut r)?;
    if header.ty != RES_XML_TYPE {
        return Err(DecodeError::NotBinaryXml(header.ty));
    }
    // Some packers inflate the declared size; never read past the buffer.
    let end = (header.size as u64).min(bytes.len() as u64);
    let mut pos = header.header_size.max(CHUNK_HEADER_SIZE) as u64;

    let mut strings = StringPool::default();
    let mut resource_ids: Vec<u32> = Vec::new();
    let mut namespaces: IndexMap<String, String> = IndexMap::new();
    let mut stack: Vec<AxmlElement> = Vec::new();
    let mut root: Option<AxmlElement> = None;

    while pos + CHUNK_HEADER_SIZE as u64 <= end {
        r.set_position(pos);
        let chunk = ChunkHeader::read(&mut r)?;
        let chunk_end = pos + chunk.size as u64;
        if chunk.header_size < CHUNK_HEADER_SIZE
            || chunk.size < chunk.header_size as u32
            || chunk_end > end
        {
            return Err(DecodeError::InvalidChunk {
                offset: pos,
                reason: format!(
                    "type 0x{:04x} header {} size {}",
                    chunk.ty, chunk.header_size, chunk.size
                ),
            });
        }
        let body = &bytes[pos as usize..chunk_end as usize];

        match chunk.ty {
            RES_STRING_POOL_TYPE => {
                strings = StringPool::parse(body, &chunk)?;
            }
            RES_XML_RESOURCE_MAP_TYPE => {
                let mut c = Cursor::new(body);
                c.set_position(chunk.header_size as u64);
                let count = (chunk.size - chunk.header_size as u32) / 4;
                resource_ids = (0..count)
                    .map(|_| c.read_u32::<LittleEndian>())
                    .collect::<Result<_, _>>()?;
            }
            RES_XML_START_NAMESPACE_TYPE => {
                let mut c = Cursor::new(body);
                c.set_position(chunk.header_size as u64);
                let prefix = c.read_i32::<LittleEndian>()?;
                let uri = c.read_i32::<LittleEndian>()?;
                if let Some(uri) = strings.optional(uri)? {
                    let prefix = strings.optional(prefix)?.unwrap_or_default();
                    namespaces.entry(uri).or_insert(prefix);
                }
            }
            RES_XML_START_ELEMENT_TYPE => {
                let element = read_start_element(body, &chunk, &strings, &resource_ids)?;
                stack.push(element);
            }
            RES_XML_END_ELEMENT_TYPE => {
                let element = stack.pop().ok_or_else(|| {
                    DecodeError::Unbalanced(format!("end element at offset {} without start", pos))
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => debug!("ignoring extra top-level element <{}>", element.name),
                }
            }
            RES_XML_END_NAMESPACE_TYPE | RES_XML_CDATA_TYPE | RES_NULL_TYPE => {}
            other => {
                debug!("skipping unknown chunk type 0x{:04x} at offset {}", other, pos);
            }
        }

        pos = chunk_end;
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::Unbalanced(format!("element <{}> is never closed", open.name)));
    }

    let root = root.ok_or(DecodeError::Empty)?;
    Ok(AxmlDocument { root, namespaces })
}

fn read_start_element(
    body: &[u8],
    chunk: &ChunkHeader,
    strings: &StringPool,
    resource_ids: &[u32],
) -> Result<AxmlElement, DecodeError> {
    let mut c = Cursor::new(body);
    let ext_start = chunk.header_size as u64;
    c.set_position(ext_start);
    let namespace = c.read_i32::<LittleEndian>()?;
    let name = c.read_i32::<LittleEndian>()?;
    let attribute_start = c.read_u16::<LittleEndian>()? as u64;
    let attribute_size = c.read_u16::<LittleEndian>()? as u64;
    let attribute_count = c.read_u16::<LittleEndian>()?;

    let name = if name < 0 {
        String::new()
    } else {
        strings.get(name as u32)?.to_string()
    };
    let mut element = AxmlElement {
        namespace: strings.optional(namespace)?,
        name,
        ..Default::default()
    };

    for i in 0..attribute_count as u64 {
        c.set_position(ext_start + attribute_start + i * attribute_size);
        let ns = c.read_i32::<LittleEndian>()?;
        let name_index = c.read_i32::<LittleEndian>()?;
        let raw_value = c.read_i32::<LittleEndian>()?;
        let _value_size = c.read_u16::<LittleEndian>()?;
        let _res0 = c.read_u8()?;
        let data_type = c.read_u8()?;
        let data = c.read_u32::<LittleEndian>()?;

        let resource_id = if name_index >= 0 {
            resource_ids.get(name_index as usize).copied()
        } else {
            None
        };
        let mut name = if name_index >= 0 {
            strings.get(name_index as u32)?.to_string()
        } else {
            String::new()
        };
        if name.is_empty() {
            if let Some(known) = resource_id.and_then(framework_attribute_name) {
                name = known.to_string();
            }
        }

        let mut namespace = strings.optional(ns)?;
        if namespace.is_none() && resource_id.map_or(false, |id| id >> 24 == 0x01) {
            namespace = Some(ANDROID_NS.to_string());
        }

        let value = if raw_value >= 0 {
            strings.get(raw_value as u32)?.to_string()
        } else {
            render_typed_value(data_type, data, strings)?
        };

        element.attributes.push(AxmlAttribute { namespace, name, value, resource_id });
    }

    Ok(element)
}

fn framework_attribute_name(id: u32) -> Option<&'static str> {
    ANDROID_ATTRIBUTES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

fn render_typed_value(data_type: u8, data: u32, strings: &StringPool) -> Result<String, DecodeError> {
    let package_prefix = |data: u32| if data >> 24 == 0x01 { "android:" } else { "" };
    Ok(match data_type {
        TYPE_NULL => String::new(),
        TYPE_REFERENCE => format!("@{}{:08X}", package_prefix(data), data),
        TYPE_ATTRIBUTE => format!("?{}{:08X}", package_prefix(data), data),
        TYPE_STRING => strings.get(data)?.to_string(),
        TYPE_FLOAT => f32::from_bits(data).to_string(),
        TYPE_DIMENSION => format!(
            "{}{}",
            complex_to_float(data),
            DIMENSION_UNITS.get((data & 0xf) as usize).copied().unwrap_or("")
        ),
        TYPE_FRACTION => format!(
            "{}{}",
            complex_to_float(data) * 100.0,
            FRACTION_UNITS.get((data & 0xf) as usize).copied().unwrap_or("")
        ),
        TYPE_INT_DEC => (data as i32).to_string(),
        TYPE_INT_HEX => format!("0x{:08x}", data),
        TYPE_INT_BOOLEAN => if data != 0 { "true" } else { "false" }.to_string(),
        TYPE_FIRST_COLOR_INT..=TYPE_LAST_COLOR_INT => format!("#{:08X}", data),
        other => format!("<0x{:X}, type 0x{:02X}>", data, other),
    })
}

fn complex_to_float(data: u32) -> f32 {
    let mantissa = (data & 0xffff_ff00) as i32 as f32;
    mantissa * RADIX_MULTS[((data >> 4) & 0x3) as usize]
}
