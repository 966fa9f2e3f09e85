//! Property list decoding, binary (`bplist00`) and XML.

use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use std::cell::Cell;
use std::collections::BTreeMap;

const BINARY_MAGIC: &[u8] = b"bplist00";
const TRAILER_SIZE: usize = 32;
/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z.
const APPLE_EPOCH_OFFSET: f64 = 978_307_200.0;
const MAX_DEPTH: usize = 512;

fn malformed(msg: impl std::fmt::Display) -> Error {
    Error::MalformedPlist(msg.to_string())
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlistValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Date(DateTime<Utc>),
    Data(Vec<u8>),
    String(String),
    Array(Vec<PlistValue>),
    Dict(BTreeMap<String, PlistValue>),
}

impl PlistValue {
    /// Decodes either serialization, picked by the leading magic.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.starts_with(BINARY_MAGIC) {
            decode_binary(data)
        } else if data.starts_with(b"bplist") {
            Err(malformed(format!(
                "unsupported binary version {:?}",
                String::from_utf8_lossy(&data[6..data.len().min(8)])
            )))
        } else {
            decode_xml(data)
        }
    }

    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.as_dict()?.get(key)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, PlistValue>> {
        match self {
            Self::Dict(dict) => Some(dict),
            _ => None,
        }
    }
}

fn apple_date(seconds: f64) -> Result<DateTime<Utc>> {
    let unix = seconds + APPLE_EPOCH_OFFSET;
    if !unix.is_finite() {
        return Err(malformed(format!("date {seconds} is not finite")));
    }
    let secs = unix.floor();
    let nanos = ((unix - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .ok_or_else(|| malformed(format!("date {seconds} out of range")))
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, b| acc << 8 | *b as u64)
}

struct BinaryPlist<'a> {
    data: &'a [u8],
    offsets: Vec<usize>,
    ref_size: usize,
    /// Objects left to decode. Shared containers are expanded once per
    /// reference, so this bounds the output of a crafted object graph.
    budget: Cell<usize>,
}

fn decode_binary(data: &[u8]) -> Result<PlistValue> {
    if data.len() < BINARY_MAGIC.len() + TRAILER_SIZE {
        return Err(malformed("binary plist shorter than its trailer"));
    }
    let objects_end = data.len() - TRAILER_SIZE;
    let trailer = &data[objects_end..];
    let offset_size = trailer[6] as usize;
    let ref_size = trailer[7] as usize;
    let num_objects = be_uint(&trailer[8..16]);
    let top_object = be_uint(&trailer[16..24]);
    let table_offset = be_uint(&trailer[24..32]);
    if !(1..=8).contains(&offset_size) || !(1..=8).contains(&ref_size) {
        return Err(malformed(format!(
            "offset size {offset_size} / ref size {ref_size}"
        )));
    }
    let table_len = num_objects
        .checked_mul(offset_size as u64)
        .ok_or_else(|| malformed("object count overflows"))?;
    let table_end = table_offset
        .checked_add(table_len)
        .filter(|end| *end <= objects_end as u64)
        .ok_or_else(|| malformed("offset table runs past the trailer"))?;
    let table = &data[table_offset as usize..table_end as usize];
    let offsets = table
        .chunks_exact(offset_size)
        .map(|raw| {
            let offset = be_uint(raw) as usize;
            if offset < BINARY_MAGIC.len() || offset >= objects_end {
                Err(malformed(format!("object offset {offset} outside the object area")))
            } else {
                Ok(offset)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(
        "binary plist: {} objects, top {}, offset size {}, ref size {}",
        offsets.len(),
        top_object,
        offset_size,
        ref_size
    );
    let plist = BinaryPlist {
        data: &data[..objects_end],
        offsets,
        ref_size,
        budget: Cell::new(objects_end.saturating_mul(4)),
    };
    plist.object(top_object, &mut Vec::new())
}

impl BinaryPlist<'_> {
    fn bytes(&self, start: usize, len: usize) -> Result<&[u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| malformed(format!("{len} bytes at {start} run past the object area")))
    }

    /// Reads the count that follows a marker, returning it with the payload start.
    fn length(&self, offset: usize, low: u8) -> Result<(usize, usize)> {
        if low != 0x0f {
            return Ok((low as usize, offset + 1));
        }
        let marker = self.bytes(offset + 1, 1)?[0];
        if marker >> 4 != 0x1 {
            return Err(malformed(format!("length marker 0x{marker:02x} is not an integer")));
        }
        let size = 1usize << (marker & 0x0f);
        if size > 8 {
            return Err(malformed(format!("{size}-byte length")));
        }
        let len = be_uint(self.bytes(offset + 2, size)?);
        let len = usize::try_from(len).map_err(|_| malformed(format!("length {len}")))?;
        Ok((len, offset + 2 + size))
    }

    fn refs(&self, start: usize, count: usize) -> Result<Vec<u64>> {
        let bytes = self.bytes(start, count.saturating_mul(self.ref_size))?;
        Ok(bytes.chunks_exact(self.ref_size).map(be_uint).collect())
    }

    fn object(&self, index: u64, visiting: &mut Vec<u64>) -> Result<PlistValue> {
        let offset = usize::try_from(index)
            .ok()
            .and_then(|i| self.offsets.get(i))
            .copied()
            .ok_or_else(|| {
                malformed(format!(
                    "object index {index} out of range for {} objects",
                    self.offsets.len()
                ))
            })?;
        if visiting.contains(&index) {
            return Err(malformed(format!("object {index} contains itself")));
        }
        if visiting.len() >= MAX_DEPTH {
            return Err(malformed("containers nested too deeply"));
        }
        let budget = self
            .budget
            .get()
            .checked_sub(1)
            .ok_or_else(|| malformed("shared objects expand past the document size"))?;
        self.budget.set(budget);

        let marker = self.data[offset];
        let (high, low) = (marker >> 4, marker & 0x0f);
        Ok(match high {
            0x0 => match low {
                0x0 | 0xf => PlistValue::Null,
                0x8 => PlistValue::Bool(false),
                0x9 => PlistValue::Bool(true),
                _ => return Err(malformed(format!("unknown marker 0x{marker:02x}"))),
            },
            0x1 => PlistValue::Integer(self.integer(offset, low)?),
            0x2 => {
                let size = 1usize << low;
                let bytes = self.bytes(offset + 1, size)?;
                PlistValue::Real(match size {
                    4 => f32::from_bits(be_uint(bytes) as u32) as f64,
                    8 => f64::from_bits(be_uint(bytes)),
                    _ => return Err(malformed(format!("{size}-byte real"))),
                })
            }
            0x3 if low == 0x3 => {
                let bytes = self.bytes(offset + 1, 8)?;
                PlistValue::Date(apple_date(f64::from_bits(be_uint(bytes)))?)
            }
            0x4 => {
                let (len, start) = self.length(offset, low)?;
                PlistValue::Data(self.bytes(start, len)?.to_vec())
            }
            0x5 => {
                let (len, start) = self.length(offset, low)?;
                PlistValue::String(String::from_utf8_lossy(self.bytes(start, len)?).into_owned())
            }
            0x6 => {
                let (len, start) = self.length(offset, low)?;
                let bytes = self.bytes(start, len.saturating_mul(2))?;
                let units = bytes
                    .chunks_exact(2)
                    .map(|unit| u16::from_be_bytes([unit[0], unit[1]]))
                    .collect::<Vec<_>>();
                PlistValue::String(String::from_utf16_lossy(&units))
            }
            // keyed-archiver UIDs surface as plain integers
            0x8 => PlistValue::Integer(be_uint(self.bytes(offset + 1, low as usize + 1)?) as i64),
            0xa | 0xc => {
                let (len, start) = self.length(offset, low)?;
                let refs = self.refs(start, len)?;
                visiting.push(index);
                let items = refs
                    .into_iter()
                    .map(|r| self.object(r, visiting))
                    .collect::<Result<Vec<_>>>()?;
                visiting.pop();
                PlistValue::Array(items)
            }
            0xd => {
                let (len, start) = self.length(offset, low)?;
                let refs = self.refs(start, len.saturating_mul(2))?;
                let (keys, values) = refs.split_at(len);
                visiting.push(index);
                let mut dict = BTreeMap::new();
                for (key, value) in keys.iter().zip(values) {
                    let key = match self.object(*key, visiting)? {
                        PlistValue::String(key) => key,
                        other => return Err(malformed(format!("dict key {other:?}"))),
                    };
                    dict.insert(key, self.object(*value, visiting)?);
                }
                visiting.pop();
                PlistValue::Dict(dict)
            }
            _ => return Err(malformed(format!("unknown marker 0x{marker:02x}"))),
        })
    }

    fn integer(&self, offset: usize, low: u8) -> Result<i64> {
        let size = 1usize << low;
        let bytes = self.bytes(offset + 1, size)?;
        match size {
            // narrower forms are unsigned, the 8-byte form is two's complement
            1 | 2 | 4 | 8 => Ok(be_uint(bytes) as i64),
            16 => {
                let wide = i128::from_be_bytes(
                    bytes
                        .try_into()
                        .map_err(|_| malformed("16-byte integer"))?,
                );
                i64::try_from(wide).map_err(|_| malformed(format!("integer {wide} exceeds 64 bits")))
            }
            _ => Err(malformed(format!("{size}-byte integer"))),
        }
    }
}

fn decode_xml(data: &[u8]) -> Result<PlistValue> {
    let text = std::str::from_utf8(data).map_err(|err| malformed(format!("xml plist: {err}")))?;
    let text = text.trim_start_matches('\u{feff}');
    let doc = Document::parse(text).map_err(|err| malformed(format!("xml plist: {err}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "plist" {
        return Err(malformed(format!(
            "root element is <{}>",
            root.tag_name().name()
        )));
    }
    let top = root
        .children()
        .find(Node::is_element)
        .ok_or_else(|| malformed("empty <plist>"))?;
    xml_value(top, 0)
}

fn xml_text(node: Node<'_, '_>) -> String {
    node.children().filter_map(|child| child.text()).collect()
}

fn xml_value(node: Node<'_, '_>, depth: usize) -> Result<PlistValue> {
    if depth >= MAX_DEPTH {
        return Err(malformed("containers nested too deeply"));
    }
    let name = node.tag_name().name();
    Ok(match name {
        "dict" => {
            let mut dict = BTreeMap::new();
            let mut children = node.children().filter(Node::is_element);
            while let Some(key) = children.next() {
                if key.tag_name().name() != "key" {
                    return Err(malformed(format!(
                        "expected <key> in <dict>, found <{}>",
                        key.tag_name().name()
                    )));
                }
                let value = children
                    .next()
                    .ok_or_else(|| malformed(format!("key {:?} has no value", xml_text(key))))?;
                dict.insert(xml_text(key), xml_value(value, depth + 1)?);
            }
            PlistValue::Dict(dict)
        }
        "array" => PlistValue::Array(
            node.children()
                .filter(Node::is_element)
                .map(|child| xml_value(child, depth + 1))
                .collect::<Result<_>>()?,
        ),
        "string" => PlistValue::String(xml_text(node)),
        "integer" => {
            let text = xml_text(node);
            let text = text.trim();
            let value = match text.strip_prefix("0x") {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => text.parse(),
            };
            PlistValue::Integer(value.map_err(|err| malformed(format!("integer {text:?}: {err}")))?)
        }
        "real" => {
            let text = xml_text(node);
            PlistValue::Real(
                text.trim()
                    .parse()
                    .map_err(|err| malformed(format!("real {text:?}: {err}")))?,
            )
        }
        "true" => PlistValue::Bool(true),
        "false" => PlistValue::Bool(false),
        "date" => {
            let text = xml_text(node);
            let date = DateTime::parse_from_rfc3339(text.trim())
                .map_err(|err| malformed(format!("date {text:?}: {err}")))?;
            PlistValue::Date(date.with_timezone(&Utc))
        }
        "data" => {
            let encoded = xml_text(node)
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect::<String>();
            PlistValue::Data(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|err| malformed(format!("data: {err}")))?,
            )
        }
        other => return Err(malformed(format!("unknown element <{other}>"))),
    })
}
