use super::res::{
    chunks, read_chunk, ChunkType, RawChunk, ResTableRef, ResValue, ResValueType,
    ResXmlAttribute, ResXmlStartElement, StringPool,
};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};

/// Framework attribute ids, used when the attribute name strings were stripped.
pub const ATTR_LABEL: u32 = 0x0101_0001;
pub const ATTR_ICON: u32 = 0x0101_0002;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;

/// Typed value of a binary XML attribute.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttributeValue {
    String(String),
    Integer(u32),
    Boolean(bool),
    Reference(ResTableRef),
    Other { data_type: u8, data: u32 },
}

impl AttributeValue {
    fn decode(attr: &ResXmlAttribute, pool: &StringPool) -> Result<Self> {
        let ResValue {
            data_type, data, ..
        } = attr.typed_value;
        Ok(match ResValueType::from_u8(data_type) {
            Some(ResValueType::String) => Self::String(pool.get(data)?.to_string()),
            Some(ResValueType::IntDec | ResValueType::IntHex) => Self::Integer(data),
            Some(ResValueType::IntBoolean) => Self::Boolean(data != 0),
            Some(ResValueType::Reference | ResValueType::DynamicReference) => {
                Self::Reference(ResTableRef::from(data))
            }
            _ => match pool.get_optional(attr.raw_value)? {
                Some(raw) => Self::String(raw.to_string()),
                None => Self::Other { data_type, data },
            },
        })
    }

    /// The value as text, when it does not need the resource table.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Reference(_) | Self::Other { .. } => None,
        }
    }
}

/// The handful of manifest attributes the extractor cares about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AndroidManifestView {
    pub package: String,
    pub version_name: AttributeValue,
    pub version_code: Option<AttributeValue>,
    /// `android:icon` of `<application>`.
    pub icon: Option<AttributeValue>,
    /// `android:label` of `<application>`.
    pub label: Option<AttributeValue>,
}

#[derive(Default)]
struct ViewBuilder {
    seen_root: bool,
    package: Option<AttributeValue>,
    version_name: Option<AttributeValue>,
    version_code: Option<AttributeValue>,
    icon: Option<AttributeValue>,
    label: Option<AttributeValue>,
}

impl ViewBuilder {
    fn finish(self) -> Result<AndroidManifestView> {
        if !self.seen_root {
            return Err(Error::MalformedManifest("no <manifest> element".into()));
        }
        let package = match self.package {
            Some(AttributeValue::String(package)) => package,
            Some(other) => {
                return Err(Error::MalformedManifest(format!(
                    "package attribute is not a string: {other:?}"
                )))
            }
            None => return Err(missing("package")),
        };
        let version_name = self.version_name.ok_or_else(|| missing("versionName"))?;
        Ok(AndroidManifestView {
            package,
            version_name,
            version_code: self.version_code,
            icon: self.icon,
            label: self.label,
        })
    }
}

fn missing(attr: &str) -> Error {
    Error::MalformedManifest(format!("<manifest> closed without a {attr} attribute"))
}

struct Attribute {
    name: Option<String>,
    resource_id: Option<u32>,
    value: AttributeValue,
}

impl Attribute {
    fn is(&self, name: &str, resource_id: u32) -> bool {
        self.resource_id == Some(resource_id) || self.name.as_deref() == Some(name)
    }
}

fn malformed(msg: impl std::fmt::Display) -> Error {
    Error::MalformedManifest(msg.to_string())
}

/// Decodes the binary `AndroidManifest.xml`.
///
/// Elements are streamed; only the root `<manifest>` and its direct
/// `<application>` child are inspected, and decoding stops when the root closes.
pub fn decode(data: &[u8]) -> Result<AndroidManifestView> {
    let document = read_chunk(data, 0).map_err(malformed)?;
    if document.ty != Some(ChunkType::Xml) {
        return Err(malformed(format!(
            "unrecognized document tag 0x{:04x}",
            document.header.ty
        )));
    }

    let mut pool = None;
    let mut resource_map = Vec::new();
    let mut depth = 0usize;
    let mut view = ViewBuilder::default();

    for chunk in chunks(document.body()) {
        let chunk = chunk.map_err(malformed)?;
        match chunk.ty {
            Some(ChunkType::StringPool) => {
                pool = Some(StringPool::parse(chunk)?);
            }
            Some(ChunkType::XmlResourceMap) => {
                tracing::trace!("xml resource map");
                resource_map = read_resource_map(chunk)?;
            }
            Some(ChunkType::XmlStartElement) => {
                depth += 1;
                let pool = pool
                    .as_ref()
                    .ok_or_else(|| malformed("element before the string pool"))?;
                let (name, attributes) = read_element(chunk, pool, &resource_map)?;
                tracing::trace!("xml start element <{}> at depth {}", name, depth);
                match (depth, name.as_str()) {
                    (1, "manifest") => {
                        view.seen_root = true;
                        for attr in attributes {
                            if attr.name.as_deref() == Some("package") {
                                view.package = Some(attr.value);
                            } else if attr.is("versionName", ATTR_VERSION_NAME) {
                                view.version_name = Some(attr.value);
                            } else if attr.is("versionCode", ATTR_VERSION_CODE) {
                                view.version_code = Some(attr.value);
                            }
                        }
                    }
                    (1, other) => {
                        return Err(malformed(format!(
                            "root element is <{other}>, expected <manifest>"
                        )))
                    }
                    (2, "application") => {
                        for attr in attributes {
                            if attr.is("icon", ATTR_ICON) {
                                view.icon = Some(attr.value);
                            } else if attr.is("label", ATTR_LABEL) {
                                view.label = Some(attr.value);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Some(ChunkType::XmlEndElement) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("end element without a start"))?;
                if depth == 0 {
                    tracing::trace!("root element closed");
                    break;
                }
            }
            Some(
                ChunkType::XmlStartNamespace | ChunkType::XmlEndNamespace | ChunkType::XmlCdata,
            ) => {}
            Some(other) => {
                tracing::trace!("skipping {:?} chunk inside xml", other);
            }
            None => {
                return Err(malformed(format!(
                    "unrecognized chunk 0x{:04x}",
                    chunk.header.ty
                )))
            }
        }
    }
    view.finish()
}

fn read_resource_map(chunk: RawChunk<'_>) -> Result<Vec<u32>> {
    let mut body = chunk.body();
    let mut ids = Vec::with_capacity(body.len() / 4);
    while body.len() >= 4 {
        ids.push(body.read_u32::<LittleEndian>().map_err(malformed)?);
    }
    Ok(ids)
}

fn read_element(
    chunk: RawChunk<'_>,
    pool: &StringPool,
    resource_map: &[u32],
) -> Result<(String, Vec<Attribute>)> {
    let body = chunk.body();
    let element = ResXmlStartElement::read(&mut &body[..])
        .map_err(|err| malformed(format!("start element: {err}")))?;
    let name = pool
        .get_optional(element.name)?
        .ok_or_else(|| malformed("element without a name"))?
        .to_string();

    let stride = element.attribute_size as usize;
    if element.attribute_count > 0 && stride < ResXmlAttribute::SIZE {
        return Err(malformed(format!("attribute size {stride} is too small")));
    }
    let mut attributes = Vec::with_capacity(element.attribute_count as usize);
    for i in 0..element.attribute_count as usize {
        let start = element.attribute_start as usize + i * stride;
        let mut bytes = body
            .get(start..start + ResXmlAttribute::SIZE)
            .ok_or_else(|| malformed(format!("attribute {i} of <{name}> runs past the chunk")))?;
        let attr = ResXmlAttribute::read(&mut bytes).map_err(malformed)?;
        let resource_id = usize::try_from(attr.name)
            .ok()
            .and_then(|index| resource_map.get(index).copied());
        attributes.push(Attribute {
            name: pool.get_optional(attr.name)?.map(str::to_string),
            resource_id,
            value: AttributeValue::decode(&attr, pool)?,
        });
    }
    Ok((name, attributes))
}
