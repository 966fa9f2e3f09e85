//! Records shared by Android's binary XML and resource table formats.
//!
//! Both formats are a tree of chunks, each starting with a [`ResChunkHeader`].
//! The field layouts follow `ResourceTypes.h` from the Android framework.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum ChunkType {
    Null = 0x0000,
    StringPool = 0x0001,
    Table = 0x0002,
    Xml = 0x0003,
    XmlStartNamespace = 0x0100,
    XmlEndNamespace = 0x0101,
    XmlStartElement = 0x0102,
    XmlEndElement = 0x0103,
    XmlCdata = 0x0104,
    XmlResourceMap = 0x0180,
    TablePackage = 0x0200,
    TableType = 0x0201,
    TableTypeSpec = 0x0202,
    TableLibrary = 0x0203,
    TableOverlayable = 0x0204,
    TableOverlayablePolicy = 0x0205,
    TableStagedAlias = 0x0206,
}

impl ChunkType {
    const ALL: [ChunkType; 17] = [
        ChunkType::Null,
        ChunkType::StringPool,
        ChunkType::Table,
        ChunkType::Xml,
        ChunkType::XmlStartNamespace,
        ChunkType::XmlEndNamespace,
        ChunkType::XmlStartElement,
        ChunkType::XmlEndElement,
        ChunkType::XmlCdata,
        ChunkType::XmlResourceMap,
        ChunkType::TablePackage,
        ChunkType::TableType,
        ChunkType::TableTypeSpec,
        ChunkType::TableLibrary,
        ChunkType::TableOverlayable,
        ChunkType::TableOverlayablePolicy,
        ChunkType::TableStagedAlias,
    ];

    pub fn from_u16(ty: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|known| *known as u16 == ty)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResChunkHeader {
    pub ty: u16,
    /// Bytes up to the chunk body, this header included.
    pub header_size: u16,
    /// Header plus body.
    pub size: u32,
}

impl ResChunkHeader {
    pub const SIZE: usize = 8;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let ty = r.read_u16::<LittleEndian>()?;
        let header_size = r.read_u16::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        Ok(Self {
            ty,
            header_size,
            size,
        })
    }
}

/// A chunk located inside a parent buffer, bounds already checked.
#[derive(Clone, Copy, Debug)]
pub struct RawChunk<'a> {
    pub ty: Option<ChunkType>,
    pub header: ResChunkHeader,
    /// The whole chunk, header included.
    pub bytes: &'a [u8],
}

impl<'a> RawChunk<'a> {
    /// Bytes between the common 8-byte header and the end of the chunk header.
    pub fn header_ext(&self) -> &'a [u8] {
        &self.bytes[ResChunkHeader::SIZE..self.header.header_size as usize]
    }

    pub fn body(&self) -> &'a [u8] {
        &self.bytes[self.header.header_size as usize..]
    }
}

/// Reads the chunk starting at `offset`, refusing sizes that leave the buffer.
pub fn read_chunk(data: &[u8], offset: usize) -> std::result::Result<RawChunk<'_>, String> {
    let remaining = data.len().saturating_sub(offset);
    if remaining < ResChunkHeader::SIZE {
        return Err(format!("truncated chunk header at offset {offset}"));
    }
    let header = ResChunkHeader::read(&mut &data[offset..])
        .map_err(|err| format!("chunk header at offset {offset}: {err}"))?;
    let size = header.size as usize;
    let header_size = header.header_size as usize;
    if header_size < ResChunkHeader::SIZE || header_size > size {
        return Err(format!(
            "chunk 0x{:04x} at offset {offset} has header size {header_size} and size {size}",
            header.ty
        ));
    }
    if size > remaining {
        return Err(format!(
            "chunk 0x{:04x} at offset {offset} claims {size} bytes, {remaining} remain",
            header.ty
        ));
    }
    Ok(RawChunk {
        ty: ChunkType::from_u16(header.ty),
        header,
        bytes: &data[offset..offset + size],
    })
}

/// Iterates the sibling chunks packed into `data`.
pub fn chunks(data: &[u8]) -> Chunks<'_> {
    Chunks { data, offset: 0 }
}

#[derive(Debug)]
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = std::result::Result<RawChunk<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let chunk = read_chunk(self.data, self.offset);
        match &chunk {
            Ok(chunk) => self.offset += chunk.bytes.len(),
            Err(_) => self.offset = self.data.len(),
        }
        Some(chunk)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResStringPoolHeader {
    pub string_count: u32,
    pub style_count: u32,
    pub flags: u32,
    pub strings_start: u32,
    pub styles_start: u32,
}

impl ResStringPoolHeader {
    pub const UTF8_FLAG: u32 = 1 << 8;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let string_count = r.read_u32::<LittleEndian>()?;
        let style_count = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let strings_start = r.read_u32::<LittleEndian>()?;
        let styles_start = r.read_u32::<LittleEndian>()?;
        Ok(Self {
            string_count,
            style_count,
            flags,
            strings_start,
            styles_start,
        })
    }

    pub fn is_utf8(&self) -> bool {
        self.flags & Self::UTF8_FLAG > 0
    }
}

/// Decoded string table of a binary XML document or resource table.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    pub fn parse(chunk: RawChunk<'_>) -> Result<Self> {
        let malformed = |msg: String| Error::MalformedStringPool(msg);
        let header = ResStringPoolHeader::read(&mut chunk.header_ext())
            .map_err(|err| malformed(format!("header: {err}")))?;
        let bytes = chunk.bytes;
        let offsets_start = chunk.header.header_size as usize;
        let count = header.string_count as usize;
        let offsets_end = count
            .checked_mul(4)
            .and_then(|len| len.checked_add(offsets_start))
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| malformed(format!("{count} string offsets overrun the chunk")))?;
        let strings_start = header.strings_start as usize;
        if count > 0 && strings_start > bytes.len() {
            return Err(malformed(format!(
                "string data starts at {strings_start}, past the chunk end"
            )));
        }

        let mut offsets = &bytes[offsets_start..offsets_end];
        let mut strings = Vec::with_capacity(count);
        for index in 0..count {
            let offset = offsets
                .read_u32::<LittleEndian>()
                .map_err(|err| malformed(err.to_string()))?;
            let start = strings_start + offset as usize;
            let data = bytes.get(start..).ok_or_else(|| {
                malformed(format!("string {index} starts past the chunk end"))
            })?;
            let s = if header.is_utf8() {
                decode_utf8(data)
            } else {
                decode_utf16(data)
            }
            .map_err(|msg| malformed(format!("string {index}: {msg}")))?;
            strings.push(s);
        }
        tracing::trace!(
            "string pool: {} strings, utf8 = {}",
            strings.len(),
            header.is_utf8()
        );
        Ok(Self { strings })
    }

    pub fn get(&self, index: u32) -> Result<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::MalformedStringPool(format!(
                    "index {index} out of range for {} strings",
                    self.strings.len()
                ))
            })
    }

    /// Like [`StringPool::get`] but for the `-1`-means-none convention.
    pub fn get_optional(&self, index: i32) -> Result<Option<&str>> {
        if index < 0 {
            return Ok(None);
        }
        self.get(index as u32).map(Some)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn decode_utf8(data: &[u8]) -> std::result::Result<String, String> {
    let mut r = Cursor::new(data);
    // character count, then byte count; each takes two bytes when the high bit is set
    let _chars = read_utf8_len(&mut r)?;
    let len = read_utf8_len(&mut r)?;
    let start = r.position() as usize;
    let bytes = data
        .get(start..start + len)
        .ok_or_else(|| format!("{len} bytes run past the chunk end"))?;
    // aapt writes modified UTF-8 for supplementary characters
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_utf8_len(r: &mut Cursor<&[u8]>) -> std::result::Result<usize, String> {
    let first = r.read_u8().map_err(|_| "truncated length".to_string())? as usize;
    if first & 0x80 == 0 {
        return Ok(first);
    }
    let second = r.read_u8().map_err(|_| "truncated length".to_string())? as usize;
    Ok((first & 0x7f) << 8 | second)
}

fn decode_utf16(data: &[u8]) -> std::result::Result<String, String> {
    let mut r = Cursor::new(data);
    let truncated = |_| "truncated string".to_string();
    let first = r.read_u16::<LittleEndian>().map_err(truncated)? as usize;
    let len = if first & 0x8000 != 0 {
        let second = r.read_u16::<LittleEndian>().map_err(truncated)? as usize;
        (first & 0x7fff) << 16 | second
    } else {
        first
    };
    let remaining = data.len() - r.position() as usize;
    if len.saturating_mul(2) > remaining {
        return Err(format!("{len} code units run past the chunk end"));
    }
    let mut units = Vec::with_capacity(len);
    for _ in 0..len {
        units.push(r.read_u16::<LittleEndian>().map_err(truncated)?);
    }
    Ok(String::from_utf16_lossy(&units))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResXmlStartElement {
    /// String of the full namespace of this element.
    pub namespace: i32,
    /// String name of this node.
    pub name: i32,
    /// Byte offset from the start of this structure to where
    /// the attributes start.
    pub attribute_start: u16,
    /// Size of the attribute structures that follow.
    pub attribute_size: u16,
    /// Number of attributes associated with the element.
    pub attribute_count: u16,
    /// Index (1-based) of the "id" attribute. 0 if none.
    pub id_index: u16,
    /// Index (1-based) of the "class" attribute. 0 if none.
    pub class_index: u16,
    /// Index (1-based) of the "style" attribute. 0 if none.
    pub style_index: u16,
}

impl ResXmlStartElement {
    pub const SIZE: usize = 20;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let namespace = r.read_i32::<LittleEndian>()?;
        let name = r.read_i32::<LittleEndian>()?;
        let attribute_start = r.read_u16::<LittleEndian>()?;
        let attribute_size = r.read_u16::<LittleEndian>()?;
        let attribute_count = r.read_u16::<LittleEndian>()?;
        let id_index = r.read_u16::<LittleEndian>()?;
        let class_index = r.read_u16::<LittleEndian>()?;
        let style_index = r.read_u16::<LittleEndian>()?;
        Ok(Self {
            namespace,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
            id_index,
            class_index,
            style_index,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResXmlAttribute {
    pub namespace: i32,
    pub name: i32,
    pub raw_value: i32,
    pub typed_value: ResValue,
}

impl ResXmlAttribute {
    pub const SIZE: usize = 20;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let namespace = r.read_i32::<LittleEndian>()?;
        let name = r.read_i32::<LittleEndian>()?;
        let raw_value = r.read_i32::<LittleEndian>()?;
        let typed_value = ResValue::read(r)?;
        Ok(Self {
            namespace,
            name,
            raw_value,
            typed_value,
        })
    }
}

/// Resource identifier laid out as `0xPPTTEEEE`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ResTableRef(u32);

impl ResTableRef {
    pub fn new(package: u8, ty: u8, entry: u16) -> Self {
        let package = (package as u32) << 24;
        let ty = (ty as u32) << 16;
        let entry = entry as u32;
        Self(package | ty | entry)
    }

    pub fn package(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn ty(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn entry(self) -> u16 {
        self.0 as u16
    }
}

impl From<u32> for ResTableRef {
    fn from(r: u32) -> Self {
        Self(r)
    }
}

impl From<ResTableRef> for u32 {
    fn from(r: ResTableRef) -> u32 {
        r.0
    }
}

impl std::fmt::Display for ResTableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Leading fields of a package chunk header. The type and key string
/// offsets that follow are not needed since the pools are found by walking
/// the child chunks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResTablePackageHeader {
    pub id: u32,
    pub name: String,
}

impl ResTablePackageHeader {
    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let id = r.read_u32::<LittleEndian>()?;
        let mut name = Vec::with_capacity(128);
        let mut terminated = false;
        for _ in 0..128 {
            let c = r.read_u16::<LittleEndian>()?;
            if c == 0 {
                terminated = true;
            }
            if !terminated {
                name.push(c);
            }
        }
        Ok(Self {
            id,
            name: String::from_utf16_lossy(&name),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResTableTypeHeader {
    /// The type identifier this chunk is holding. Type IDs start
    /// at 1 (corresponding to the value of the type bits in a
    /// resource identifier). 0 is invalid.
    pub id: u8,
    pub flags: u8,
    /// Must be 0.
    pub reserved: u16,
    /// Number of entry indices that follow.
    pub entry_count: u32,
    /// Offset from header where ResTableEntry data starts.
    pub entries_start: u32,
    /// Configuration this collection of entries is designed for.
    pub config: ResTableConfig,
}

impl ResTableTypeHeader {
    /// Entry indices are `(u16 entry id, u16 offset / 4)` pairs.
    pub const FLAG_SPARSE: u8 = 0x01;
    /// Entry offsets are `u16` words, `0xffff` meaning no entry.
    pub const FLAG_OFFSET16: u8 = 0x02;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let id = r.read_u8()?;
        let flags = r.read_u8()?;
        let reserved = r.read_u16::<LittleEndian>()?;
        let entry_count = r.read_u32::<LittleEndian>()?;
        let entries_start = r.read_u32::<LittleEndian>()?;
        let config = ResTableConfig::read(r)?;
        Ok(Self {
            id,
            flags,
            reserved,
            entry_count,
            entries_start,
            config,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResTableConfig {
    pub size: u32,
    pub imsi: u32,
    /// Language and country codes, zero for the default locale.
    pub locale: u32,
    pub screen_type: ScreenType,
}

impl ResTableConfig {
    const MIN_SIZE: u32 = 16;
    const MAX_SIZE: u32 = 1024;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let size = r.read_u32::<LittleEndian>()?;
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("config size {size}"),
            ));
        }
        let mut rest = vec![0; size as usize - 4];
        r.read_exact(&mut rest)?;
        let mut rest = rest.as_slice();
        let imsi = rest.read_u32::<LittleEndian>()?;
        let locale = rest.read_u32::<LittleEndian>()?;
        let screen_type = ScreenType::read(&mut rest)?;
        Ok(Self {
            size,
            imsi,
            locale,
            screen_type,
        })
    }

    pub fn density(&self) -> u16 {
        self.screen_type.density
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScreenType {
    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,
}

impl ScreenType {
    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let orientation = r.read_u8()?;
        let touchscreen = r.read_u8()?;
        let density = r.read_u16::<LittleEndian>()?;
        Ok(Self {
            orientation,
            touchscreen,
            density,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResTableEntry {
    pub size: u16,
    pub flags: u16,
    pub key: u32,
    pub value: ResTableValue,
}

impl ResTableEntry {
    pub const FLAG_COMPLEX: u16 = 0x0001;
    pub const FLAG_COMPACT: u16 = 0x0008;

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let size = r.read_u16::<LittleEndian>()?;
        let flags = r.read_u16::<LittleEndian>()?;
        if flags & Self::FLAG_COMPACT > 0 {
            // compact entries store the key in place of the size and the
            // value type in the high byte of the flags
            let data = r.read_u32::<LittleEndian>()?;
            return Ok(Self {
                size: 8,
                flags,
                key: size as u32,
                value: ResTableValue::Simple(ResValue {
                    size: 8,
                    res0: 0,
                    data_type: (flags >> 8) as u8,
                    data,
                }),
            });
        }
        let key = r.read_u32::<LittleEndian>()?;
        let value = if flags & Self::FLAG_COMPLEX > 0 {
            ResTableValue::Complex(ResTableMapEntry::read(r)?)
        } else {
            ResTableValue::Simple(ResValue::read(r)?)
        };
        Ok(Self {
            size,
            flags,
            key,
            value,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResTableValue {
    Simple(ResValue),
    /// Bag resources (styles, plurals, ...). Their map items are not decoded.
    Complex(ResTableMapEntry),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResTableMapEntry {
    pub parent: u32,
    pub count: u32,
}

impl ResTableMapEntry {
    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let parent = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()?;
        Ok(Self { parent, count })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResValue {
    pub size: u16,
    pub res0: u8,
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let size = r.read_u16::<LittleEndian>()?;
        let res0 = r.read_u8()?;
        let data_type = r.read_u8()?;
        let data = r.read_u32::<LittleEndian>()?;
        Ok(Self {
            size,
            res0,
            data_type,
            data,
        })
    }

    pub fn ty(&self) -> Option<ResValueType> {
        ResValueType::from_u8(self.data_type)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ResValueType {
    Null = 0x00,
    Reference = 0x01,
    Attribute = 0x02,
    String = 0x03,
    Float = 0x04,
    Dimension = 0x05,
    Fraction = 0x06,
    DynamicReference = 0x07,
    IntDec = 0x10,
    IntHex = 0x11,
    IntBoolean = 0x12,
    IntColorArgb8 = 0x1c,
    IntColorRgb8 = 0x1d,
    IntColorArgb4 = 0x1e,
    IntColorRgb4 = 0x1f,
}

impl ResValueType {
    pub fn from_u8(ty: u8) -> Option<Self> {
        Some(match ty {
            x if x == Self::Null as u8 => Self::Null,
            x if x == Self::Reference as u8 => Self::Reference,
            x if x == Self::Attribute as u8 => Self::Attribute,
            x if x == Self::String as u8 => Self::String,
            x if x == Self::Float as u8 => Self::Float,
            x if x == Self::Dimension as u8 => Self::Dimension,
            x if x == Self::Fraction as u8 => Self::Fraction,
            x if x == Self::DynamicReference as u8 => Self::DynamicReference,
            x if x == Self::IntDec as u8 => Self::IntDec,
            x if x == Self::IntHex as u8 => Self::IntHex,
            x if x == Self::IntBoolean as u8 => Self::IntBoolean,
            x if x == Self::IntColorArgb8 as u8 => Self::IntColorArgb8,
            x if x == Self::IntColorRgb8 as u8 => Self::IntColorRgb8,
            x if x == Self::IntColorArgb4 as u8 => Self::IntColorArgb4,
            x if x == Self::IntColorRgb4 as u8 => Self::IntColorRgb4,
            _ => return None,
        })
    }
}
