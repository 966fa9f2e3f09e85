//! Builders for the binary fixtures the decoders are tested against.

use crate::android::res::{ChunkType, ResStringPoolHeader};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// Writes one chunk, patching its header once the content is known.
pub struct ChunkWriter {
    ty: ChunkType,
    buf: Vec<u8>,
    header_size: Option<usize>,
}

impl ChunkWriter {
    pub fn start(ty: ChunkType) -> Self {
        Self {
            ty,
            buf: vec![0; 8],
            header_size: None,
        }
    }

    pub fn end_header(&mut self) {
        self.header_size = Some(self.buf.len());
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.write_u16::<LittleEndian>(v).unwrap();
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.write_u32::<LittleEndian>(v).unwrap();
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.write_i32::<LittleEndian>(v).unwrap();
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn finish(mut self) -> Vec<u8> {
        let header_size = self.header_size.unwrap_or(self.buf.len());
        let size = self.buf.len();
        self.buf[0..2].copy_from_slice(&(self.ty as u16).to_le_bytes());
        self.buf[2..4].copy_from_slice(&(header_size as u16).to_le_bytes());
        self.buf[4..8].copy_from_slice(&(size as u32).to_le_bytes());
        self.buf
    }
}

fn push_utf8_len(data: &mut Vec<u8>, len: usize) {
    if len > 0x7f {
        data.push(((len >> 8) as u8 & 0x7f) | 0x80);
        data.push(len as u8);
    } else {
        data.push(len as u8);
    }
}

pub fn string_pool_chunk(strings: &[&str], utf8: bool) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(data.len() as u32);
        if utf8 {
            push_utf8_len(&mut data, s.chars().count());
            push_utf8_len(&mut data, s.len());
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        } else {
            let units = s.encode_utf16().collect::<Vec<_>>();
            if units.len() > 0x7fff {
                data.write_u16::<LittleEndian>((units.len() >> 16) as u16 | 0x8000)
                    .unwrap();
            }
            data.write_u16::<LittleEndian>(units.len() as u16).unwrap();
            for unit in units {
                data.write_u16::<LittleEndian>(unit).unwrap();
            }
            data.write_u16::<LittleEndian>(0).unwrap();
        }
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let mut w = ChunkWriter::start(ChunkType::StringPool);
    w.u32(strings.len() as u32);
    w.u32(0);
    w.u32(if utf8 { ResStringPoolHeader::UTF8_FLAG } else { 0 });
    w.u32(28 + 4 * strings.len() as u32);
    w.u32(0);
    w.end_header();
    for offset in offsets {
        w.u32(offset);
    }
    w.bytes(&data);
    w.finish()
}

#[derive(Default)]
struct Interner {
    strings: Vec<String>,
}

impl Interner {
    fn index(&mut self, s: &str) -> u32 {
        match self.strings.iter().position(|known| known == s) {
            Some(i) => i as u32,
            None => {
                self.strings.push(s.to_string());
                self.strings.len() as u32 - 1
            }
        }
    }

    fn chunk(&self, utf8: bool) -> Vec<u8> {
        let strings = self.strings.iter().map(String::as_str).collect::<Vec<_>>();
        string_pool_chunk(&strings, utf8)
    }
}

#[derive(Clone, Debug)]
pub enum XmlValue {
    Str(String),
    Int(u32),
    Bool(bool),
    Ref(u32),
}

impl XmlValue {
    pub fn string(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct XmlAttr {
    name: String,
    resource_id: Option<u32>,
    value: XmlValue,
}

impl XmlAttr {
    pub fn android(name: &str, resource_id: u32, value: XmlValue) -> Self {
        Self {
            name: name.to_string(),
            resource_id: Some(resource_id),
            value,
        }
    }

    pub fn plain(name: &str, value: XmlValue) -> Self {
        Self {
            name: name.to_string(),
            resource_id: None,
            value,
        }
    }
}

#[derive(Clone, Debug)]
pub enum XmlNode {
    Start { name: String, attrs: Vec<XmlAttr> },
    End { name: String },
}

impl XmlNode {
    pub fn start(name: &str, attrs: Vec<XmlAttr>) -> Self {
        Self::Start {
            name: name.to_string(),
            attrs,
        }
    }

    pub fn end(name: &str) -> Self {
        Self::End {
            name: name.to_string(),
        }
    }
}

fn node_header(w: &mut ChunkWriter) {
    w.u32(1);
    w.i32(-1);
    w.end_header();
}

/// Encodes `nodes` as a binary XML document with the android namespace declared.
pub fn binary_xml(nodes: &[XmlNode]) -> Vec<u8> {
    let mut pool = Interner::default();
    let mut resource_map = Vec::new();
    // names carrying a resource id come first so the map lines up with the pool
    for node in nodes {
        if let XmlNode::Start { attrs, .. } = node {
            for attr in attrs {
                if let Some(id) = attr.resource_id {
                    if pool.strings.iter().all(|known| *known != attr.name) {
                        pool.index(&attr.name);
                        resource_map.push(id);
                    }
                }
            }
        }
    }
    let prefix = pool.index("android") as i32;
    let uri = pool.index(ANDROID_NS) as i32;

    let mut body = Vec::new();
    let mut w = ChunkWriter::start(ChunkType::XmlStartNamespace);
    node_header(&mut w);
    w.i32(prefix);
    w.i32(uri);
    body.extend(w.finish());

    for node in nodes {
        match node {
            XmlNode::Start { name, attrs } => {
                let mut w = ChunkWriter::start(ChunkType::XmlStartElement);
                node_header(&mut w);
                w.i32(-1);
                w.i32(pool.index(name) as i32);
                w.u16(20);
                w.u16(20);
                w.u16(attrs.len() as u16);
                w.u16(0);
                w.u16(0);
                w.u16(0);
                for attr in attrs {
                    w.i32(if attr.resource_id.is_some() { uri } else { -1 });
                    w.i32(pool.index(&attr.name) as i32);
                    let (raw, data_type, data) = match &attr.value {
                        XmlValue::Str(s) => {
                            let index = pool.index(s);
                            (index as i32, 0x03, index)
                        }
                        XmlValue::Int(i) => (-1, 0x10, *i),
                        XmlValue::Bool(b) => (-1, 0x12, if *b { u32::MAX } else { 0 }),
                        XmlValue::Ref(r) => (-1, 0x01, *r),
                    };
                    w.i32(raw);
                    w.u16(8);
                    w.u8(0);
                    w.u8(data_type);
                    w.u32(data);
                }
                body.extend(w.finish());
            }
            XmlNode::End { name } => {
                let mut w = ChunkWriter::start(ChunkType::XmlEndElement);
                node_header(&mut w);
                w.i32(-1);
                w.i32(pool.index(name) as i32);
                body.extend(w.finish());
            }
        }
    }

    let mut w = ChunkWriter::start(ChunkType::XmlEndNamespace);
    node_header(&mut w);
    w.i32(prefix);
    w.i32(uri);
    body.extend(w.finish());

    let mut map = ChunkWriter::start(ChunkType::XmlResourceMap);
    map.end_header();
    for id in resource_map {
        map.u32(id);
    }

    let mut doc = ChunkWriter::start(ChunkType::Xml);
    doc.end_header();
    doc.bytes(&pool.chunk(false));
    doc.bytes(&map.finish());
    doc.bytes(&body);
    doc.finish()
}

#[derive(Clone, Debug)]
pub enum TableValueSpec {
    Str(String),
    Ref(u32),
    Int(u32),
}

#[derive(Clone, Debug)]
pub struct TableEntry {
    type_name: &'static str,
    entry: u16,
    density: u16,
    locale: u32,
    value: TableValueSpec,
}

impl TableEntry {
    pub fn new(type_name: &'static str, entry: u16, density: u16, value: TableValueSpec) -> Self {
        Self {
            type_name,
            entry,
            density,
            locale: 0,
            value,
        }
    }

    pub fn locale(mut self, locale: u32) -> Self {
        self.locale = locale;
        self
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TableLayout {
    Dense,
    Sparse,
    Offset16,
}

/// Encodes a single-package resource table. Type ids follow the order in
/// which type names first appear in `entries`, starting at 1.
pub fn resource_table(package_id: u8, entries: &[TableEntry], layout: TableLayout) -> Vec<u8> {
    let mut values = Interner::default();
    let mut type_names = Vec::new();
    for e in entries {
        if !type_names.contains(&e.type_name) {
            type_names.push(e.type_name);
        }
    }
    let max_entry = entries.iter().map(|e| e.entry).max().unwrap_or(0);
    let keys = (0..=max_entry)
        .map(|i| format!("entry{i}"))
        .collect::<Vec<_>>();
    let keys = keys.iter().map(String::as_str).collect::<Vec<_>>();

    let type_pool = string_pool_chunk(&type_names, true);
    let key_pool = string_pool_chunk(&keys, true);
    let mut types = Vec::new();
    for (type_index, type_name) in type_names.iter().enumerate() {
        let type_id = type_index as u8 + 1;
        let of_type = entries
            .iter()
            .filter(|e| e.type_name == *type_name)
            .collect::<Vec<_>>();
        let entry_count = of_type.iter().map(|e| e.entry).max().unwrap_or(0) as usize + 1;

        let mut spec = ChunkWriter::start(ChunkType::TableTypeSpec);
        spec.u8(type_id);
        spec.u8(0);
        spec.u16(0);
        spec.u32(entry_count as u32);
        spec.end_header();
        for _ in 0..entry_count {
            spec.u32(0);
        }
        types.extend(spec.finish());

        let mut configs = Vec::new();
        for e in &of_type {
            if !configs.contains(&(e.density, e.locale)) {
                configs.push((e.density, e.locale));
            }
        }
        for (density, locale) in configs {
            let mut in_config = of_type
                .iter()
                .filter(|e| e.density == density && e.locale == locale)
                .copied()
                .collect::<Vec<_>>();
            in_config.sort_by_key(|e| e.entry);
            types.extend(type_chunk(
                type_id,
                (density, locale),
                entry_count,
                &in_config,
                layout,
                &mut values,
            ));
        }
    }

    let mut package = ChunkWriter::start(ChunkType::TablePackage);
    package.u32(package_id as u32);
    let mut name = "com.example".encode_utf16().collect::<Vec<_>>();
    name.resize(128, 0);
    for unit in name {
        package.u16(unit);
    }
    package.u32(288);
    package.u32(type_names.len() as u32);
    package.u32(288 + type_pool.len() as u32);
    package.u32(keys.len() as u32);
    package.u32(0);
    package.end_header();
    package.bytes(&type_pool);
    package.bytes(&key_pool);
    package.bytes(&types);

    let mut table = ChunkWriter::start(ChunkType::Table);
    table.u32(1);
    table.end_header();
    table.bytes(&values.chunk(true));
    table.bytes(&package.finish());
    table.finish()
}

fn type_chunk(
    type_id: u8,
    (density, locale): (u16, u32),
    entry_count: usize,
    entries: &[&TableEntry],
    layout: TableLayout,
    values: &mut Interner,
) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for e in entries {
        offsets.push((e.entry, data.len() as u32));
        let (data_type, value) = match &e.value {
            TableValueSpec::Str(s) => (0x03, values.index(s)),
            TableValueSpec::Ref(r) => (0x01, *r),
            TableValueSpec::Int(i) => (0x10, *i),
        };
        data.write_u16::<LittleEndian>(8).unwrap();
        data.write_u16::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(e.entry as u32).unwrap();
        data.write_u16::<LittleEndian>(8).unwrap();
        data.push(0);
        data.push(data_type);
        data.write_u32::<LittleEndian>(value).unwrap();
    }
    let offset_of = |i: usize| {
        offsets
            .iter()
            .find(|(entry, _)| *entry as usize == i)
            .map(|(_, offset)| *offset)
    };

    let mut index = Vec::new();
    let (flags, count) = match layout {
        TableLayout::Dense => {
            for i in 0..entry_count {
                index
                    .write_u32::<LittleEndian>(offset_of(i).unwrap_or(u32::MAX))
                    .unwrap();
            }
            (0, entry_count)
        }
        TableLayout::Offset16 => {
            for i in 0..entry_count {
                let offset = offset_of(i).map_or(u16::MAX, |offset| (offset / 4) as u16);
                index.write_u16::<LittleEndian>(offset).unwrap();
            }
            while index.len() % 4 != 0 {
                index.push(0);
            }
            (0x02, entry_count)
        }
        TableLayout::Sparse => {
            for (entry, offset) in &offsets {
                index.write_u16::<LittleEndian>(*entry).unwrap();
                index.write_u16::<LittleEndian>((offset / 4) as u16).unwrap();
            }
            (0x01, offsets.len())
        }
    };

    let mut w = ChunkWriter::start(ChunkType::TableType);
    w.u8(type_id);
    w.u8(flags);
    w.u16(0);
    w.u32(count as u32);
    w.u32(84 + index.len() as u32);
    w.u32(64);
    w.u32(0);
    w.u32(locale);
    w.u8(0);
    w.u8(0);
    w.u16(density);
    w.bytes(&[0; 48]);
    w.end_header();
    w.bytes(&index);
    w.bytes(&data);
    w.finish()
}

/// Stores `entries` deflated, in the given order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn png_chunk(out: &mut Vec<u8>, ty: &[u8; 4], data: &[u8]) {
    out.write_u32::<BigEndian>(data.len() as u32).unwrap();
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    let mut crc = crc32fast::Hasher::new();
    crc.update(ty);
    crc.update(data);
    out.write_u32::<BigEndian>(crc.finalize()).unwrap();
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Builds an Xcode-style CgBI PNG from straight RGBA pixels: channels are
/// stored as BGRA, the stream is raw deflate, and row `y` uses filter `y % 5`
/// so every filter type is exercised. `idat_parts` splits the stream.
pub fn cgbi_png(width: u32, height: u32, rgba: &[u8], idat_parts: usize) -> Vec<u8> {
    let stride = width as usize * 4;
    let bgra = rgba
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect::<Vec<_>>();
    let mut filtered = Vec::with_capacity((stride + 1) * height as usize);
    for y in 0..height as usize {
        let row = &bgra[y * stride..(y + 1) * stride];
        let prior = (y > 0).then(|| &bgra[(y - 1) * stride..y * stride]);
        let filter = (y % 5) as u8;
        filtered.push(filter);
        for x in 0..stride {
            let a = if x >= 4 { row[x - 4] } else { 0 };
            let b = prior.map_or(0, |p| p[x]);
            let c = if x >= 4 { prior.map_or(0, |p| p[x - 4]) } else { 0 };
            let predicted = match filter {
                0 => 0,
                1 => a,
                2 => b,
                3 => ((a as u16 + b as u16) / 2) as u8,
                _ => paeth(a, b, c),
            };
            filtered.push(row[x].wrapping_sub(predicted));
        }
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&filtered).unwrap();
    let stream = encoder.finish().unwrap();

    let mut ihdr = Vec::new();
    ihdr.write_u32::<BigEndian>(width).unwrap();
    ihdr.write_u32::<BigEndian>(height).unwrap();
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

    let mut out = crate::ios::png::SIGNATURE.to_vec();
    png_chunk(&mut out, b"CgBI", &[0x50, 0x00, 0x20, 0x06]);
    png_chunk(&mut out, b"IHDR", &ihdr);
    let part = stream.len().div_ceil(idat_parts.max(1)).max(1);
    for piece in stream.chunks(part) {
        png_chunk(&mut out, b"IDAT", piece);
    }
    png_chunk(&mut out, b"IEND", &[]);
    out
}

/// A small deterministic RGBA gradient.
pub fn test_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x * 37 % 256) as u8,
                (y * 53 % 256) as u8,
                ((x + y) * 11 % 256) as u8,
                (255 - (x * y) % 200) as u8,
            ]);
        }
    }
    pixels
}

pub fn standard_png(image: &image::RgbaImage) -> Vec<u8> {
    use image::ImageEncoder;
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .unwrap();
    out
}

/// Plist values as written by [`binary_plist`].
#[derive(Clone, Debug)]
pub enum Plist {
    Str(String),
    Int(i64),
    Bool(bool),
    Real(f64),
    Date(f64),
    Data(Vec<u8>),
    Array(Vec<Plist>),
    Dict(Vec<(String, Plist)>),
}

impl Plist {
    pub fn string(s: &str) -> Self {
        Self::Str(s.to_string())
    }

    pub fn dict(entries: &[(&str, Plist)]) -> Self {
        Self::Dict(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }
}

enum Flat<'a> {
    Value(&'a Plist),
    Key(&'a str),
    Array(Vec<usize>),
    Dict(Vec<usize>, Vec<usize>),
}

fn flatten<'a>(value: &'a Plist, out: &mut Vec<Flat<'a>>) -> usize {
    let id = out.len();
    out.push(Flat::Value(value));
    match value {
        Plist::Array(items) => {
            let mut ids = Vec::new();
            for item in items {
                ids.push(flatten(item, out));
            }
            out[id] = Flat::Array(ids);
        }
        Plist::Dict(entries) => {
            let mut keys = Vec::new();
            for (key, _) in entries {
                keys.push(out.len());
                out.push(Flat::Key(key));
            }
            let mut values = Vec::new();
            for (_, value) in entries {
                values.push(flatten(value, out));
            }
            out[id] = Flat::Dict(keys, values);
        }
        _ => {}
    }
    id
}

fn bplist_marker(out: &mut Vec<u8>, kind: u8, len: usize) {
    if len < 15 {
        out.push(kind << 4 | len as u8);
    } else if len < 256 {
        out.extend_from_slice(&[kind << 4 | 0x0f, 0x10, len as u8]);
    } else {
        out.extend_from_slice(&[kind << 4 | 0x0f, 0x11]);
        out.write_u16::<BigEndian>(len as u16).unwrap();
    }
}

fn bplist_string(out: &mut Vec<u8>, s: &str) {
    if s.is_ascii() {
        bplist_marker(out, 0x5, s.len());
        out.extend_from_slice(s.as_bytes());
    } else {
        let units = s.encode_utf16().collect::<Vec<_>>();
        bplist_marker(out, 0x6, units.len());
        for unit in units {
            out.write_u16::<BigEndian>(unit).unwrap();
        }
    }
}

fn write_sized(out: &mut Vec<u8>, value: usize, size: u8) {
    out.write_uint::<BigEndian>(value as u64, size as usize).unwrap();
}

pub fn binary_plist(root: &Plist) -> Vec<u8> {
    let mut objects = Vec::new();
    flatten(root, &mut objects);
    let ref_size: u8 = if objects.len() < 256 { 1 } else { 2 };

    let mut out = b"bplist00".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for object in &objects {
        offsets.push(out.len());
        match object {
            Flat::Key(key) => bplist_string(&mut out, key),
            Flat::Array(ids) => {
                bplist_marker(&mut out, 0xa, ids.len());
                for id in ids {
                    write_sized(&mut out, *id, ref_size);
                }
            }
            Flat::Dict(keys, values) => {
                bplist_marker(&mut out, 0xd, keys.len());
                for id in keys.iter().chain(values) {
                    write_sized(&mut out, *id, ref_size);
                }
            }
            Flat::Value(value) => match value {
                Plist::Str(s) => bplist_string(&mut out, s),
                Plist::Bool(b) => out.push(if *b { 0x09 } else { 0x08 }),
                Plist::Int(i) if (0..256).contains(i) => out.extend_from_slice(&[0x10, *i as u8]),
                Plist::Int(i) => {
                    out.push(0x13);
                    out.write_i64::<BigEndian>(*i).unwrap();
                }
                Plist::Real(r) => {
                    out.push(0x23);
                    out.write_f64::<BigEndian>(*r).unwrap();
                }
                Plist::Date(d) => {
                    out.push(0x33);
                    out.write_f64::<BigEndian>(*d).unwrap();
                }
                Plist::Data(data) => {
                    bplist_marker(&mut out, 0x4, data.len());
                    out.extend_from_slice(data);
                }
                Plist::Array(_) | Plist::Dict(_) => unreachable!("flattened above"),
            },
        }
    }

    let offset_table = out.len();
    let offset_size: u8 = match offset_table {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        _ => 4,
    };
    for offset in offsets {
        write_sized(&mut out, offset, offset_size);
    }
    out.extend_from_slice(&[0; 6]);
    out.push(offset_size);
    out.push(ref_size);
    out.write_u64::<BigEndian>(objects.len() as u64).unwrap();
    out.write_u64::<BigEndian>(0).unwrap();
    out.write_u64::<BigEndian>(offset_table as u64).unwrap();
    out
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else if len <= 0xffff {
        out.push(0x82);
        out.write_u16::<BigEndian>(len as u16).unwrap();
    } else {
        out.push(0x83);
        out.write_uint::<BigEndian>(len as u64, 3).unwrap();
    }
    out.extend_from_slice(content);
    out
}

const OID_SIGNED_DATA: [u8; 9] = [0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
const OID_DATA: [u8; 9] = [0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];

/// DER `ContentInfo` wrapping an unsigned `SignedData` around `payload`.
pub fn signed_data(payload: &[u8]) -> Vec<u8> {
    let encap = [
        der(0x06, &OID_DATA),
        der(0xa0, &der(0x04, payload)),
    ]
    .concat();
    let signed = [
        der(0x02, &[0x01]),
        der(0x31, &[]),
        der(0x30, &encap),
        der(0x31, &[]),
    ]
    .concat();
    let content_info = [der(0x06, &OID_SIGNED_DATA), der(0xa0, &der(0x30, &signed))].concat();
    der(0x30, &content_info)
}

/// Same envelope with `data` as the outer content type.
pub fn data_content_info(payload: &[u8]) -> Vec<u8> {
    let content_info = [der(0x06, &OID_DATA), der(0xa0, &der(0x04, payload))].concat();
    der(0x30, &content_info)
}
