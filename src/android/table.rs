//! Decoder for `resources.arsc`.

use super::res::{
    chunks, read_chunk, ChunkType, RawChunk, ResTableEntry, ResTablePackageHeader, ResTableRef,
    ResTableTypeHeader, ResTableValue, ResValue, ResValueType, StringPool,
};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Density the framework assumes for resources without a density qualifier.
const DEFAULT_DENSITY: u16 = 160;

fn malformed(msg: impl std::fmt::Display) -> Error {
    Error::MalformedResourceTable(msg.to_string())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TableValue {
    String(String),
    Reference(ResTableRef),
    Integer(u32),
    Boolean(bool),
    Other { data_type: u8, data: u32 },
}

impl TableValue {
    fn decode(value: ResValue, strings: &StringPool) -> Result<Self> {
        Ok(match value.ty() {
            Some(ResValueType::String) => Self::String(strings.get(value.data)?.to_string()),
            Some(ResValueType::Reference | ResValueType::DynamicReference) => {
                Self::Reference(ResTableRef::from(value.data))
            }
            Some(ResValueType::IntDec | ResValueType::IntHex) => Self::Integer(value.data),
            Some(ResValueType::IntBoolean) => Self::Boolean(value.data != 0),
            _ => Self::Other {
                data_type: value.data_type,
                data: value.data,
            },
        })
    }
}

/// One configuration-specific value of a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub density: u16,
    pub locale: u32,
    pub value: TableValue,
}

impl Candidate {
    pub fn is_default_locale(&self) -> bool {
        self.locale == 0
    }

    fn effective_density(&self) -> u16 {
        if self.density == 0 {
            DEFAULT_DENSITY
        } else {
            self.density
        }
    }
}

/// Resource values indexed by id, with every configuration kept.
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: HashMap<u32, Vec<Candidate>>,
}

impl ResourceTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = read_chunk(data, 0).map_err(malformed)?;
        if root.ty != Some(ChunkType::Table) {
            return Err(malformed(format!(
                "unrecognized table tag 0x{:04x}",
                root.header.ty
            )));
        }
        let mut table = Self::default();
        let mut values = None;
        for chunk in chunks(root.body()) {
            let chunk = chunk.map_err(malformed)?;
            match chunk.ty {
                Some(ChunkType::StringPool) => {
                    values = Some(StringPool::parse(chunk)?);
                }
                Some(ChunkType::TablePackage) => {
                    let values = values
                        .as_ref()
                        .ok_or_else(|| malformed("package before the value string pool"))?;
                    table.parse_package(chunk, values)?;
                }
                ty => tracing::trace!("skipping table chunk {:?} (0x{:04x})", ty, chunk.header.ty),
            }
        }
        tracing::debug!("resource table holds {} resources", table.entries.len());
        Ok(table)
    }

    fn parse_package(&mut self, chunk: RawChunk<'_>, values: &StringPool) -> Result<()> {
        let header = ResTablePackageHeader::read(&mut chunk.header_ext())
            .map_err(|err| malformed(format!("package header: {err}")))?;
        let package_id =
            u8::try_from(header.id).map_err(|_| malformed(format!("package id {}", header.id)))?;
        tracing::trace!("package 0x{:02x} {}", package_id, header.name);
        for chunk in chunks(chunk.body()) {
            let chunk = chunk.map_err(malformed)?;
            match chunk.ty {
                Some(ChunkType::TableType) => self.parse_type(package_id, chunk, values)?,
                // type and key name pools, specs, libraries, overlayables
                ty => tracing::trace!("skipping package chunk {:?} (0x{:04x})", ty, chunk.header.ty),
            }
        }
        Ok(())
    }

    fn parse_type(&mut self, package_id: u8, chunk: RawChunk<'_>, values: &StringPool) -> Result<()> {
        let header = ResTableTypeHeader::read(&mut chunk.header_ext())
            .map_err(|err| malformed(format!("type header: {err}")))?;
        if header.id == 0 {
            return Err(malformed("type id 0"));
        }
        let sparse = header.flags & ResTableTypeHeader::FLAG_SPARSE != 0;
        let offset16 = header.flags & ResTableTypeHeader::FLAG_OFFSET16 != 0;
        let stride = if offset16 { 2 } else { 4 };
        let count = header.entry_count as usize;
        let mut index = chunk
            .body()
            .get(..count.saturating_mul(stride))
            .ok_or_else(|| malformed(format!("{count} entry offsets overrun type {}", header.id)))?;
        let entries = chunk
            .bytes
            .get(header.entries_start as usize..)
            .ok_or_else(|| malformed("entries start past the chunk end"))?;
        tracing::trace!(
            "type 0x{:02x}: {} entries, density {}, flags 0x{:02x}",
            header.id,
            count,
            header.config.density(),
            header.flags
        );

        for i in 0..count {
            let (entry_id, offset) = if sparse {
                let id = index.read_u16::<LittleEndian>().map_err(malformed)?;
                let offset = index.read_u16::<LittleEndian>().map_err(malformed)?;
                (id, Some(offset as usize * 4))
            } else if offset16 {
                let offset = index.read_u16::<LittleEndian>().map_err(malformed)?;
                (i as u16, (offset != u16::MAX).then_some(offset as usize * 4))
            } else {
                let offset = index.read_u32::<LittleEndian>().map_err(malformed)?;
                (i as u16, (offset != u32::MAX).then_some(offset as usize))
            };
            let Some(offset) = offset else {
                continue;
            };
            let mut bytes = entries
                .get(offset..)
                .ok_or_else(|| malformed(format!("entry {entry_id} starts past the chunk end")))?;
            let entry = ResTableEntry::read(&mut bytes)
                .map_err(|err| malformed(format!("entry {entry_id}: {err}")))?;
            let value = match entry.value {
                ResTableValue::Simple(value) => TableValue::decode(value, values)?,
                ResTableValue::Complex(_) => continue,
            };
            let id = ResTableRef::new(package_id, header.id, entry_id);
            self.entries.entry(id.into()).or_default().push(Candidate {
                density: header.config.density(),
                locale: header.config.locale,
                value,
            });
        }
        Ok(())
    }

    /// Every configuration recorded for `id`, in table order.
    pub fn candidates(&self, id: u32) -> &[Candidate] {
        self.entries.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolves a file resource, such as the application icon, to its path
    /// inside the archive. At each hop the density bucket closest to
    /// `target_density` wins, ties going to the higher density.
    pub fn resolve_file(&self, id: u32, target_density: u16, max_hops: usize) -> Result<String> {
        let value = self.resolve(id, max_hops, |candidates| {
            default_locale_or_all(candidates)
                .into_iter()
                .min_by_key(|candidate| {
                    let density = candidate.effective_density();
                    (density.abs_diff(target_density), Reverse(density))
                })
        })?;
        match value {
            TableValue::String(path) => Ok(path.clone()),
            other => Err(malformed(format!("file resource 0x{id:08x} is {other:?}"))),
        }
    }

    /// Resolves a string resource in the default locale.
    pub fn resolve_string(&self, id: u32, max_hops: usize) -> Result<String> {
        let value = self.resolve(id, max_hops, |candidates| {
            candidates.iter().find(|candidate| candidate.is_default_locale())
        })?;
        match value {
            TableValue::String(s) => Ok(s.clone()),
            TableValue::Integer(i) => Ok(i.to_string()),
            TableValue::Boolean(b) => Ok(b.to_string()),
            other => Err(malformed(format!("string resource 0x{id:08x} is {other:?}"))),
        }
    }

    fn resolve<'a>(
        &'a self,
        id: u32,
        max_hops: usize,
        select: impl Fn(&'a [Candidate]) -> Option<&'a Candidate>,
    ) -> Result<&'a TableValue> {
        let mut current = id;
        for _ in 0..=max_hops {
            let candidate = select(self.candidates(current)).ok_or(Error::ResourceNotFound(current))?;
            match &candidate.value {
                TableValue::Reference(next) => {
                    tracing::trace!("0x{:08x} -> {}", current, next);
                    current = (*next).into();
                }
                value => {
                    tracing::debug!(
                        "resolved 0x{:08x} at density {} to {:?}",
                        id,
                        candidate.density,
                        value
                    );
                    return Ok(value);
                }
            }
        }
        Err(Error::ReferenceCycle(id))
    }
}

fn default_locale_or_all(candidates: &[Candidate]) -> Vec<&Candidate> {
    let default = candidates
        .iter()
        .filter(|candidate| candidate.is_default_locale())
        .collect::<Vec<_>>();
    if default.is_empty() {
        candidates.iter().collect()
    } else {
        default
    }
}
