use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from a declared entry size.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Readable view of one archive member.
pub struct Entry<'a> {
    /// Decompressed length in bytes.
    pub len: u64,
    pub reader: Box<dyn Read + 'a>,
}

impl std::fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Read-only access to an installer package.
///
/// The extractor borrows an implementation for the duration of one call and
/// never writes through it.
pub trait PackageArchive {
    /// Entry names in archive order.
    fn entry_names(&self) -> &[String];

    fn open_entry(&mut self, name: &str) -> Result<Entry<'_>>;

    /// Size of the whole archive as stored.
    fn size(&self) -> u64;

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.open_entry(name)?;
        // the declared size comes from the archive and may lie
        let mut buf = Vec::with_capacity(entry.len.min(MAX_PREALLOCATION) as usize);
        entry.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

pub struct ZipPackage<R> {
    zip: ZipArchive<R>,
    names: Vec<String>,
    size: u64,
}

impl ZipPackage<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        File::open(path)
            .map_err(ZipError::Io)
            .and_then(|f| Self::new(BufReader::new(f)))
            .map_err(|source| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<R: Read + Seek> ZipPackage<R> {
    pub fn new(mut reader: R) -> Result<Self, ZipError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.rewind()?;
        let mut zip = ZipArchive::new(reader)?;
        let mut names = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            names.push(zip.by_index_raw(i)?.name().to_string());
        }
        tracing::debug!("opened zip with {} entries, {} bytes", names.len(), size);
        Ok(Self { zip, names, size })
    }
}

impl<R: Read + Seek> PackageArchive for ZipPackage<R> {
    fn entry_names(&self) -> &[String] {
        &self.names
    }

    fn open_entry(&mut self, name: &str) -> Result<Entry<'_>> {
        let file = self.zip.by_name(name).map_err(|source| Error::Entry {
            name: name.to_string(),
            source,
        })?;
        Ok(Entry {
            len: file.size(),
            reader: Box::new(file),
        })
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl<R> std::fmt::Debug for ZipPackage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ZipPackage")
            .field("entries", &self.names.len())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
