//! Archive container I/O.
//!
//! The input archive is memory-mapped and read through the zip container
//! format; entries are either class payloads (detected by the `.class` name
//! suffix) or opaque resources copied byte-for-byte. [`JarReader`] doubles as
//! the backing store for the class graph: membership is answered from the
//! central directory snapshot taken at open, so "absent" never requires a
//! decompression attempt and is distinguishable from a failed parse.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use memmap2::Mmap;
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::{Error, Result};

/// Name suffix identifying class payload entries.
pub const CLASS_SUFFIX: &str = ".class";

/// One archive entry, already read into memory.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// A class payload; `name` is the internal binary name (no suffix).
    Class {
        /// Internal binary name of the class.
        name: String,
        /// Raw class payload.
        data: Vec<u8>,
    },
    /// Anything else, copied verbatim; `name` is the full entry path.
    Resource {
        /// Entry path inside the archive.
        name: String,
        /// Raw entry payload (empty for directories).
        data: Vec<u8>,
    },
}

/// A read-only cursor over a memory-mapped archive.
struct MappedFile {
    map: Mmap,
    position: u64,
}

impl Read for MappedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = &self.map[..];
        let start = usize::try_from(self.position).unwrap_or(data.len());
        let available = data.len().saturating_sub(start);
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for MappedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let length = self.map.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => length + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of archive",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

/// Reads an archive, serving both sequential pass iteration and random
/// class lookups for hierarchy walks.
pub struct JarReader {
    archive: Mutex<ZipArchive<MappedFile>>,
    /// Entry names in central directory order.
    names: Vec<String>,
    /// Entry index by full name, for random class access.
    index: HashMap<String, usize>,
}

impl JarReader {
    /// Opens and memory-maps an archive.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the archive is not expected to
        // be modified underneath a running pass.
        let map = unsafe { Mmap::map(&file)? };
        let mut archive = ZipArchive::new(MappedFile { map, position: 0 })?;
        let mut names = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            index.insert(name.clone(), i);
            names.push(name);
        }
        Ok(JarReader {
            archive: Mutex::new(archive),
            names,
            index,
        })
    }

    /// Number of entries in the archive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the archive has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when the archive directory lists a class entry for this internal
    /// name. This is a directory check only; it does not attempt a parse.
    #[must_use]
    pub fn has_class(&self, internal_name: &str) -> bool {
        self.index
            .contains_key(&format!("{internal_name}{CLASS_SUFFIX}"))
    }

    /// Reads the raw payload of a class entry, `None` when the archive does
    /// not contain it.
    pub fn read_class(&self, internal_name: &str) -> Result<Option<Vec<u8>>> {
        let Some(&position) = self.index.get(&format!("{internal_name}{CLASS_SUFFIX}")) else {
            return Ok(None);
        };
        Ok(Some(self.read_index(position)?))
    }

    /// Reads the entry at `position` in directory order.
    pub fn entry(&self, position: usize) -> Result<ArchiveEntry> {
        let name = self
            .names
            .get(position)
            .ok_or_else(|| malformed_error!("Archive entry index {} out of range", position))?
            .clone();
        let data = self.read_index(position)?;
        Ok(match name.strip_suffix(CLASS_SUFFIX) {
            Some(internal) => ArchiveEntry::Class {
                name: internal.to_string(),
                data,
            },
            None => ArchiveEntry::Resource { name, data },
        })
    }

    /// Iterates all entries in directory order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            reader: self,
            position: 0,
        }
    }

    fn read_index(&self, position: usize) -> Result<Vec<u8>> {
        let mut archive = self.archive.lock().map_err(|_| Error::LockError)?;
        let mut entry = archive.by_index(position)?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Iterator over [`JarReader`] entries.
pub struct Entries<'a> {
    reader: &'a JarReader,
    position: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.reader.len() {
            return None;
        }
        let entry = self.reader.entry(self.position);
        self.position += 1;
        Some(entry)
    }
}

/// Writes an output archive. Entry sizes are set by the container writer to
/// match the emitted payload exactly.
pub struct JarWriter {
    inner: ZipWriter<BufWriter<File>>,
}

impl JarWriter {
    /// Creates (truncates) the archive at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(JarWriter {
            inner: ZipWriter::new(BufWriter::new(file)),
        })
    }

    /// Writes a class payload under its internal name.
    pub fn write_class(&mut self, internal_name: &str, data: &[u8]) -> Result<()> {
        self.inner.start_file(
            format!("{internal_name}{CLASS_SUFFIX}"),
            SimpleFileOptions::default(),
        )?;
        self.inner.write_all(data)?;
        Ok(())
    }

    /// Writes a resource entry verbatim. Directory entries (trailing `/`) are
    /// recreated as directories.
    pub fn write_resource(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.ends_with('/') {
            self.inner
                .add_directory(name.to_string(), SimpleFileOptions::default())?;
            return Ok(());
        }
        self.inner
            .start_file(name.to_string(), SimpleFileOptions::default())?;
        self.inner.write_all(data)?;
        Ok(())
    }

    /// Writes an [`ArchiveEntry`] under its carried name.
    pub fn write_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        match entry {
            ArchiveEntry::Class { name, data } => self.write_class(name, data),
            ArchiveEntry::Resource { name, data } => self.write_resource(name, data),
        }
    }

    /// Finalizes the central directory and flushes the file.
    pub fn finish(self) -> Result<()> {
        self.inner.finish()?.flush()?;
        Ok(())
    }
}
