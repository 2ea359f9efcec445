//! Types for reading the KEY catalog and the BIF archives it indexes
//!

use std::{
    fmt::{self, Debug},
    fs,
    io::{Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use binrw::BinRead;
use indexmap::{map::Entry, IndexMap};
use kotor_common::{path::resolve_path, HandlePool, ResRef, ResourceId, ResourceKind};
use parking_lot::RwLock;
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::{Error, Result},
    types::{BifHeader, BifRecord, KeyFileRecord, KeyHeader, KeyRecord},
};

/// Where one resource lives in the base archive set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: ResourceId,
    pub archive_index: u16,
    pub entry_index: u32,
}

/// A base archive listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BifFile {
    /// Name as stored in the catalog, with `/` separators
    pub name: String,

    /// Location on disk, resolved when the catalog was opened
    pub path: PathBuf,

    /// Size recorded in the catalog
    pub file_size: u32,
    pub drives: u16,
}

/// Parsed variable table of one BIF
#[derive(Debug)]
struct BifTable {
    path: PathBuf,
    len: u64,
    records: Vec<BifRecord>,
}

/// The KEY file of an installation together with lazily parsed BIF tables.
///
/// The key table is read eagerly. Each BIF's variable table is read on the first fetch from that
/// archive and cached; payloads are read through the shared [`HandlePool`].
pub struct Catalog {
    root: PathBuf,
    build_year: u32,
    build_day: u32,
    archives: Vec<BifFile>,
    entries: IndexMap<ResourceId, CatalogEntry>,
    tables: RwLock<Vec<Option<Arc<BifTable>>>>,
    pool: Arc<HandlePool>,
}

impl Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("root", &self.root)
            .field("archives", &self.archives.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Catalog {
    /// Open a KEY file. Archive names are resolved against the directory holding it.
    #[instrument(skip(pool), err)]
    pub fn open(path: impl AsRef<Path> + Debug, pool: Arc<HandlePool>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_bytes(root, &bytes, pool)
    }

    /// Parse KEY bytes, resolving archive names against `root`.
    pub fn from_bytes(root: impl Into<PathBuf>, bytes: &[u8], pool: Arc<HandlePool>) -> Result<Self> {
        let source_len = bytes.len() as u64;
        if source_len < KeyHeader::SIZE {
            return Err(Error::TruncatedData {
                expected: KeyHeader::SIZE,
                actual: source_len,
            });
        }

        let mut reader = Cursor::new(bytes);
        let header = KeyHeader::read(&mut reader).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => Error::corrupt("not a KEY V1 file"),
            e => e.into(),
        })?;

        let file_table = table(
            bytes,
            "file table",
            header.offset_to_file_table,
            header.bif_count,
            KeyFileRecord::SIZE,
        )?;
        let root: PathBuf = root.into();
        let mut archives = Vec::with_capacity(header.bif_count as usize);
        let mut records = Cursor::new(file_table);
        for i in 0..header.bif_count {
            let record = KeyFileRecord::read(&mut records)?;
            let start = record.filename_offset as usize;
            let end = start + record.filename_size as usize;
            let raw = bytes.get(start..end).ok_or_else(|| {
                Error::corrupt(format!("name of archive {i} lies outside the key file"))
            })?;
            let raw = raw.split(|b| *b == 0).next().unwrap_or_default();
            let name = String::from_utf8_lossy(raw).replace('\\', "/");
            if !is_relative_name(&name) {
                return Err(Error::corrupt(format!(
                    "archive {i} is named {name:?}, which leaves the installation directory"
                )));
            }
            archives.push(BifFile {
                path: resolve_path(&root, &name),
                name,
                file_size: record.file_size,
                drives: record.drives,
            });
        }

        let key_table = table(
            bytes,
            "key table",
            header.offset_to_key_table,
            header.key_count,
            KeyRecord::SIZE,
        )?;
        let mut entries = IndexMap::with_capacity(header.key_count as usize);
        let mut records = Cursor::new(key_table);
        for i in 0..header.key_count {
            let record = KeyRecord::read(&mut records)?;
            let archive_index = record.locator.archive_index();
            if archive_index as u32 >= header.bif_count {
                return Err(Error::corrupt(format!(
                    "key {i} refers to archive {archive_index}, but only {} are listed",
                    header.bif_count
                )));
            }

            let Some(kind) = ResourceKind::from_id(record.res_type) else {
                warn!(key = i, res_type = record.res_type, "skipping key with unknown resource type");
                continue;
            };
            let resref = match ResRef::from_raw(&record.resref) {
                Ok(resref) => resref,
                Err(e) => {
                    warn!(key = i, "skipping key with invalid name: {e}");
                    continue;
                }
            };

            let id = ResourceId { resref, kind };
            match entries.entry(id.clone()) {
                Entry::Occupied(_) => warn!(key = i, %id, "duplicate key, keeping the first"),
                Entry::Vacant(slot) => {
                    slot.insert(CatalogEntry {
                        id,
                        archive_index,
                        entry_index: record.locator.entry_index(),
                    });
                }
            }
        }

        debug!(
            archives = archives.len(),
            entries = entries.len(),
            "parsed key file"
        );
        Ok(Self {
            root,
            build_year: header.build_year,
            build_day: header.build_day,
            tables: RwLock::new(vec![None; archives.len()]),
            archives,
            entries,
            pool,
        })
    }

    /// Directory archive names are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_year(&self) -> u32 {
        self.build_year
    }

    pub fn build_day(&self) -> u32 {
        self.build_day
    }

    pub fn archives(&self) -> &[BifFile] {
        &self.archives
    }

    /// On-disk location of archive `index`
    pub fn archive_path(&self, index: u16) -> Option<&Path> {
        self.archives
            .get(index as usize)
            .map(|archive| archive.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entry(&self, id: &ResourceId) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    /// Entry at `index` in key table order
    pub fn get_index(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    /// Ids in key table order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Read the complete payload of `id` from its base archive.
    pub fn fetch(&self, id: &ResourceId) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        let table = self.table(entry.archive_index)?;

        let record = table
            .records
            .get(entry.entry_index as usize)
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "{} has no entry {} for {id}",
                    table.path.display(),
                    entry.entry_index
                ))
            })?;
        let end = record.offset as u64 + record.size as u64;
        if end > table.len {
            return Err(Error::corrupt(format!(
                "{id} spans {}..{end} in {}, past its end ({} bytes)",
                record.offset,
                table.path.display(),
                table.len
            )));
        }

        trace!(%id, archive = entry.archive_index, offset = record.offset, size = record.size, "reading entry");
        Ok(self
            .pool
            .read_at(&table.path, record.offset as u64, record.size as usize)?)
    }

    /// Number of BIF tables parsed so far
    pub fn loaded_tables(&self) -> usize {
        self.tables.read().iter().filter(|t| t.is_some()).count()
    }

    fn table(&self, index: u16) -> Result<Arc<BifTable>> {
        if let Some(Some(table)) = self.tables.read().get(index as usize) {
            return Ok(Arc::clone(table));
        }

        let mut tables = self.tables.write();
        let slot = tables.get_mut(index as usize).ok_or_else(|| {
            Error::corrupt(format!("archive {index} is not listed in the key file"))
        })?;
        if let Some(table) = slot {
            return Ok(Arc::clone(table));
        }

        let path = self
            .archive_path(index)
            .ok_or_else(|| Error::corrupt(format!("archive {index} is not listed in the key file")))?;
        let table = Arc::new(self.load_table(path.to_path_buf())?);
        *slot = Some(Arc::clone(&table));
        Ok(table)
    }

    #[instrument(skip(self), err)]
    fn load_table(&self, path: PathBuf) -> Result<BifTable> {
        let len = fs::metadata(&path)?.len();
        if len < BifHeader::SIZE {
            return Err(Error::TruncatedData {
                expected: BifHeader::SIZE,
                actual: len,
            });
        }

        let header = self.pool.read_at(&path, 0, BifHeader::SIZE as usize)?;
        let header = BifHeader::read(&mut Cursor::new(header)).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => {
                Error::corrupt(format!("{} is not a BIFF V1 file", path.display()))
            }
            e => e.into(),
        })?;

        let table_len = header.variable_count as u64 * BifRecord::SIZE;
        if header.offset_to_variable_table as u64 + table_len > len {
            return Err(Error::corrupt(format!(
                "variable table of {} extends past its end ({len} bytes)",
                path.display()
            )));
        }
        let raw = self.pool.read_at(
            &path,
            header.offset_to_variable_table as u64,
            table_len as usize,
        )?;
        let mut reader = Cursor::new(raw);
        let records = (0..header.variable_count)
            .map(|_| BifRecord::read(&mut reader))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        debug!(path = %path.display(), records = records.len(), "parsed archive table");
        Ok(BifTable { path, len, records })
    }
}

/// Whether a catalog archive name stays below the directory it is resolved against
fn is_relative_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && name
            .split('/')
            .all(|component| component != ".." && !component.contains(':'))
}

/// Slice `count` records of `width` bytes at `offset` out of the key file.
fn table<'a>(bytes: &'a [u8], what: &str, offset: u32, count: u32, width: u64) -> Result<&'a [u8]> {
    let start = offset as u64;
    let end = start + count as u64 * width;
    if end > bytes.len() as u64 {
        return Err(Error::corrupt(format!(
            "{what} ({count} records at offset {start}) extends past the end of the key file ({} bytes)",
            bytes.len()
        )));
    }
    Ok(&bytes[start as usize..end as usize])
}

/// Read the variable table of a whole BIF from any seekable source, without a catalog.
pub fn read_bif_records<R: Read + Seek>(reader: &mut R) -> Result<Vec<BifRecord>> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    if len < BifHeader::SIZE {
        return Err(Error::TruncatedData {
            expected: BifHeader::SIZE,
            actual: len,
        });
    }
    let header = BifHeader::read(reader)?;
    if header.offset_to_variable_table as u64 + header.variable_count as u64 * BifRecord::SIZE > len
    {
        return Err(Error::corrupt("variable table extends past the end of the archive"));
    }
    reader.seek(SeekFrom::Start(header.offset_to_variable_table as u64))?;
    let records = (0..header.variable_count)
        .map(|_| BifRecord::read(reader))
        .collect::<binrw::BinResult<Vec<_>>>()?;
    Ok(records)
}
