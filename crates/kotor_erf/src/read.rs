//! Types for reading ERF and RIM containers
//!

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::{map::Entry, IndexMap};
use kotor_common::{ResRef, ResourceId, ResourceKind};
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::{Error, Result},
    types::{ContainerType, ErfHeader, ErfKey, ErfResource, RimHeader, RimKey, VERSION},
};

/// Location of one resource inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub id: ResourceId,

    /// Synchronization number stored in the key table
    pub resource_id: u32,

    /// Absolute offset of the payload from the start of the container
    pub offset: u32,
    pub size: u32,
}

/// The parsed, immutable header and entry table of a container.
///
/// Cheap to share between readers of the same container through an [`Arc`].
#[derive(Debug, Clone)]
pub struct ContainerIndex {
    container_type: ContainerType,
    localized_strings: BTreeMap<u32, String>,
    description_strref: u32,
    build_year: u32,
    build_day: u32,
    entries: IndexMap<ResourceId, ContainerEntry>,
    source_len: u64,
}

impl ContainerIndex {
    /// Parse the header and entry table of a container, validating every entry's byte range
    /// against the length of `reader`.
    #[instrument(skip_all, err)]
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let source_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        if source_len < 8 {
            return Err(Error::TruncatedData {
                expected: 8,
                actual: source_len,
            });
        }
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        let (file_type, version) = magic.split_at(4);
        if version != VERSION {
            return Err(Error::corrupt(format!(
                "unsupported version {:?}",
                String::from_utf8_lossy(version)
            )));
        }
        let container_type = file_type
            .try_into()
            .ok()
            .and_then(ContainerType::from_magic)
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "unrecognized file type {:?}",
                    String::from_utf8_lossy(file_type)
                ))
            })?;
        reader.seek(SeekFrom::Start(0))?;

        let index = if container_type.is_rim() {
            Self::parse_rim(reader, source_len)?
        } else {
            Self::parse_erf(reader, container_type, source_len)?
        };
        debug!(
            %container_type,
            entries = index.entries.len(),
            len = source_len,
            "parsed container index"
        );
        Ok(index)
    }

    fn parse_rim<R: Read + Seek>(reader: &mut R, source_len: u64) -> Result<Self> {
        require_len(source_len, RimHeader::SIZE)?;
        let header = RimHeader::read(reader)?;
        let offset_to_keys = match header.offset_to_keys {
            0 => RimHeader::SIZE,
            offset => offset as u64,
        };

        let keys = read_table(
            reader,
            "key table",
            offset_to_keys,
            header.entry_count,
            RimKey::SIZE,
            source_len,
        )?;
        let mut keys = Cursor::new(keys);
        let mut index = Self::empty(ContainerType::Rim, source_len);
        for i in 0..header.entry_count {
            let key = RimKey::read(&mut keys)?;
            index.add(i, key.resref, key.res_type, key.resource_id, key.offset, key.size)?;
        }
        Ok(index)
    }

    fn parse_erf<R: Read + Seek>(
        reader: &mut R,
        container_type: ContainerType,
        source_len: u64,
    ) -> Result<Self> {
        require_len(source_len, ErfHeader::SIZE)?;
        let header = ErfHeader::read(reader)?;
        let mut index = Self::empty(container_type, source_len);
        index.description_strref = header.description_strref;
        index.build_year = header.build_year;
        index.build_day = header.build_day;

        if header.language_count > 0 && header.offset_to_localized_strings > 0 {
            let block = read_table(
                reader,
                "localized strings",
                header.offset_to_localized_strings as u64,
                header.localized_string_size,
                1,
                source_len,
            )?;
            index.localized_strings = parse_localized_strings(&block, header.language_count)?;
        }

        let offset_to_keys = match header.offset_to_keys {
            0 => ErfHeader::SIZE,
            offset => offset as u64,
        };
        let offset_to_resources = match header.offset_to_resources {
            0 => offset_to_keys + ErfKey::SIZE * header.entry_count as u64,
            offset => offset as u64,
        };

        let keys = read_table(
            reader,
            "key table",
            offset_to_keys,
            header.entry_count,
            ErfKey::SIZE,
            source_len,
        )?;
        let resources = read_table(
            reader,
            "resource table",
            offset_to_resources,
            header.entry_count,
            ErfResource::SIZE,
            source_len,
        )?;

        let mut keys = Cursor::new(keys);
        let mut resources = Cursor::new(resources);
        for i in 0..header.entry_count {
            let key = ErfKey::read(&mut keys)?;
            let resource = ErfResource::read(&mut resources)?;
            index.add(
                i,
                key.resref,
                key.res_type as u32,
                key.resource_id,
                resource.offset,
                resource.size,
            )?;
        }
        Ok(index)
    }

    fn empty(container_type: ContainerType, source_len: u64) -> Self {
        Self {
            container_type,
            localized_strings: BTreeMap::new(),
            description_strref: container_type.default_description_strref(),
            build_year: 0,
            build_day: 0,
            entries: IndexMap::new(),
            source_len,
        }
    }

    fn add(
        &mut self,
        index: u32,
        resref: [u8; 16],
        res_type: u32,
        resource_id: u32,
        offset: u32,
        size: u32,
    ) -> Result<()> {
        let end = offset as u64 + size as u64;
        if end > self.source_len {
            return Err(Error::corrupt(format!(
                "entry {index} spans {offset}..{end}, past the end of the archive ({} bytes)",
                self.source_len
            )));
        }

        let Some(kind) = ResourceKind::from_wide_id(res_type) else {
            warn!(index, res_type, "skipping entry with unknown resource type");
            return Ok(());
        };
        let resref = match ResRef::from_raw(&resref) {
            Ok(resref) => resref,
            Err(e) => {
                warn!(index, "skipping entry with invalid name: {e}");
                return Ok(());
            }
        };

        let id = ResourceId { resref, kind };
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => warn!(index, %id, "duplicate entry, keeping the first"),
            Entry::Vacant(slot) => {
                slot.insert(ContainerEntry {
                    id,
                    resource_id,
                    offset,
                    size,
                });
            }
        }
        Ok(())
    }

    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }

    /// Description strings keyed by language id
    pub fn localized_strings(&self) -> &BTreeMap<u32, String> {
        &self.localized_strings
    }

    pub fn description_strref(&self) -> u32 {
        self.description_strref
    }

    pub fn build_year(&self) -> u32 {
        self.build_year
    }

    pub fn build_day(&self) -> u32 {
        self.build_day
    }

    /// Length of the byte source the entries were validated against
    pub fn source_len(&self) -> u64 {
        self.source_len
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

    pub fn get(&self, id: &ResourceId) -> Option<&ContainerEntry> {
        self.entries.get(id)
    }

    pub fn get_index(&self, index: usize) -> Option<&ContainerEntry> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    /// Ids in archive order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    /// Entries in archive order
    pub fn entries(&self) -> impl Iterator<Item = &ContainerEntry> {
        self.entries.values()
    }
}

fn require_len(source_len: u64, expected: u64) -> Result<()> {
    if source_len < expected {
        return Err(Error::TruncatedData {
            expected,
            actual: source_len,
        });
    }
    Ok(())
}

/// Read `count` records of `width` bytes at `offset`, after checking they lie inside the source.
fn read_table<R: Read + Seek>(
    reader: &mut R,
    what: &str,
    offset: u64,
    count: u32,
    width: u64,
    source_len: u64,
) -> Result<Vec<u8>> {
    let len = count as u64 * width;
    if offset + len > source_len {
        return Err(Error::corrupt(format!(
            "{what} ({len} bytes at offset {offset}) extends past the end of the archive ({source_len} bytes)"
        )));
    }

    reader.seek(SeekFrom::Start(offset))?;
    let mut table = vec![0u8; len as usize];
    reader.read_exact(&mut table)?;
    Ok(table)
}

fn parse_localized_strings(block: &[u8], language_count: u32) -> Result<BTreeMap<u32, String>> {
    let mut strings = BTreeMap::new();
    let mut cursor = Cursor::new(block);
    for _ in 0..language_count {
        if cursor.position() >= block.len() as u64 {
            break;
        }
        let language = cursor.read_u32::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()? as u64;
        let start = cursor.position();
        if start + len > block.len() as u64 {
            return Err(Error::corrupt(format!(
                "localized string for language {language} runs past the end of its block"
            )));
        }
        let text = &block[start as usize..(start + len) as usize];
        strings.insert(language, String::from_utf8_lossy(text).into_owned());
        cursor.set_position(start + len);
    }
    Ok(strings)
}

/// A struct for reading one entry of a container
pub struct ContainerFile<'a, R: Read> {
    entry: ContainerEntry,
    reader: io::Take<&'a mut R>,
}

impl<R: Read> Debug for ContainerFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ContainerFile({:#?})", self.entry)
    }
}

impl<R: Read> ContainerFile<'_, R> {
    pub fn id(&self) -> &ResourceId {
        &self.entry.id
    }

    /// Size of the entry in bytes
    pub fn size(&self) -> u64 {
        self.entry.size as u64
    }

    /// Absolute offset of the entry's payload
    pub fn data_start(&self) -> u64 {
        self.entry.offset as u64
    }

    pub fn entry(&self) -> &ContainerEntry {
        &self.entry
    }
}

impl<R: Read> Read for ContainerFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// ERF/RIM container reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_container(reader: impl Read + Seek) -> kotor_erf::error::Result<()> {
///     let mut container = kotor_erf::ContainerArchive::new(reader)?;
///
///     for id in container.ids().cloned().collect::<Vec<_>>() {
///         let mut file = container.by_id(&id)?;
///         println!("{id}: {} bytes", file.size());
///         std::io::copy(&mut file, &mut std::io::sink())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct ContainerArchive<R> {
    reader: R,
    index: Arc<ContainerIndex>,
}

impl<R> Debug for ContainerArchive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ContainerArchive")
            .field("container_type", &self.index.container_type)
            .field("entries", &self.index.len())
            .finish()
    }
}

impl ContainerArchive<BufReader<File>> {
    /// Open a container file from disk.
    #[instrument(err)]
    pub fn open(path: impl AsRef<Path> + Debug) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl ContainerArchive<Cursor<Arc<[u8]>>> {
    /// Open a container held in memory, e.g. one nested inside another container.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::new(Cursor::new(bytes.into()))
    }
}

impl<R> ContainerArchive<R> {
    /// Number of entries in this container
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether this container has no entries
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn container_type(&self) -> ContainerType {
        self.index.container_type
    }

    /// Ids of every entry, in archive order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.index.ids()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains(id)
    }

    pub fn entry(&self, id: &ResourceId) -> Option<&ContainerEntry> {
        self.index.get(id)
    }

    /// Shareable handle to the parsed entry table
    pub fn index(&self) -> Arc<ContainerIndex> {
        Arc::clone(&self.index)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> ContainerArchive<R> {
    /// Read a container, parsing its entry table.
    pub fn new(mut reader: R) -> Result<Self> {
        let index = ContainerIndex::parse(&mut reader)?;
        Ok(Self {
            reader,
            index: Arc::new(index),
        })
    }

    /// Get a reader over the entry for `id`
    pub fn by_id(&mut self, id: &ResourceId) -> Result<ContainerFile<'_, R>> {
        let entry = self
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        self.reader.seek(SeekFrom::Start(entry.offset as u64))?;
        trace!(%id, offset = entry.offset, size = entry.size, "reading entry");

        Ok(ContainerFile {
            reader: (&mut self.reader).take(entry.size as u64),
            entry,
        })
    }

    /// Get a reader over the entry at `index`, in archive order
    pub fn by_index(&mut self, index: usize) -> Result<ContainerFile<'_, R>> {
        let id = self
            .index
            .get_index(index)
            .map(|entry| entry.id.clone())
            .ok_or_else(|| Error::corrupt(format!("no entry at index {index}")))?;
        self.by_id(&id)
    }

    /// Read the complete payload of `id`.
    pub fn fetch(&mut self, id: &ResourceId) -> Result<Vec<u8>> {
        let mut file = self.by_id(id)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        if data.len() as u64 != file.size() {
            return Err(Error::TruncatedData {
                expected: file.size(),
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }
}
