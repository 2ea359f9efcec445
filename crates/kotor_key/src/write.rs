//! Types for writing a KEY catalog and its BIF archives
//!

use std::{
    collections::BTreeMap,
    fs,
    io::{Cursor, Write},
    path::Path,
};

use binrw::BinWrite;
use bon::Builder;
use kotor_common::ResourceId;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    types::{BifHeader, BifRecord, KeyFileRecord, KeyHeader, KeyRecord, Locator},
};

/// Options for how the catalog should be written
#[derive(Debug, Clone, Default, Builder)]
pub struct CatalogWriterOptions {
    #[builder(default)]
    pub build_year: u32,

    #[builder(default)]
    pub build_day: u32,

    /// Drive flags recorded for every archive
    #[builder(default = 1)]
    pub drives: u16,
}

/// The encoded files of a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFiles {
    pub key: Vec<u8>,

    /// `(name, bytes)` per archive, in archive index order
    pub archives: Vec<(String, Vec<u8>)>,
}

impl CatalogFiles {
    /// Write the KEY as `root/key_name` and each archive at its relative name below `root`.
    #[instrument(skip(self), err)]
    pub fn write_to(&self, root: &Path, key_name: &str) -> Result<()> {
        fs::write(root.join(key_name), &self.key)?;
        for (name, bytes) in &self.archives {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, bytes)?;
        }
        Ok(())
    }
}

/// KEY/BIF generator
///
/// Archives keep the order they were added in; entries inside each archive are sorted by
/// [`ResourceId`], so the output does not depend on insertion order.
///
/// ```
/// # fn doit() -> kotor_key::error::Result<()>
/// # {
/// use kotor_common::{ResourceId, ResourceKind};
/// use kotor_key::{CatalogWriter, CatalogWriterOptions};
///
/// let mut writer = CatalogWriter::new(CatalogWriterOptions::default());
/// let templates = writer.add_archive("data/templates.bif")?;
/// writer.insert(templates, ResourceId::new("door01", ResourceKind::Utd)?, b"UTD V3.2".to_vec())?;
///
/// let files = writer.finish()?;
/// assert_eq!(&files.key[..8], b"KEY V1  ");
/// assert_eq!(&files.archives[0].1[..8], b"BIFFV1  ");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct CatalogWriter {
    options: CatalogWriterOptions,
    archives: Vec<(String, BTreeMap<ResourceId, Vec<u8>>)>,
}

impl CatalogWriter {
    pub fn new(options: CatalogWriterOptions) -> Self {
        Self {
            options,
            archives: Vec::new(),
        }
    }

    /// Add an archive under a root-relative name and return its index.
    pub fn add_archive(&mut self, name: impl Into<String>) -> Result<u16> {
        let index = self.archives.len();
        if index as u32 >= Locator::MAX_ARCHIVES {
            return Err(Error::TooLarge("archive count"));
        }
        self.archives.push((name.into(), BTreeMap::new()));
        Ok(index as u16)
    }

    /// Add an entry to archive `archive`, replacing any entry with the same id.
    pub fn insert(&mut self, archive: u16, id: ResourceId, data: impl Into<Vec<u8>>) -> Result<()> {
        let (name, entries) = self
            .archives
            .get_mut(archive as usize)
            .ok_or_else(|| Error::corrupt(format!("archive {archive} was never added")))?;
        if entries.insert(id, data.into()).is_some() {
            warn!(archive = %name, "replaced an entry that was already in the archive");
        }
        Ok(())
    }

    /// Encode the KEY and every BIF.
    ///
    /// An id present in several archives is listed once in the KEY, pointing at the first archive.
    #[instrument(skip(self), err)]
    pub fn finish(self) -> Result<CatalogFiles> {
        let mut keys: BTreeMap<&ResourceId, Locator> = BTreeMap::new();
        let mut archives = Vec::with_capacity(self.archives.len());

        for (archive_index, (name, entries)) in self.archives.iter().enumerate() {
            let bif = write_bif(archive_index as u16, entries)?;
            for (entry_index, id) in entries.keys().enumerate() {
                let locator = Locator::new(archive_index as u16, entry_index as u32)
                    .ok_or(Error::TooLarge("entries per archive"))?;
                keys.entry(id).or_insert(locator);
            }
            archives.push((name.clone(), bif));
        }

        let names: Vec<Vec<u8>> = self
            .archives
            .iter()
            .map(|(name, _)| {
                let mut raw = name.replace('/', "\\").into_bytes();
                raw.push(0);
                raw
            })
            .collect();

        let offset_to_file_table = KeyHeader::SIZE;
        let offset_to_names = offset_to_file_table + KeyFileRecord::SIZE * names.len() as u64;
        let names_len: u64 = names.iter().map(|n| n.len() as u64).sum();
        let offset_to_key_table = offset_to_names + names_len;

        let mut out = Cursor::new(Vec::new());
        KeyHeader {
            bif_count: names.len() as u32,
            key_count: to_u32("key count", keys.len() as u64)?,
            offset_to_file_table: to_u32("file table", offset_to_file_table)?,
            offset_to_key_table: to_u32("key table", offset_to_key_table)?,
            build_year: self.options.build_year,
            build_day: self.options.build_day,
        }
        .write(&mut out)?;

        let mut name_offset = offset_to_names;
        for (name, (_, bif)) in names.iter().zip(&archives) {
            KeyFileRecord {
                file_size: to_u32("archive size", bif.len() as u64)?,
                filename_offset: to_u32("archive name", name_offset)?,
                filename_size: u16::try_from(name.len())
                    .map_err(|_| Error::TooLarge("archive name"))?,
                drives: self.options.drives,
            }
            .write(&mut out)?;
            name_offset += name.len() as u64;
        }
        for name in &names {
            out.write_all(name)?;
        }

        for (id, locator) in &keys {
            KeyRecord {
                resref: id.resref.to_raw(),
                res_type: id.kind.id(),
                locator: *locator,
            }
            .write(&mut out)?;
        }

        debug!(archives = archives.len(), keys = keys.len(), "wrote catalog");
        Ok(CatalogFiles {
            key: out.into_inner(),
            archives,
        })
    }
}

fn write_bif(archive_index: u16, entries: &BTreeMap<ResourceId, Vec<u8>>) -> Result<Vec<u8>> {
    let count = entries.len() as u64;
    let mut out = Cursor::new(Vec::new());
    BifHeader {
        variable_count: to_u32("entry count", count)?,
        fixed_count: 0,
        offset_to_variable_table: BifHeader::SIZE as u32,
    }
    .write(&mut out)?;

    let mut offset = BifHeader::SIZE + BifRecord::SIZE * count;
    for (entry_index, (id, data)) in entries.iter().enumerate() {
        BifRecord {
            locator: Locator::new(archive_index, entry_index as u32)
                .ok_or(Error::TooLarge("entries per archive"))?,
            offset: to_u32("entry offset", offset)?,
            size: to_u32("entry size", data.len() as u64)?,
            res_type: id.kind.id() as u32,
        }
        .write(&mut out)?;
        offset += data.len() as u64;
    }
    to_u32("archive size", offset)?;

    for data in entries.values() {
        out.write_all(data)?;
    }
    Ok(out.into_inner())
}

fn to_u32(what: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge(what))
}
