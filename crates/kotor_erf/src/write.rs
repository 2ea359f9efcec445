//! Types for writing ERF and RIM containers
//!

use std::{
    collections::BTreeMap,
    io::{self, Cursor, Write},
};

use binrw::BinWrite;
use bon::Builder;
use byteorder::{LittleEndian, WriteBytesExt};
use kotor_common::ResourceId;
use tracing::{debug, instrument, warn, Level};

use crate::{
    error::{Error, Result},
    types::{ContainerType, ErfHeader, ErfKey, ErfResource, RimHeader, RimKey},
};

/// Options for how the container should be written
#[derive(Debug, Clone, Default, Builder)]
pub struct ContainerWriterOptions {
    /// Header flavour to write
    #[builder(default)]
    pub container_type: ContainerType,

    /// Description strings keyed by language id. Ignored for RIM.
    #[builder(default)]
    pub localized_strings: BTreeMap<u32, String>,

    /// Falls back to [`ContainerType::default_description_strref`]
    pub description_strref: Option<u32>,

    #[builder(default)]
    pub build_year: u32,

    #[builder(default)]
    pub build_day: u32,
}

/// ERF/RIM container generator
///
/// Entries are buffered and written sorted by [`ResourceId`] when the container is finished, so
/// the output does not depend on insertion order.
///
/// ```
/// # fn doit() -> kotor_erf::error::Result<()>
/// # {
/// use std::io::Write;
/// use kotor_common::{ResourceId, ResourceKind};
/// use kotor_erf::{ContainerType, ContainerWriter, ContainerWriterOptions};
///
/// let mut erf = ContainerWriter::new(
///     Vec::new(),
///     ContainerWriterOptions::builder()
///         .container_type(ContainerType::Mod)
///         .build(),
/// );
///
/// erf.start_entry(ResourceId::new("module", ResourceKind::Ifo)?)?;
/// erf.write_all(b"IFO V3.2")?;
///
/// let bytes = erf.finish()?;
/// assert_eq!(&bytes[..8], b"MOD V1.0");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct ContainerWriter<W: Write> {
    inner: W,
    options: ContainerWriterOptions,
    entries: BTreeMap<ResourceId, Vec<u8>>,
    current: Option<(ResourceId, Vec<u8>)>,
}

impl<W: Write> ContainerWriter<W> {
    /// Initializes the container.
    ///
    /// Before writing to this object, the [`ContainerWriter::start_entry`] function should be
    /// called.
    pub fn new(inner: W, options: ContainerWriterOptions) -> ContainerWriter<W> {
        ContainerWriter {
            inner,
            options,
            entries: BTreeMap::new(),
            current: None,
        }
    }

    /// Returns true if an entry is currently open for writing.
    pub const fn is_writing_entry(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new entry, finishing the previous one.
    #[instrument(skip_all, fields(id = %id))]
    pub fn start_entry(&mut self, id: ResourceId) -> Result<()> {
        self.finish_entry();
        self.current = Some((id, Vec::new()));
        Ok(())
    }

    /// Add a complete entry, replacing any entry with the same id.
    pub fn insert(&mut self, id: ResourceId, data: impl Into<Vec<u8>>) {
        self.finish_entry();
        self.store(id, data.into());
    }

    fn finish_entry(&mut self) {
        if let Some((id, data)) = self.current.take() {
            self.store(id, data);
        }
    }

    fn store(&mut self, id: ResourceId, data: Vec<u8>) {
        if let Some(previous) = self.entries.insert(id, data) {
            warn!(
                previous = previous.len(),
                "replaced an entry that was already in the container"
            );
        }
    }

    /// Finish the last entry and write the container.
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err, fields(container_type = %self.options.container_type))]
    pub fn finish(mut self) -> Result<W> {
        self.finish_entry();

        let mut out = Cursor::new(Vec::new());
        if self.options.container_type.is_rim() {
            self.write_rim(&mut out)?;
        } else {
            self.write_erf(&mut out)?;
        }
        let bytes = out.into_inner();
        debug!(entries = self.entries.len(), len = bytes.len(), "wrote container");

        self.inner.write_all(&bytes)?;
        Ok(self.inner)
    }

    fn write_rim(&self, out: &mut Cursor<Vec<u8>>) -> Result<()> {
        let count = self.entries.len() as u64;
        RimHeader {
            entry_count: to_u32("entry count", count)?,
            ..Default::default()
        }
        .write(out)?;

        let mut offset = RimHeader::SIZE + RimKey::SIZE * count;
        for (resource_id, (id, data)) in self.entries.iter().enumerate() {
            RimKey {
                resref: id.resref.to_raw(),
                res_type: id.kind.id() as u32,
                resource_id: to_u32("resource id", resource_id as u64)?,
                offset: to_u32("entry offset", offset)?,
                size: to_u32("entry size", data.len() as u64)?,
            }
            .write(out)?;
            offset += data.len() as u64;
        }
        to_u32("container size", offset)?;

        for data in self.entries.values() {
            out.write_all(data)?;
        }
        Ok(())
    }

    fn write_erf(&self, out: &mut Cursor<Vec<u8>>) -> Result<()> {
        let mut strings = Vec::new();
        for (language, text) in &self.options.localized_strings {
            strings.write_u32::<LittleEndian>(*language)?;
            strings.write_u32::<LittleEndian>(to_u32("localized string", text.len() as u64)?)?;
            strings.write_all(text.as_bytes())?;
        }

        let count = self.entries.len() as u64;
        let offset_to_keys = ErfHeader::SIZE + strings.len() as u64;
        let offset_to_resources = offset_to_keys + ErfKey::SIZE * count;
        let offset_to_data = offset_to_resources + ErfResource::SIZE * count;

        ErfHeader {
            file_type: *self.options.container_type.magic(),
            language_count: to_u32("language count", self.options.localized_strings.len() as u64)?,
            localized_string_size: to_u32("localized strings", strings.len() as u64)?,
            entry_count: to_u32("entry count", count)?,
            offset_to_localized_strings: ErfHeader::SIZE as u32,
            offset_to_keys: to_u32("key table", offset_to_keys)?,
            offset_to_resources: to_u32("resource table", offset_to_resources)?,
            build_year: self.options.build_year,
            build_day: self.options.build_day,
            description_strref: self
                .options
                .description_strref
                .unwrap_or(self.options.container_type.default_description_strref()),
        }
        .write(out)?;
        out.write_all(&strings)?;

        for (resource_id, id) in self.entries.keys().enumerate() {
            ErfKey {
                resref: id.resref.to_raw(),
                resource_id: to_u32("resource id", resource_id as u64)?,
                res_type: id.kind.id(),
            }
            .write(out)?;
        }

        let mut offset = offset_to_data;
        for data in self.entries.values() {
            ErfResource {
                offset: to_u32("entry offset", offset)?,
                size: to_u32("entry size", data.len() as u64)?,
            }
            .write(out)?;
            offset += data.len() as u64;
        }
        to_u32("container size", offset)?;

        for data in self.entries.values() {
            out.write_all(data)?;
        }
        Ok(())
    }
}

fn to_u32(what: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge(what))
}

impl<W: Write> Write for ContainerWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size = buf.len()))]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current.as_mut() {
            Some((_, data)) => data.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "No entry has been started",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Write a complete container from a map of entries in one go.
pub fn write_container<'a, I>(entries: I, options: ContainerWriterOptions) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a ResourceId, &'a Vec<u8>)>,
{
    let mut writer = ContainerWriter::new(Vec::new(), options);
    for (id, data) in entries {
        writer.insert(id.clone(), data.clone());
    }
    writer.finish()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use kotor_common::{ResourceId, ResourceKind};
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use crate::error::Result;
    use crate::read::test::vanilla_rim;
    use crate::types::ContainerType;
    use crate::write::{ContainerWriter, ContainerWriterOptions};

    fn txt(name: &str) -> Result<ResourceId> {
        Ok(ResourceId::new(name, ResourceKind::Txt)?)
    }

    #[traced_test]
    #[test]
    fn rim_matches_shipped_layout() -> Result<()> {
        let mut writer = ContainerWriter::new(
            Vec::new(),
            ContainerWriterOptions::builder()
                .container_type(ContainerType::Rim)
                .build(),
        );
        writer.insert(txt("3")?, b"ghi".to_vec());
        writer.start_entry(txt("1")?)?;
        writer.write_all(b"abc")?;
        writer.start_entry(txt("2")?)?;
        writer.write_all(b"de")?;
        writer.write_all(b"f")?;

        let actual = writer.finish()?;
        assert_str_eq!(
            format!("{:02X?}", actual),
            format!("{:02X?}", vanilla_rim())
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn empty_erf() -> Result<()> {
        #[rustfmt::skip]
        let mut expected = vec![
            b'E', b'R', b'F', b' ', b'V', b'1', b'.', b'0',
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0xA0, 0x00, 0x00, 0x00,
            0xA0, 0x00, 0x00, 0x00,
            0xA0, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0xFF, 0xFF, 0xFF, 0xFF,
        ];
        expected.extend([0u8; 116]);

        let actual = ContainerWriter::new(Vec::new(), ContainerWriterOptions::default()).finish()?;
        assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));
        Ok(())
    }

    #[test]
    fn sav_description_and_strings() -> Result<()> {
        let mut writer = ContainerWriter::new(
            Vec::new(),
            ContainerWriterOptions::builder()
                .container_type(ContainerType::Sav)
                .localized_strings([(3, "Bonjour".to_string()), (0, "Hi".to_string())].into())
                .build(),
        );
        writer.insert(txt("a")?, b"x".to_vec());
        let bytes = writer.finish()?;

        assert_eq!(&bytes[..8], b"SAV V1.0");
        // language count, string block size
        assert_eq!(&bytes[8..16], &[2u8, 0, 0, 0, 25, 0, 0, 0][..]);
        // description strref defaults to zero for saves
        assert_eq!(&bytes[40..44], &0u32.to_le_bytes()[..]);
        // ascending language order
        assert_eq!(&bytes[160..170], &[0u8, 0, 0, 0, 2, 0, 0, 0, b'H', b'i'][..]);
        assert_eq!(&bytes[170..174], &3u32.to_le_bytes()[..]);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn insert_replaces() -> Result<()> {
        let mut writer = ContainerWriter::new(Vec::new(), ContainerWriterOptions::default());
        writer.insert(txt("a")?, b"old".to_vec());
        writer.insert(txt("A")?, b"new".to_vec());
        let bytes = writer.finish()?;

        assert_eq!(&bytes[16..20], &1u32.to_le_bytes()[..]);
        assert!(bytes.ends_with(b"new"));
        assert!(logs_contain("replaced an entry"));
        Ok(())
    }

    #[test]
    fn write_without_entry_fails() {
        let mut writer = ContainerWriter::new(Vec::new(), ContainerWriterOptions::default());
        assert!(!writer.is_writing_entry());
        assert!(writer.write_all(b"orphan").is_err());
    }
}
