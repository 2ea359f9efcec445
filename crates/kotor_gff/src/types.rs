//! Base types for the on-disk structure of a GFF file.

use std::fmt;

use binrw::{BinRead, BinWrite};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Four character content type at the start of every GFF file, e.g. `UTD ` or `DLG `.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[brw(little)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct FileType(pub [u8; 4]);

impl FileType {
    /// The generic `GFF ` type
    pub const GFF: FileType = FileType(*b"GFF ");

    /// Derive the conventional file type from a resource kind's extension, e.g. `utd` -> `UTD `.
    pub fn for_kind(kind: kotor_common::ResourceKind) -> Self {
        let mut raw = *b"    ";
        for (slot, b) in raw.iter_mut().zip(kind.extension().bytes()) {
            *slot = b.to_ascii_uppercase();
        }
        FileType(raw)
    }
}

impl Default for FileType {
    fn default() -> Self {
        Self::GFF
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl TryFrom<String> for FileType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let raw: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| Error::malformed(format!("file type {value:?} is not 4 bytes")))?;
        Ok(FileType(raw))
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        value.to_string()
    }
}

/// Location of one table inside the file.
///
/// For the struct, field and label tables `count` is a number of records; for the field data,
/// field indices and list indices blocks it is a number of bytes.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Section {
    pub offset: u32,
    pub count: u32,
}

/// GFF file header
///
/// A four character file type followed by the version `V3.2` and the six table sections.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct GffHeader {
    pub file_type: FileType,

    #[brw(magic = b"V3.2")]
    pub structs: Section,
    pub fields: Section,
    pub labels: Section,
    pub field_data: Section,
    pub field_indices: Section,
    pub list_indices: Section,
}

impl GffHeader {
    pub const SIZE: usize = 56;
    pub const VERSION: &'static [u8; 4] = b"V3.2";
}

/// Entry in the struct table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct StructRecord {
    /// Opaque struct kind, carried through unchanged
    pub struct_id: u32,

    /// Field index when there is exactly one field, otherwise a byte offset into the field indices
    pub data_or_offset: u32,

    pub field_count: u32,
}

impl StructRecord {
    pub const SIZE: usize = 12;
}

/// Entry in the field table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FieldRecord {
    pub field_type: u32,
    pub label_index: u32,

    /// Inline value for small scalars, a struct index, or an offset into field data / list indices
    pub data_or_offset: u32,
}

impl FieldRecord {
    pub const SIZE: usize = 12;
}

/// Numeric field type tags
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FieldType {
    UInt8 = 0,
    Int8 = 1,
    UInt16 = 2,
    Int16 = 3,
    UInt32 = 4,
    Int32 = 5,
    UInt64 = 6,
    Int64 = 7,
    Single = 8,
    Double = 9,
    String = 10,
    ResRef = 11,
    LocString = 12,
    Binary = 13,
    Struct = 14,
    List = 15,
    Vector4 = 16,
    Vector3 = 17,
}

impl FieldType {
    /// Whether the value lives in the field record itself
    pub const fn is_inline(self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::Int8
                | Self::UInt16
                | Self::Int16
                | Self::UInt32
                | Self::Int32
                | Self::Single
        )
    }
}

impl TryFrom<u32> for FieldType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use FieldType::*;
        Ok(match value {
            0 => UInt8,
            1 => Int8,
            2 => UInt16,
            3 => Int16,
            4 => UInt32,
            5 => Int32,
            6 => UInt64,
            7 => Int64,
            8 => Single,
            9 => Double,
            10 => String,
            11 => ResRef,
            12 => LocString,
            13 => Binary,
            14 => Struct,
            15 => List,
            16 => Vector4,
            17 => Vector3,
            other => return Err(Error::malformed(format!("unknown field type {other}"))),
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::types::{FieldType, FileType, GffHeader, Section};

    #[rustfmt::skip]
    const HEADER: [u8; 56] = [
        b'U', b'T', b'D', b' ', b'V', b'3', b'.', b'2',
        0x38, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x44, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    fn expected_header() -> GffHeader {
        GffHeader {
            file_type: FileType(*b"UTD "),
            structs: Section { offset: 56, count: 1 },
            fields: Section { offset: 68, count: 1 },
            labels: Section { offset: 80, count: 1 },
            field_data: Section { offset: 96, count: 0 },
            field_indices: Section { offset: 96, count: 0 },
            list_indices: Section { offset: 96, count: 0 },
        }
    }

    #[test]
    fn read_header() -> Result<()> {
        let header = GffHeader::read(&mut Cursor::new(HEADER))?;
        assert_eq!(header, expected_header());
        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        let mut actual = Vec::new();
        expected_header().write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, HEADER);
        Ok(())
    }

    #[test]
    fn rejects_other_versions() {
        let mut input = HEADER;
        input[4..8].copy_from_slice(b"V4.0");
        assert!(GffHeader::read(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn field_types() {
        assert_eq!(FieldType::try_from(17).ok(), Some(FieldType::Vector3));
        assert!(FieldType::try_from(18).is_err());
        assert!(FieldType::Single.is_inline());
        assert!(!FieldType::Double.is_inline());
    }

    #[test]
    fn file_type_for_kind() {
        use kotor_common::ResourceKind;

        assert_eq!(FileType::for_kind(ResourceKind::Utd), FileType(*b"UTD "));
        assert_eq!(FileType::for_kind(ResourceKind::TwoDa), FileType(*b"2DA "));
        assert_eq!(FileType::default().to_string(), "GFF ");
    }
}
