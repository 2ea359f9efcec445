//! Base types for the on-disk structure of KEY and BIF files.

use binrw::{BinRead, BinWrite};

/// Version tag shared by KEY and BIF files
pub const VERSION: &[u8; 4] = b"V1  ";

/// KEY file header, 64 bytes
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"KEY V1  ")]
pub struct KeyHeader {
    pub bif_count: u32,
    pub key_count: u32,
    pub offset_to_file_table: u32,
    pub offset_to_key_table: u32,
    pub build_year: u32,

    #[brw(pad_after = 32)]
    pub build_day: u32,
}

impl KeyHeader {
    pub const SIZE: u64 = 64;
}

/// One base archive listed by the KEY file
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct KeyFileRecord {
    pub file_size: u32,
    pub filename_offset: u32,

    /// Includes the NUL terminator
    pub filename_size: u16,
    pub drives: u16,
}

impl KeyFileRecord {
    pub const SIZE: u64 = 12;
}

/// One resource listed by the KEY file
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct KeyRecord {
    pub resref: [u8; 16],
    pub res_type: u16,
    pub locator: Locator,
}

impl KeyRecord {
    pub const SIZE: u64 = 22;
}

/// Packed `(archive_index, entry_index)` pair
///
/// The top 12 bits select the archive, the low 20 bits the entry inside it.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct Locator(pub u32);

impl Locator {
    pub const MAX_ARCHIVES: u32 = 1 << 12;
    pub const MAX_ENTRIES: u32 = 1 << 20;

    pub fn new(archive_index: u16, entry_index: u32) -> Option<Self> {
        if archive_index as u32 >= Self::MAX_ARCHIVES || entry_index >= Self::MAX_ENTRIES {
            return None;
        }
        Some(Self((archive_index as u32) << 20 | entry_index))
    }

    pub const fn archive_index(self) -> u16 {
        (self.0 >> 20) as u16
    }

    pub const fn entry_index(self) -> u32 {
        self.0 & (Self::MAX_ENTRIES - 1)
    }
}

/// BIF file header, 20 bytes
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"BIFFV1  ")]
pub struct BifHeader {
    pub variable_count: u32,

    /// Unused by the games, always zero
    pub fixed_count: u32,
    pub offset_to_variable_table: u32,
}

impl BifHeader {
    pub const SIZE: u64 = 20;
}

/// One payload inside a BIF
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct BifRecord {
    pub locator: Locator,

    /// Absolute offset from the start of the BIF
    pub offset: u32,
    pub size: u32,
    pub res_type: u32,
}

impl BifRecord {
    pub const SIZE: u64 = 16;
}
