//! Base types for the on-disk structure of ERF and RIM containers.

use std::fmt;

use binrw::{BinRead, BinWrite};
use kotor_common::ResourceKind;

/// The container flavours sharing the ERF/RIM layouts.
///
/// `Erf`, `Mod`, `Sav` and `Hak` use the rich 160 byte header; `Rim` uses the simple 120 byte one.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ContainerType {
    #[default]
    Erf,
    Mod,
    Sav,
    Hak,
    Rim,
}

impl ContainerType {
    pub const fn magic(self) -> &'static [u8; 4] {
        match self {
            ContainerType::Erf => b"ERF ",
            ContainerType::Mod => b"MOD ",
            ContainerType::Sav => b"SAV ",
            ContainerType::Hak => b"HAK ",
            ContainerType::Rim => b"RIM ",
        }
    }

    pub fn from_magic(magic: &[u8; 4]) -> Option<Self> {
        Some(match magic {
            b"ERF " => ContainerType::Erf,
            b"MOD " => ContainerType::Mod,
            b"SAV " => ContainerType::Sav,
            b"HAK " => ContainerType::Hak,
            b"RIM " => ContainerType::Rim,
            _ => return None,
        })
    }

    /// Container type conventionally stored under a resource kind's extension
    pub const fn from_kind(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::Erf => Some(ContainerType::Erf),
            ResourceKind::Mod | ResourceKind::Nwm => Some(ContainerType::Mod),
            ResourceKind::Sav => Some(ContainerType::Sav),
            ResourceKind::Hak => Some(ContainerType::Hak),
            ResourceKind::Rim => Some(ContainerType::Rim),
            _ => None,
        }
    }

    pub const fn kind(self) -> ResourceKind {
        match self {
            ContainerType::Erf => ResourceKind::Erf,
            ContainerType::Mod => ResourceKind::Mod,
            ContainerType::Sav => ResourceKind::Sav,
            ContainerType::Hak => ResourceKind::Hak,
            ContainerType::Rim => ResourceKind::Rim,
        }
    }

    pub const fn is_rim(self) -> bool {
        matches!(self, ContainerType::Rim)
    }

    /// Description string reference written when the caller does not choose one
    pub const fn default_description_strref(self) -> u32 {
        match self {
            ContainerType::Sav => 0,
            _ => u32::MAX,
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerType::Erf => "ERF",
            ContainerType::Mod => "MOD",
            ContainerType::Sav => "SAV",
            ContainerType::Hak => "HAK",
            ContainerType::Rim => "RIM",
        })
    }
}

/// Version tag shared by every container flavour
pub const VERSION: &[u8; 4] = b"V1.0";

/// Rich container header
///
/// Starts with the four character file type and `V1.0`, 160 bytes in total.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ErfHeader {
    pub file_type: [u8; 4],

    #[brw(magic = b"V1.0")]
    pub language_count: u32,
    pub localized_string_size: u32,
    pub entry_count: u32,
    pub offset_to_localized_strings: u32,

    /// Zero means directly after the header
    pub offset_to_keys: u32,

    /// Zero means directly after the key table
    pub offset_to_resources: u32,
    pub build_year: u32,
    pub build_day: u32,

    #[brw(pad_after = 116)]
    pub description_strref: u32,
}

impl ErfHeader {
    pub const SIZE: u64 = 160;
}

/// Rich container key record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ErfKey {
    pub resref: [u8; 16],

    /// Per entry synchronization number
    pub resource_id: u32,

    #[brw(pad_after = 2)]
    pub res_type: u16,
}

impl ErfKey {
    pub const SIZE: u64 = 24;
}

/// Rich container resource record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ErfResource {
    /// Absolute offset from the start of the container
    pub offset: u32,
    pub size: u32,
}

impl ErfResource {
    pub const SIZE: u64 = 8;
}

/// Simple container header, 120 bytes
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"RIM V1.0")]
pub struct RimHeader {
    pub reserved: u32,
    pub entry_count: u32,

    /// Zero means directly after the header
    pub offset_to_keys: u32,

    #[brw(pad_after = 96)]
    pub offset_to_resources: u32,
}

impl RimHeader {
    pub const SIZE: u64 = 120;
}

/// Simple container key record, carrying its own offset and size
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RimKey {
    pub resref: [u8; 16],
    pub res_type: u32,
    pub resource_id: u32,

    /// Absolute offset from the start of the container
    pub offset: u32,
    pub size: u32,
}

impl RimKey {
    pub const SIZE: u64 = 32;
}
