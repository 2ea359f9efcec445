//! This library handles reading from and creating **ERF** and **RIM** containers used by *Knights of
//! the Old Republic*.
//!
//! # Container Format Documentation
//!
//! A container bundles many named resources into one file with an entry table in front of the raw
//! payloads. Modules (`.mod`), saves (`.sav`), hak packs (`.hak`) and generic `.erf` files share the
//! rich ERF layout; `.rim` files use a simpler layout without the description block. Payloads are
//! never compressed. All integers are little endian.
//!
//! ## ERF File Structure
//!
//! | Offset (bytes) | Field                  | Description                                            |
//! |----------------|------------------------|--------------------------------------------------------|
//! | 0x0000         | File Type              | 4 bytes: `ERF `, `MOD `, `SAV ` or `HAK `              |
//! | 0x0004         | Version                | 4 bytes: fixed value `V1.0`                            |
//! | 0x0008         | Language Count         | 4 bytes: number of localized description strings       |
//! | 0x000C         | Localized String Size  | 4 bytes: size of the description block                 |
//! | 0x0010         | Entry Count            | 4 bytes: number of resources                           |
//! | 0x0014         | Localized String Offset| 4 bytes: offset to the description block               |
//! | 0x0018         | Key Offset             | 4 bytes: offset to the key table                       |
//! | 0x001C         | Resource Offset        | 4 bytes: offset to the resource table                  |
//! | 0x0020         | Build Year             | 4 bytes: years since 1900                              |
//! | 0x0024         | Build Day              | 4 bytes: days since January 1st                        |
//! | 0x0028         | Description StrRef     | 4 bytes: `dialog.tlk` reference, `0xFFFFFFFF` for none |
//! | 0x002C         | Reserved               | 116 bytes: zero                                        |
//!
//! The description block holds, per language, a `u32` language id, a `u32` length and the text.
//!
//! ### Key record (24 bytes)
//!
//! | Offset | Field       | Description                                  |
//! |--------|-------------|----------------------------------------------|
//! | 0x00   | ResRef      | 16 bytes: NUL padded resource name           |
//! | 0x10   | Resource ID | 4 bytes: index of the entry                  |
//! | 0x14   | Type        | 2 bytes: resource type id                    |
//! | 0x16   | Unused      | 2 bytes                                      |
//!
//! ### Resource record (8 bytes)
//!
//! | Offset | Field  | Description                                        |
//! |--------|--------|----------------------------------------------------|
//! | 0x00   | Offset | 4 bytes: offset of the payload from start of file  |
//! | 0x04   | Size   | 4 bytes: size of the payload                       |
//!
//! ## RIM File Structure
//!
//! | Offset (bytes) | Field           | Description                                   |
//! |----------------|-----------------|-----------------------------------------------|
//! | 0x0000         | File Type       | 4 bytes: `RIM `                               |
//! | 0x0004         | Version         | 4 bytes: fixed value `V1.0`                   |
//! | 0x0008         | Reserved        | 4 bytes                                       |
//! | 0x000C         | Entry Count     | 4 bytes: number of resources                  |
//! | 0x0010         | Key Offset      | 4 bytes: zero in shipped files, meaning 0x78  |
//! | 0x0014         | Resource Offset | 4 bytes: unused                               |
//! | 0x0018         | Reserved        | 96 bytes                                      |
//!
//! Each 32 byte RIM key carries the NUL padded resref, a `u32` type id, a `u32` resource id and the
//! absolute offset and size of its payload.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.erf`, `.mod`, `.sav`, `.hak`, `.nwm`, `.rim`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - Entries are written sorted by resource id, which makes output reproducible.
//!

pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use read::{ContainerArchive, ContainerEntry, ContainerFile, ContainerIndex};
pub use types::ContainerType;
pub use write::{write_container, ContainerWriter, ContainerWriterOptions};
