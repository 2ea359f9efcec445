//! This library handles reading from and creating the **KEY** catalog and **BIF** base archives used
//! by *Knights of the Old Republic*.
//!
//! # KEY/BIF Format Documentation
//!
//! The shipped game data lives in numbered BIF archives below `data/`. BIFs carry no names; the
//! `chitin.key` file in the installation root maps every resource name to an `(archive, entry)`
//! position. All integers are little endian.
//!
//! ## KEY File Structure
//!
//! | Offset (bytes) | Field            | Description                                     |
//! |----------------|------------------|-------------------------------------------------|
//! | 0x0000         | File Type        | 4 bytes: `KEY `                                 |
//! | 0x0004         | Version          | 4 bytes: `V1  `                                 |
//! | 0x0008         | BIF Count        | 4 bytes: number of archives                     |
//! | 0x000C         | Key Count        | 4 bytes: number of resources                    |
//! | 0x0010         | File Table       | 4 bytes: offset to the archive records          |
//! | 0x0014         | Key Table        | 4 bytes: offset to the key records              |
//! | 0x0018         | Build Year       | 4 bytes: years since 1900                       |
//! | 0x001C         | Build Day        | 4 bytes: days since January 1st                 |
//! | 0x0020         | Reserved         | 32 bytes                                        |
//!
//! Each 12 byte file record holds the archive size, the offset and length of its NUL terminated
//! name (relative to the root, `\` separated) and a drive bitmask. Each 22 byte key record holds a
//! 16 byte resref, a `u16` type id and a `u32` locator: the top 12 bits select the archive, the low
//! 20 bits the entry inside it.
//!
//! ## BIF File Structure
//!
//! | Offset (bytes) | Field            | Description                                     |
//! |----------------|------------------|-------------------------------------------------|
//! | 0x0000         | File Type        | 4 bytes: `BIFF`                                 |
//! | 0x0004         | Version          | 4 bytes: `V1  `                                 |
//! | 0x0008         | Variable Count   | 4 bytes: number of payloads                     |
//! | 0x000C         | Fixed Count      | 4 bytes: always zero                            |
//! | 0x0010         | Variable Table   | 4 bytes: offset to the variable records         |
//!
//! Each 16 byte variable record holds the locator, the absolute offset and size of the payload and
//! a `u32` type id.
//!

pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use read::{BifFile, Catalog, CatalogEntry};
pub use types::Locator;
pub use write::{CatalogFiles, CatalogWriter, CatalogWriterOptions};
