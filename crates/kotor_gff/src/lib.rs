//! This library handles reading from and creating **GFF** files used by *Knights of the Old Republic*.
//!
//! # GFF V3.2 Format Documentation
//!
//! The Generic File Format stores a tree of structs. Every struct holds a set of labelled, typed
//! fields, and fields may themselves hold a nested struct or a list of structs. Most structured game
//! data (blueprints `.ut?`, areas `.are`/`.git`, dialogues `.dlg`, module info `.ifo`) is a GFF.
//!
//! ## File Structure
//!
//! A GFF file is a 56 byte header followed by six tables. All integers are little endian.
//!
//! | Offset (bytes) | Field                  | Description                                        |
//! |----------------|------------------------|----------------------------------------------------|
//! | 0x0000         | File Type              | 4 bytes: content type, e.g. `UTD `                 |
//! | 0x0004         | Version                | 4 bytes: fixed value `V3.2`                        |
//! | 0x0008         | Struct Offset / Count  | 2 × 4 bytes: 12 byte struct records               |
//! | 0x0010         | Field Offset / Count   | 2 × 4 bytes: 12 byte field records                |
//! | 0x0018         | Label Offset / Count   | 2 × 4 bytes: 16 byte NUL padded labels            |
//! | 0x0020         | Field Data Offset/Size | 2 × 4 bytes: variable sized values                |
//! | 0x0028         | Field Indices Off/Size | 2 × 4 bytes: `u32` field indices per struct       |
//! | 0x0030         | List Indices Off/Size  | 2 × 4 bytes: `u32` count + struct indices per list |
//!
//! ### Struct records
//!
//! | Offset | Field          | Description                                                     |
//! |--------|----------------|-----------------------------------------------------------------|
//! | 0x00   | Struct ID      | opaque kind, root is usually `0xFFFFFFFF`                       |
//! | 0x04   | Data or Offset | the field index for one field, else an offset into field indices |
//! | 0x08   | Field Count    | number of fields                                                |
//!
//! Struct 0 is always the root.
//!
//! ### Field records
//!
//! | Offset | Field          | Description                                                 |
//! |--------|----------------|-------------------------------------------------------------|
//! | 0x00   | Type           | one of the 18 [`FieldType`] tags                            |
//! | 0x04   | Label Index    | index into the label table                                  |
//! | 0x08   | Data or Offset | inline value, struct index, or offset into data/list tables |
//!
//! `UInt8` to `Int32` and `Single` are stored inline, with signed 8 and 16 bit values sign
//! extended. `Struct` stores a struct index and `List` an offset into the list indices. Everything
//! else is an offset into the field data block:
//!
//! - **UInt64 / Int64 / Double**: 8 bytes
//! - **String**: `u32` length, then bytes
//! - **ResRef**: `u8` length, then at most 16 bytes
//! - **LocString**: `u32` size of what follows, `u32` string ref (`0xFFFFFFFF` for none), `u32`
//!   substring count, then `u32` id, `u32` length and bytes for each substring
//! - **Binary**: `u32` length, then bytes
//! - **Vector3 / Vector4**: 3 or 4 `f32`
//!
//! ## Decoding untrusted input
//!
//! [`decode`] never panics and never reads outside its buffer. Structural violations are reported as
//! [`Error::MalformedTree`](error::Error::MalformedTree); a buffer shorter than the header is
//! [`Error::TruncatedData`](error::Error::TruncatedData).
//!
//! ```
//! use kotor_gff::{decode, encode, Gff, TreeStruct};
//!
//! fn main() -> kotor_gff::error::Result<()> {
//!     let mut gff = Gff::default();
//!     gff.root.insert("Tag", "door01")?;
//!     gff.root.insert("Locked", 1u8)?;
//!     gff.root.insert("Trap", TreeStruct::new(0).with("DC", 15u8)?)?;
//!
//!     let bytes = encode(&gff)?;
//!     assert_eq!(decode(&bytes)?, gff);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod read;
pub mod tree;
pub mod types;
pub mod write;

pub use read::{decode, decode_struct};
pub use tree::{Field, Gff, Label, LocalizedString, TreeList, TreeStruct};
pub use types::{FieldType, FileType};
pub use write::{encode, encode_struct};
