//! Shared building blocks for reading *Knights of the Old Republic* game data.
//!
//! Every storage tier of an installation (the `chitin.key` catalog, ERF/RIM containers and the
//! loose `override` directory) addresses its contents with the same key: a [`ResourceId`], which
//! pairs a case-insensitive [`ResRef`] name with a [`ResourceKind`].
//!
//! | Type             | On disk                                                        |
//! |------------------|----------------------------------------------------------------|
//! | [`ResRef`]       | 16 bytes, NUL padded ASCII (archives) or length prefixed (GFF) |
//! | [`ResourceKind`] | `u16` type id in key tables, `u32` in RIM and BIF records      |
//!
//! The crate also hosts [`HandlePool`], the bounded set of open read handles shared by the
//! archive readers of one installation, and [`path::resolve_path`], which finds files whose on-disk
//! spelling differs in case from the names recorded in game data.

pub mod error;
pub mod id;
pub mod kind;
pub mod path;
pub mod pool;
pub mod resref;

pub use id::ResourceId;
pub use kind::ResourceKind;
pub use pool::HandlePool;
pub use resref::ResRef;
