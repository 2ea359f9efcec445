//! Resource lookup over a whole *Knights of the Old Republic* installation.
//!
//! A game resource can live in three places. Lookups consult them in this order and the first hit
//! wins:
//!
//! | Priority | Provider          | On disk                                               |
//! |----------|-------------------|-------------------------------------------------------|
//! | 1        | Loose directory   | `override/`, scanned recursively                      |
//! | 2        | Containers        | `.mod`, `.erf`, `.sav`, `.rim` files in `modules/` etc |
//! | 3        | Base archives     | BIFs listed by `chitin.key`                           |
//!
//! Containers rank among themselves by registration order: the scanned directories in the order
//! given by [`InstallationOptions::container_dirs`], each sorted by case-insensitive file name,
//! followed by [`InstallationOptions::extra_containers`].
//!
//! [`VirtualTree`] offers the same installation as a lazily expanded tree of directories, container
//! files and the entries inside them, for browsing.
//!

pub mod error;
pub mod installation;
pub mod options;
pub mod provider;
pub mod tree;

pub use installation::{
    Enumerate, Installation, LoadProgress, LoadState, RefreshReport, Resource,
};
pub use options::InstallationOptions;
pub use provider::{Provenance, ProviderWarning, ResourceProvider};
pub use tree::{NodeKind, VirtualNode, VirtualTree};
