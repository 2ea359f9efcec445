//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// name is longer than 16 bytes or is not ASCII
    #[error("invalid resref {0:?}: expected at most 16 ASCII characters")]
    #[diagnostic(help("resource names are limited to 16 ASCII characters"))]
    InvalidResRef(String),

    /// file extension does not name a known resource kind
    #[error("unknown resource extension {0:?}")]
    UnknownExtension(String),

    /// file name has no `.ext` suffix
    #[error("file name {0:?} has no extension")]
    MissingExtension(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
