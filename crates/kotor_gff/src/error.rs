//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`kotor_common::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Common(#[from] kotor_common::error::Error),

    /// the buffer violates the structure of a GFF file
    #[error("malformed tree: {reason}")]
    #[diagnostic(code(kotor_gff::malformed_tree))]
    MalformedTree { reason: String },

    /// the buffer ends before the fixed header does
    #[error("truncated data: expected at least {expected} bytes, found {actual}")]
    TruncatedData { expected: u64, actual: u64 },

    /// field labels are at most 16 bytes
    #[error("invalid field label {0:?}: expected at most 16 bytes")]
    InvalidLabel(String),

    /// a table grew past what a 32 bit offset can address
    #[error("{0} does not fit in a 32 bit offset")]
    Overflow(&'static str),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedTree {
            reason: reason.into(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
