//! Error types that can be emitted from this library

use kotor_common::ResourceId;
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

    /// header or entry table violates the container format
    #[error("corrupt archive: {reason}")]
    #[diagnostic(code(kotor_erf::corrupt_archive))]
    CorruptArchive { reason: String },

    /// the source ends before the fixed header does
    #[error("truncated data: expected at least {expected} bytes, found {actual}")]
    TruncatedData { expected: u64, actual: u64 },

    /// the container holds no entry for the requested id
    #[error("{0} not found in container")]
    NotFound(ResourceId),

    /// the archive would not be addressable with 32 bit offsets
    #[error("{0} does not fit in a 32 bit offset")]
    TooLarge(&'static str),
}

impl Error {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            reason: reason.into(),
        }
    }

    /// Whether this is the ordinary "absent resource" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
