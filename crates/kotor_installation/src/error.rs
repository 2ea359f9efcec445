//! Error types that can be emitted from this library

use std::path::PathBuf;

use kotor_common::ResourceId;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`kotor_common::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Common(#[from] kotor_common::error::Error),

    /// Transparent wrapper for [`kotor_key::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] kotor_key::error::Error),

    /// Transparent wrapper for [`kotor_erf::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Container(#[from] kotor_erf::error::Error),

    /// no provider holds the requested id
    #[error("{0} not found in installation")]
    NotFound(ResourceId),

    /// the installation has not finished loading
    #[error("installation is not loaded")]
    #[diagnostic(help("call `Installation::load` first"))]
    NotReady,

    /// the progress callback asked to stop loading
    #[error("loading was cancelled")]
    Cancelled,

    /// a provider could not be opened
    #[error("unable to open {}: {reason}", path.display())]
    #[diagnostic(code(kotor_installation::provider_unavailable))]
    ProviderUnavailable { path: PathBuf, reason: String },

    /// the node has no bytes of its own
    #[error("{0} is a directory")]
    NotAFile(String),
}

impl Error {
    /// Whether this is the ordinary "absent resource" outcome
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Catalog(e) => e.is_not_found(),
            Error::Container(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
