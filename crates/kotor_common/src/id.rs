//! The `(name, kind)` key shared by every storage tier.

use std::{cmp::Ordering, fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    kind::ResourceKind,
    resref::ResRef,
};

/// Identifies one logical resource within a provider.
///
/// Equality and hashing follow [`ResRef`] (case-insensitive) on the name and are exact on the
/// kind. Ordering sorts by folded name, then by type id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceId {
    pub resref: ResRef,
    pub kind: ResourceKind,
}

impl ResourceId {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Result<Self> {
        Ok(Self {
            resref: ResRef::new(name)?,
            kind,
        })
    }

    /// Parse `stem.ext`. The extension is matched case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let (stem, ext) = filename
            .rsplit_once('.')
            .ok_or_else(|| Error::MissingExtension(filename.to_string()))?;
        let kind = ResourceKind::from_extension(ext)
            .ok_or_else(|| Error::UnknownExtension(ext.to_string()))?;
        Self::new(stem, kind)
    }

    /// `name.ext` in the original spelling of the name
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resref, self.kind.extension())
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_filename(s)
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.resref
            .cmp(&other.resref)
            .then_with(|| self.kind.id().cmp(&other.kind.id()))
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
