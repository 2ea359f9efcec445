//! Case-insensitive resource names.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use derive_more::derive::{AsRef, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A resource name of at most [`ResRef::MAX_LEN`] ASCII bytes.
///
/// The original spelling is kept for display, but equality, ordering and hashing ignore ASCII case,
/// so `DOOR01` and `door01` name the same resource.
#[derive(Clone, Default, Display, AsRef)]
#[display("{_0}")]
#[as_ref(str)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ResRef(String);

impl ResRef {
    /// Maximum length of a resref in bytes
    pub const MAX_LEN: usize = 16;

    /// Create a resref, validating its length and character set.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.len() > Self::MAX_LEN || !name.is_ascii() {
            return Err(Error::InvalidResRef(name));
        }
        Ok(Self(name))
    }

    /// Decode the NUL padded 16 byte form used in archive key tables.
    pub fn from_raw(raw: &[u8; 16]) -> Result<Self> {
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        let name = &raw[..end];
        if !name.is_ascii() {
            return Err(Error::InvalidResRef(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        // ASCII was checked above
        Ok(Self(name.iter().map(|b| *b as char).collect()))
    }

    /// Encode to the NUL padded 16 byte form used in archive key tables.
    pub fn to_raw(&self) -> [u8; 16] {
        let mut raw = [0u8; 16];
        raw[..self.0.len()].copy_from_slice(self.0.as_bytes());
        raw
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The case-folded form used for comparisons
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl fmt::Debug for ResRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResRef({:?})", self.0)
    }
}

impl PartialEq for ResRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ResRef {}

impl Hash for ResRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded() {
            state.write_u8(b);
        }
        state.write_u8(0xff);
    }
}

impl Ord for ResRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for ResRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for ResRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ResRef {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResRef> for String {
    fn from(value: ResRef) -> Self {
        value.0
    }
}
