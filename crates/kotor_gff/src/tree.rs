//! In-memory representation of a decoded GFF tree.

use std::{borrow::Borrow, collections::BTreeMap, fmt};

use derive_more::derive::{AsRef, Deref, DerefMut, Display, From, Index, IntoIterator};
use indexmap::IndexMap;
use kotor_common::ResRef;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{FieldType, FileType},
};

/// A field label of at most [`Label::MAX_LEN`] bytes, unique within its struct.
///
/// Unlike resource names, labels are compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRef)]
#[display("{_0}")]
#[as_ref(str)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct Label(String);

impl Label {
    pub const MAX_LEN: usize = 16;

    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.len() > Self::MAX_LEN {
            return Err(Error::InvalidLabel(label));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Label {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Label {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Label {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.0
    }
}

/// A string table reference plus per-language overrides.
///
/// Substrings are keyed by `language * 2 + gender`, where gender is `0` for masculine/neutral and
/// `1` for feminine text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalizedString {
    /// Index into `dialog.tlk`, or `None` when the file stores `0xFFFFFFFF`
    pub string_ref: Option<u32>,
    pub substrings: BTreeMap<u32, String>,
}

impl LocalizedString {
    pub fn from_string_ref(string_ref: u32) -> Self {
        Self {
            string_ref: Some(string_ref),
            substrings: BTreeMap::new(),
        }
    }

    pub const fn substring_id(language: u32, feminine: bool) -> u32 {
        language * 2 + feminine as u32
    }

    pub fn get(&self, language: u32, feminine: bool) -> Option<&str> {
        self.substrings
            .get(&Self::substring_id(language, feminine))
            .map(String::as_str)
    }

    pub fn set(&mut self, language: u32, feminine: bool, text: impl Into<String>) {
        self.substrings
            .insert(Self::substring_id(language, feminine), text.into());
    }
}

/// A typed field value
#[derive(Debug, Clone, PartialEq, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Field {
    UInt8(u8),
    Int8(i8),
    UInt16(u16),
    Int16(i16),
    UInt32(u32),
    Int32(i32),
    UInt64(u64),
    Int64(i64),
    Single(f32),
    Double(f64),
    String(String),
    ResRef(ResRef),
    LocString(LocalizedString),
    Binary(Vec<u8>),
    Struct(TreeStruct),
    List(TreeList),
    Vector4([f32; 4]),
    Vector3([f32; 3]),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::UInt8(_) => FieldType::UInt8,
            Field::Int8(_) => FieldType::Int8,
            Field::UInt16(_) => FieldType::UInt16,
            Field::Int16(_) => FieldType::Int16,
            Field::UInt32(_) => FieldType::UInt32,
            Field::Int32(_) => FieldType::Int32,
            Field::UInt64(_) => FieldType::UInt64,
            Field::Int64(_) => FieldType::Int64,
            Field::Single(_) => FieldType::Single,
            Field::Double(_) => FieldType::Double,
            Field::String(_) => FieldType::String,
            Field::ResRef(_) => FieldType::ResRef,
            Field::LocString(_) => FieldType::LocString,
            Field::Binary(_) => FieldType::Binary,
            Field::Struct(_) => FieldType::Struct,
            Field::List(_) => FieldType::List,
            Field::Vector4(_) => FieldType::Vector4,
            Field::Vector3(_) => FieldType::Vector3,
        }
    }

    pub fn as_struct(&self) -> Option<&TreeStruct> {
        match self {
            Field::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TreeList> {
        match self {
            Field::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) => Some(s),
            Field::ResRef(r) => Some(r.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

/// A set of labelled fields plus an opaque struct kind.
///
/// Field order is kept for encoding, but two structs compare equal whenever they hold the same
/// labelled values, whatever the order.
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeStruct {
    pub struct_id: u32,
    pub fields: IndexMap<Label, Field>,
}

impl TreeStruct {
    /// Struct kind conventionally used by the root of a file
    pub const ROOT_ID: u32 = u32::MAX;

    pub fn new(struct_id: u32) -> Self {
        Self {
            struct_id,
            fields: IndexMap::new(),
        }
    }

    pub fn with_capacity(struct_id: u32, capacity: usize) -> Self {
        Self {
            struct_id,
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Set a field, returning the value it replaced.
    pub fn insert(&mut self, label: &str, value: impl Into<Field>) -> Result<Option<Field>> {
        Ok(self.fields.insert(Label::new(label)?, value.into()))
    }

    /// Builder form of [`TreeStruct::insert`]
    pub fn with(mut self, label: &str, value: impl Into<Field>) -> Result<Self> {
        self.insert(label, value)?;
        Ok(self)
    }

    pub fn get(&self, label: &str) -> Option<&Field> {
        self.fields.get(label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Field> {
        self.fields.get_mut(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<Field> {
        self.fields.shift_remove(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.fields.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, &Field)> {
        self.fields.iter()
    }
}

impl fmt::Debug for TreeStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeStruct({:#x}) ", self.struct_id)?;
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// An ordered sequence of structs; each element may carry its own kind and fields.
#[derive(
    Debug, Clone, Default, PartialEq, Deref, DerefMut, From, Index, IntoIterator,
)]
#[into_iterator(owned, ref, ref_mut)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TreeList(Vec<TreeStruct>);

impl TreeList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<TreeStruct> for TreeList {
    fn from_iter<T: IntoIterator<Item = TreeStruct>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A complete GFF document: file type plus root struct.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gff {
    pub file_type: FileType,
    pub root: TreeStruct,
}

impl Gff {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            root: TreeStruct::new(TreeStruct::ROOT_ID),
        }
    }

    /// Decode a GFF document from a byte buffer
    pub fn read(data: &[u8]) -> Result<Self> {
        crate::read::decode(data)
    }

    /// Encode this document into a new byte buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::write::encode(self)
    }
}

impl Default for Gff {
    fn default() -> Self {
        Self::new(FileType::GFF)
    }
}
