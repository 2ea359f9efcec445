//! Decoding GFF documents from untrusted byte buffers.
//!
//! The tree is walked with an explicit work stack: every struct is visited at most once, so cycles
//! and shared subtrees are rejected instead of recursing or expanding. All offsets and counts are
//! checked against the buffer before anything is dereferenced or allocated.

use std::io::Cursor;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian};
use kotor_common::ResRef;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    tree::{Field, Gff, Label, LocalizedString, TreeList, TreeStruct},
    types::{FieldRecord, FieldType, GffHeader, Section, StructRecord},
};

/// Decode a complete GFF document.
#[instrument(skip_all, err, fields(len = data.len()))]
pub fn decode(data: &[u8]) -> Result<Gff> {
    let reader = GffReader::new(data)?;
    let root = reader.read_tree()?;
    debug!(file_type = %reader.header.file_type, fields = root.len(), "decoded gff");

    Ok(Gff {
        file_type: reader.header.file_type,
        root,
    })
}

/// Decode a GFF document and keep only its root struct.
pub fn decode_struct(data: &[u8]) -> Result<TreeStruct> {
    decode(data).map(|gff| gff.root)
}

/// A bounds checked view of one table
#[derive(Clone, Copy)]
struct Span<'a> {
    what: &'static str,
    data: &'a [u8],
}

impl<'a> Span<'a> {
    fn bytes(&self, pos: u64, len: u64) -> Result<&'a [u8]> {
        match pos.checked_add(len) {
            Some(end) if end <= self.data.len() as u64 => Ok(&self.data[pos as usize..end as usize]),
            _ => Err(Error::malformed(format!(
                "{len} bytes at offset {pos} run past the end of the {} ({} bytes)",
                self.what,
                self.data.len()
            ))),
        }
    }

    fn u8(&self, pos: u64) -> Result<u8> {
        Ok(self.bytes(pos, 1)?[0])
    }

    fn u32(&self, pos: u64) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(pos, 4)?))
    }

    fn record<T>(&self, index: usize, size: usize) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()> + binrw::meta::ReadEndian,
    {
        let raw = self.bytes((index * size) as u64, size as u64)?;
        Ok(T::read(&mut Cursor::new(raw))?)
    }
}

/// A field before its struct and list references are resolved
enum Pending {
    Value(Field),
    Struct(usize),
    List(Vec<usize>),
}

/// A visited struct whose children are still being decoded
struct Node {
    index: usize,
    struct_id: u32,
    fields: Vec<(Label, Pending)>,
}

struct GffReader<'a> {
    header: GffHeader,
    structs: Span<'a>,
    fields: Span<'a>,
    labels: Vec<Label>,
    field_data: Span<'a>,
    field_indices: Span<'a>,
    list_indices: Span<'a>,
}

impl<'a> GffReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < GffHeader::SIZE {
            return Err(Error::TruncatedData {
                expected: GffHeader::SIZE as u64,
                actual: data.len() as u64,
            });
        }
        if &data[4..8] != GffHeader::VERSION {
            return Err(Error::malformed(format!(
                "unsupported version {:?}",
                String::from_utf8_lossy(&data[4..8])
            )));
        }

        let header = GffHeader::read(&mut Cursor::new(data))?;
        let whole = Span { what: "file", data };
        let table = |what: &'static str, section: Section, width: u64| -> Result<Span<'a>> {
            let len = section.count as u64 * width;
            whole
                .bytes(section.offset as u64, len)
                .map(|data| Span { what, data })
                .map_err(|_| {
                    Error::malformed(format!(
                        "{what} ({len} bytes at offset {}) extends past the end of the file ({} bytes)",
                        section.offset,
                        data.len()
                    ))
                })
        };

        let structs = table("struct table", header.structs, StructRecord::SIZE as u64)?;
        let fields = table("field table", header.fields, FieldRecord::SIZE as u64)?;
        let labels = table("label table", header.labels, 16)?;
        let field_data = table("field data", header.field_data, 1)?;
        let field_indices = table("field indices", header.field_indices, 1)?;
        let list_indices = table("list indices", header.list_indices, 1)?;

        let labels = labels
            .data
            .chunks_exact(16)
            .enumerate()
            .map(|(i, raw)| {
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                let text = std::str::from_utf8(&raw[..end])
                    .map_err(|_| Error::malformed(format!("label {i} is not valid UTF-8")))?;
                Label::new(text)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            structs,
            fields,
            labels,
            field_data,
            field_indices,
            list_indices,
        })
    }

    fn struct_count(&self) -> usize {
        self.header.structs.count as usize
    }

    fn read_tree(&self) -> Result<TreeStruct> {
        let struct_count = self.struct_count();
        if struct_count == 0 {
            return Err(Error::malformed("struct table is empty"));
        }

        let mut seen_structs = vec![false; struct_count];
        let mut seen_fields = vec![false; self.header.fields.count as usize];
        let mut visited = Vec::new();
        let mut stack = vec![0usize];
        seen_structs[0] = true;

        while let Some(index) = stack.pop() {
            let record: StructRecord = self.structs.record(index, StructRecord::SIZE)?;
            let mut fields = Vec::new();

            for field_index in self.struct_fields(&record)? {
                let seen = seen_fields.get_mut(field_index).ok_or_else(|| {
                    Error::malformed(format!(
                        "struct {index} references field {field_index}, but there are only {} fields",
                        self.header.fields.count
                    ))
                })?;
                if std::mem::replace(seen, true) {
                    return Err(Error::malformed(format!(
                        "field {field_index} is shared by more than one struct"
                    )));
                }

                let (label, value) = self.field(field_index)?;
                let children = match &value {
                    Pending::Value(_) => &[][..],
                    Pending::Struct(child) => std::slice::from_ref(child),
                    Pending::List(children) => children.as_slice(),
                };
                for &child in children {
                    if std::mem::replace(&mut seen_structs[child], true) {
                        return Err(Error::malformed(format!(
                            "struct {child} is referenced more than once"
                        )));
                    }
                    stack.push(child);
                }
                fields.push((label, value));
            }

            visited.push(Node {
                index,
                struct_id: record.struct_id,
                fields,
            });
        }

        // children are always visited after their parent, so building in reverse visiting order
        // finds every child already assembled
        let mut built: Vec<Option<TreeStruct>> = Vec::new();
        built.resize_with(struct_count, || None);
        for node in visited.into_iter().rev() {
            let mut tree = TreeStruct::with_capacity(node.struct_id, node.fields.len());
            for (label, value) in node.fields {
                let field = match value {
                    Pending::Value(field) => field,
                    Pending::Struct(child) => Field::Struct(take(&mut built, child)?),
                    Pending::List(children) => Field::List(
                        children
                            .into_iter()
                            .map(|child| take(&mut built, child))
                            .collect::<Result<TreeList>>()?,
                    ),
                };
                if tree.fields.contains_key(&label) {
                    warn!(%label, index = node.index, "duplicate field label, keeping the first");
                    continue;
                }
                tree.fields.insert(label, field);
            }
            built[node.index] = Some(tree);
        }

        take(&mut built, 0)
    }

    fn struct_fields(&self, record: &StructRecord) -> Result<Vec<usize>> {
        Ok(match record.field_count {
            0 => Vec::new(),
            1 => vec![record.data_or_offset as usize],
            count => self
                .field_indices
                .bytes(record.data_or_offset as u64, count as u64 * 4)?
                .chunks_exact(4)
                .map(|raw| LittleEndian::read_u32(raw) as usize)
                .collect(),
        })
    }

    fn struct_index(&self, index: u32) -> Result<usize> {
        let index = index as usize;
        if index >= self.struct_count() {
            return Err(Error::malformed(format!(
                "struct index {index} is out of range ({} structs)",
                self.struct_count()
            )));
        }
        Ok(index)
    }

    fn field(&self, index: usize) -> Result<(Label, Pending)> {
        let record: FieldRecord = self.fields.record(index, FieldRecord::SIZE)?;
        let label = self
            .labels
            .get(record.label_index as usize)
            .cloned()
            .ok_or_else(|| {
                Error::malformed(format!(
                    "field {index} uses label {}, but there are only {} labels",
                    record.label_index,
                    self.labels.len()
                ))
            })?;

        let raw = record.data_or_offset;
        let offset = raw as u64;
        let data = &self.field_data;
        let value = match FieldType::try_from(record.field_type)? {
            FieldType::UInt8 => Field::UInt8(raw as u8),
            FieldType::Int8 => Field::Int8(raw as u8 as i8),
            FieldType::UInt16 => Field::UInt16(raw as u16),
            FieldType::Int16 => Field::Int16(raw as u16 as i16),
            FieldType::UInt32 => Field::UInt32(raw),
            FieldType::Int32 => Field::Int32(raw as i32),
            FieldType::Single => Field::Single(f32::from_bits(raw)),
            FieldType::UInt64 => Field::UInt64(LittleEndian::read_u64(data.bytes(offset, 8)?)),
            FieldType::Int64 => Field::Int64(LittleEndian::read_i64(data.bytes(offset, 8)?)),
            FieldType::Double => Field::Double(LittleEndian::read_f64(data.bytes(offset, 8)?)),
            FieldType::String => {
                let len = data.u32(offset)? as u64;
                let text = data.bytes(offset + 4, len)?;
                Field::String(String::from_utf8_lossy(text).into_owned())
            }
            FieldType::ResRef => {
                let len = data.u8(offset)? as u64;
                let text = data.bytes(offset + 1, len)?;
                let resref = ResRef::new(String::from_utf8_lossy(text)).map_err(|e| {
                    Error::malformed(format!("field {label}: {e}"))
                })?;
                Field::ResRef(resref)
            }
            FieldType::LocString => Field::LocString(self.localized_string(offset)?),
            FieldType::Binary => {
                let len = data.u32(offset)? as u64;
                Field::Binary(data.bytes(offset + 4, len)?.to_vec())
            }
            FieldType::Vector3 => {
                let raw = data.bytes(offset, 12)?;
                let mut v = [0f32; 3];
                LittleEndian::read_f32_into(raw, &mut v);
                Field::Vector3(v)
            }
            FieldType::Vector4 => {
                let raw = data.bytes(offset, 16)?;
                let mut v = [0f32; 4];
                LittleEndian::read_f32_into(raw, &mut v);
                Field::Vector4(v)
            }
            FieldType::Struct => return Ok((label, Pending::Struct(self.struct_index(raw)?))),
            FieldType::List => return Ok((label, Pending::List(self.list(offset)?))),
        };

        Ok((label, Pending::Value(value)))
    }

    fn localized_string(&self, offset: u64) -> Result<LocalizedString> {
        let size = self.field_data.u32(offset)? as u64;
        let block = Span {
            what: "localized string",
            data: self.field_data.bytes(offset + 4, size)?,
        };

        let string_ref = match block.u32(0)? {
            u32::MAX => None,
            string_ref => Some(string_ref),
        };
        let count = block.u32(4)?;

        let mut loc = LocalizedString {
            string_ref,
            ..Default::default()
        };
        let mut pos = 8u64;
        for _ in 0..count {
            let id = block.u32(pos)?;
            let len = block.u32(pos + 4)? as u64;
            let text = block.bytes(pos + 8, len)?;
            loc.substrings
                .insert(id, String::from_utf8_lossy(text).into_owned());
            pos += 8 + len;
        }
        Ok(loc)
    }

    fn list(&self, offset: u64) -> Result<Vec<usize>> {
        let count = self.list_indices.u32(offset)? as u64;
        self.list_indices
            .bytes(offset + 4, count * 4)?
            .chunks_exact(4)
            .map(|raw| self.struct_index(LittleEndian::read_u32(raw)))
            .collect()
    }
}

fn take(built: &mut [Option<TreeStruct>], index: usize) -> Result<TreeStruct> {
    built
        .get_mut(index)
        .and_then(Option::take)
        .ok_or_else(|| Error::malformed(format!("struct {index} could not be assembled")))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, Result};
    use crate::read::decode;
    use crate::tree::{Field, TreeStruct};
    use crate::types::FileType;

    /// `UTD ` root struct with a single `Open` byte field set to 1
    #[rustfmt::skip]
    const SINGLE_FIELD: [u8; 96] = [
        b'U', b'T', b'D', b' ', b'V', b'3', b'.', b'2',
        0x38, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x44, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // struct 0
        0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        // field 0: UInt8, label 0, value 1
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        // label 0
        b'O', b'p', b'e', b'n', 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[traced_test]
    #[test]
    fn read_single_field() -> Result<()> {
        let gff = decode(&SINGLE_FIELD)?;

        assert_eq!(gff.file_type, FileType(*b"UTD "));
        assert_eq!(gff.root, TreeStruct::new(u32::MAX).with("Open", 1u8)?);
        Ok(())
    }

    #[test]
    fn short_buffer_is_truncated() {
        let err = decode(&SINGLE_FIELD[..40]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedData {
                expected: 56,
                actual: 40
            }
        ));
    }

    #[test]
    fn table_past_end_is_malformed() {
        let err = decode(&SINGLE_FIELD[..90]).unwrap_err();
        assert!(matches!(err, Error::MalformedTree { .. }), "{err}");
    }

    #[test]
    fn sign_extended_inline_values() -> Result<()> {
        let mut input = SINGLE_FIELD;
        // Int8 holding -2, written sign extended
        input[68] = 0x01;
        input[76..80].copy_from_slice(&[0xFE, 0xFF, 0xFF, 0xFF]);

        assert_eq!(decode(&input)?.root.get("Open"), Some(&Field::Int8(-2)));
        Ok(())
    }

    #[test]
    fn unknown_field_type() {
        let mut input = SINGLE_FIELD;
        input[68] = 0x20;
        let err = decode(&input).unwrap_err();
        assert!(err.to_string().contains("unknown field type 32"), "{err}");
    }

    #[test]
    fn label_out_of_range() {
        let mut input = SINGLE_FIELD;
        input[72] = 0x05;
        let err = decode(&input).unwrap_err();
        assert!(err.to_string().contains("label 5"), "{err}");
    }

    #[test]
    fn self_referencing_struct() {
        let mut input = SINGLE_FIELD;
        // turn the field into a struct reference to the root
        input[68] = 14;
        input[76] = 0;
        let err = decode(&input).unwrap_err();
        assert!(err.to_string().contains("referenced more than once"), "{err}");
    }
}
