//! Encoding GFF documents.

use std::io::{Cursor, Write};

use binrw::BinWrite;
use indexmap::IndexSet;
use tracing::{instrument, trace};

use crate::{
    error::{Error, Result},
    tree::{Field, Gff, Label, LocalizedString, TreeStruct},
    types::{FieldRecord, FileType, GffHeader, Section, StructRecord},
};

/// Encode a complete GFF document into a new buffer.
#[instrument(skip_all, err, fields(file_type = %gff.file_type))]
pub fn encode(gff: &Gff) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    write(gff, &mut out)?;
    Ok(out.into_inner())
}

/// Encode a root struct as a generic `GFF ` document.
pub fn encode_struct(root: &TreeStruct) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    GffWriter::build(root)?.finish(FileType::GFF, &mut out)?;
    Ok(out.into_inner())
}

/// Encode a complete GFF document into `writer`.
pub fn write<W: Write>(gff: &Gff, writer: W) -> Result<()> {
    GffWriter::build(&gff.root)?.finish(gff.file_type, writer)
}

/// Working tables collected while walking the tree
#[derive(Default)]
struct GffWriter<'t> {
    structs: Vec<StructRecord>,
    fields: Vec<FieldRecord>,
    labels: IndexSet<&'t Label>,
    field_data: Vec<u8>,
    field_indices: Vec<u8>,
    list_indices: Vec<u8>,
}

fn offset(value: usize, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Overflow(what))
}

impl<'t> GffWriter<'t> {
    /// Walk the tree, assigning every struct its slot before any of its children.
    fn build(root: &'t TreeStruct) -> Result<Self> {
        let mut writer = Self::default();
        let mut stack = vec![(writer.reserve_struct(), root)];

        while let Some((slot, tree)) = stack.pop() {
            let first = writer.fields.len();
            for (label, field) in tree.iter() {
                let record = writer.field(label, field, &mut stack)?;
                writer.fields.push(record);
            }

            let field_count = tree.len();
            let data_or_offset = match field_count {
                0 => u32::MAX,
                1 => offset(first, "field table")?,
                _ => {
                    let start = offset(writer.field_indices.len(), "field indices")?;
                    for index in first..first + field_count {
                        let index = offset(index, "field table")?;
                        writer.field_indices.extend_from_slice(&index.to_le_bytes());
                    }
                    start
                }
            };

            writer.structs[slot] = StructRecord {
                struct_id: tree.struct_id,
                data_or_offset,
                field_count: offset(field_count, "field table")?,
            };
        }

        trace!(
            structs = writer.structs.len(),
            fields = writer.fields.len(),
            labels = writer.labels.len(),
            "built gff tables"
        );
        Ok(writer)
    }

    fn reserve_struct(&mut self) -> usize {
        self.structs.push(StructRecord::default());
        self.structs.len() - 1
    }

    fn field(
        &mut self,
        label: &'t Label,
        field: &'t Field,
        stack: &mut Vec<(usize, &'t TreeStruct)>,
    ) -> Result<FieldRecord> {
        let (label_index, _) = self.labels.insert_full(label);
        let data_or_offset = match field {
            Field::UInt8(v) => *v as u32,
            Field::Int8(v) => *v as i32 as u32,
            Field::UInt16(v) => *v as u32,
            Field::Int16(v) => *v as i32 as u32,
            Field::UInt32(v) => *v,
            Field::Int32(v) => *v as u32,
            Field::Single(v) => v.to_bits(),
            Field::UInt64(v) => self.data(&[&v.to_le_bytes()[..]])?,
            Field::Int64(v) => self.data(&[&v.to_le_bytes()[..]])?,
            Field::Double(v) => self.data(&[&v.to_le_bytes()[..]])?,
            Field::String(text) => {
                let len = offset(text.len(), "string field")?;
                self.data(&[&len.to_le_bytes()[..], text.as_bytes()])?
            }
            Field::ResRef(resref) => {
                // at most 16 bytes
                let len = resref.len() as u8;
                self.data(&[&[len][..], resref.as_str().as_bytes()])?
            }
            Field::LocString(loc) => self.localized_string(loc)?,
            Field::Binary(bytes) => {
                let len = offset(bytes.len(), "binary field")?;
                self.data(&[&len.to_le_bytes()[..], &bytes[..]])?
            }
            Field::Vector3(v) => {
                let raw: Vec<u8> = v.iter().flat_map(|f| f.to_le_bytes()).collect();
                self.data(&[&raw[..]])?
            }
            Field::Vector4(v) => {
                let raw: Vec<u8> = v.iter().flat_map(|f| f.to_le_bytes()).collect();
                self.data(&[&raw[..]])?
            }
            Field::Struct(child) => {
                let slot = self.reserve_struct();
                stack.push((slot, child));
                offset(slot, "struct table")?
            }
            Field::List(children) => {
                let start = offset(self.list_indices.len(), "list indices")?;
                let count = offset(children.len(), "list")?;
                self.list_indices.extend_from_slice(&count.to_le_bytes());
                for child in children {
                    let slot = self.reserve_struct();
                    stack.push((slot, child));
                    let slot = offset(slot, "struct table")?;
                    self.list_indices.extend_from_slice(&slot.to_le_bytes());
                }
                start
            }
        };

        Ok(FieldRecord {
            field_type: field.field_type() as u32,
            label_index: offset(label_index, "label table")?,
            data_or_offset,
        })
    }

    /// Append `parts` to the field data block, returning where they start.
    fn data(&mut self, parts: &[&[u8]]) -> Result<u32> {
        let start = offset(self.field_data.len(), "field data")?;
        for part in parts {
            self.field_data.extend_from_slice(part);
        }
        offset(self.field_data.len(), "field data")?;
        Ok(start)
    }

    fn localized_string(&mut self, loc: &LocalizedString) -> Result<u32> {
        let mut body = Vec::new();
        body.extend_from_slice(&loc.string_ref.unwrap_or(u32::MAX).to_le_bytes());
        body.extend_from_slice(&offset(loc.substrings.len(), "localized string")?.to_le_bytes());
        for (id, text) in &loc.substrings {
            body.extend_from_slice(&id.to_le_bytes());
            body.extend_from_slice(&offset(text.len(), "localized string")?.to_le_bytes());
            body.extend_from_slice(text.as_bytes());
        }
        let size = offset(body.len(), "localized string")?;
        self.data(&[&size.to_le_bytes()[..], &body[..]])
    }

    fn finish<W: Write>(self, file_type: FileType, mut writer: W) -> Result<()> {
        let mut position = GffHeader::SIZE;
        let mut section = |count: usize, width: usize, what: &'static str| -> Result<Section> {
            let section = Section {
                offset: offset(position, what)?,
                count: offset(count, what)?,
            };
            position += count * width;
            Ok(section)
        };

        let header = GffHeader {
            file_type,
            structs: section(self.structs.len(), StructRecord::SIZE, "struct table")?,
            fields: section(self.fields.len(), FieldRecord::SIZE, "field table")?,
            labels: section(self.labels.len(), 16, "label table")?,
            field_data: section(self.field_data.len(), 1, "field data")?,
            field_indices: section(self.field_indices.len(), 1, "field indices")?,
            list_indices: section(self.list_indices.len(), 1, "list indices")?,
        };
        offset(position, "file")?;

        let mut out = Cursor::new(Vec::with_capacity(position));
        header.write(&mut out)?;
        for record in &self.structs {
            record.write(&mut out)?;
        }
        for record in &self.fields {
            record.write(&mut out)?;
        }
        for label in &self.labels {
            let mut raw = [0u8; 16];
            raw[..label.as_str().len()].copy_from_slice(label.as_str().as_bytes());
            out.write_all(&raw)?;
        }
        out.write_all(&self.field_data)?;
        out.write_all(&self.field_indices)?;
        out.write_all(&self.list_indices)?;

        writer.write_all(out.get_ref())?;
        Ok(())
    }
}
