//! Row schema compilation
//!
//! A table catalog declares rows as an ordered list of named columns at
//! fixed byte offsets. [`RowLayout::compile`] turns that declaration into
//! an explicit field plan: declared columns plus synthesized gap fields
//! covering every undeclared byte range, so the fields always partition
//! `[0, row_length)`. The layout is immutable after compilation and is
//! shared by every row decoded from it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::types::{ColumnKind, DisplayFormat};

/// One named sub-field of a bitfield column
#[derive(Debug, Clone)]
pub struct BitFieldSpec {
    pub name: String,
    /// Bit offset from the least significant bit of the parent value
    pub bit_offset: u32,
    /// Number of bits
    pub bit_length: u32,
    pub format: DisplayFormat,
}

impl BitFieldSpec {
    pub fn new(name: impl Into<String>, bit_offset: u32, bit_length: u32) -> Self {
        BitFieldSpec {
            name: name.into(),
            bit_offset,
            bit_length,
            format: DisplayFormat::default(),
        }
    }

    /// Mask of the sub-field, already shifted to bit position zero
    pub(crate) fn mask(&self) -> u64 {
        if self.bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_length) - 1
        }
    }
}

/// One declared column of a row schema
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Byte offset within the row
    pub offset: usize,
    pub format: DisplayFormat,
    /// Sub-fields for bitfield kinds, empty otherwise
    pub bit_fields: Vec<BitFieldSpec>,
    /// Value-to-label mapping for enum kinds, empty otherwise
    pub enum_labels: HashMap<u64, String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind, offset: usize) -> Self {
        ColumnSpec {
            name: name.into(),
            kind,
            offset,
            format: DisplayFormat::default(),
            bit_fields: Vec::new(),
            enum_labels: HashMap::new(),
        }
    }

    pub fn with_format(mut self, format: DisplayFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_bit_fields(mut self, bit_fields: Vec<BitFieldSpec>) -> Self {
        self.bit_fields = bit_fields;
        self
    }

    pub fn with_enum_labels(mut self, labels: HashMap<u64, String>) -> Self {
        self.enum_labels = labels;
        self
    }
}

/// Decode rule of one compiled field
#[derive(Debug, Clone)]
pub(crate) enum FieldDecode {
    /// Undeclared byte range, kept as raw bytes
    Gap,
    Int {
        kind: ColumnKind,
    },
    Float,
    StrRef,
    Ptr,
    Bits {
        subs: Vec<BitFieldSpec>,
    },
    Enum {
        labels: HashMap<u64, String>,
    },
}

/// One compiled field of a row layout
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub name: String,
    pub offset: usize,
    pub width: usize,
    pub format: DisplayFormat,
    pub decode: FieldDecode,
}

impl Field {
    /// Number of value slots this field occupies in a decoded row
    ///
    /// Bitfields expand to the parent raw value plus one slot per sub-field.
    pub fn slot_count(&self) -> usize {
        match &self.decode {
            FieldDecode::Bits { subs, .. } => 1 + subs.len(),
            _ => 1,
        }
    }
}

/// Compiled, immutable field plan for one row
#[derive(Debug)]
pub struct RowLayout {
    row_length: usize,
    fields: Vec<Field>,
    /// Field and sub-field names resolved to value slot indices once,
    /// at compile time
    slots: HashMap<String, usize>,
    slot_count: usize,
}

impl RowLayout {
    /// Compile an ordered column list into a row layout
    ///
    /// Columns must be given in ascending offset order. Gap fields named
    /// `c<offset>` are synthesized for every byte range not claimed by a
    /// declared column.
    ///
    /// # Errors
    /// Returns [`Error::Schema`] for overlapping or out-of-order columns,
    /// a column extending past `row_length`, bit sub-fields exceeding or
    /// overlapping within the parent's bit width, or duplicate field names.
    pub fn compile(row_length: usize, columns: &[ColumnSpec]) -> Result<RowLayout> {
        let mut fields = Vec::new();
        let mut cursor = 0usize;

        for column in columns {
            if column.offset < cursor {
                return Err(Error::Schema(format!(
                    "column '{}' at offset {} overlaps the previous column ending at {}",
                    column.name, column.offset, cursor
                )));
            }
            if column.offset > cursor {
                fields.push(Field {
                    name: format!("c{}", cursor),
                    offset: cursor,
                    width: column.offset - cursor,
                    format: DisplayFormat::default(),
                    decode: FieldDecode::Gap,
                });
            }

            let width = column.kind.byte_width();
            if column.offset + width > row_length {
                return Err(Error::Schema(format!(
                    "column '{}' at offset {} ({} bytes) extends past row length {}",
                    column.name, column.offset, width, row_length
                )));
            }

            fields.push(Self::compile_column(column, width)?);
            cursor = column.offset + width;
        }

        if cursor < row_length {
            fields.push(Field {
                name: format!("c{}", cursor),
                offset: cursor,
                width: row_length - cursor,
                format: DisplayFormat::default(),
                decode: FieldDecode::Gap,
            });
        }

        let mut slots = HashMap::new();
        let mut slot_count = 0usize;
        for field in &fields {
            if slots.insert(field.name.clone(), slot_count).is_some() {
                return Err(Error::Schema(format!("duplicate field name '{}'", field.name)));
            }
            slot_count += 1;
            if let FieldDecode::Bits { subs, .. } = &field.decode {
                for sub in subs {
                    if slots.insert(sub.name.clone(), slot_count).is_some() {
                        return Err(Error::Schema(format!(
                            "duplicate field name '{}'",
                            sub.name
                        )));
                    }
                    slot_count += 1;
                }
            }
        }

        Ok(RowLayout {
            row_length,
            fields,
            slots,
            slot_count,
        })
    }

    fn compile_column(column: &ColumnSpec, width: usize) -> Result<Field> {
        let decode = if let Some(bit_width) = column.kind.bit_width() {
            let mut claimed = 0u64;
            for sub in &column.bit_fields {
                let end = sub.bit_offset.checked_add(sub.bit_length);
                if sub.bit_length == 0 || end.map_or(true, |e| e > bit_width) {
                    return Err(Error::Schema(format!(
                        "bit sub-field '{}' ({} bits at {}) exceeds the {}-bit parent '{}'",
                        sub.name, sub.bit_length, sub.bit_offset, bit_width, column.name
                    )));
                }
                let mask = sub.mask() << sub.bit_offset;
                if claimed & mask != 0 {
                    return Err(Error::Schema(format!(
                        "bit sub-field '{}' overlaps another sub-field of '{}'",
                        sub.name, column.name
                    )));
                }
                claimed |= mask;
            }
            FieldDecode::Bits {
                subs: column.bit_fields.clone(),
            }
        } else if column.kind.is_enum() {
            FieldDecode::Enum {
                labels: column.enum_labels.clone(),
            }
        } else {
            match column.kind {
                ColumnKind::F32 => FieldDecode::Float,
                ColumnKind::Str => FieldDecode::StrRef,
                ColumnKind::Ptr => FieldDecode::Ptr,
                kind => FieldDecode::Int { kind },
            }
        };

        Ok(Field {
            name: column.name.clone(),
            offset: column.offset,
            width,
            format: column.format,
            decode,
        })
    }

    /// Total row byte length
    pub fn row_length(&self) -> usize {
        self.row_length
    }

    /// Number of value slots in a decoded row
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Resolve a field or sub-field name to its value slot index
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Names of all fields in byte order, including gaps
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_synthesizes_gaps() {
        let columns = vec![
            ColumnSpec::new("id", ColumnKind::U16, 2),
            ColumnSpec::new("price", ColumnKind::U32, 8),
        ];
        let layout = RowLayout::compile(16, &columns).unwrap();

        let names: Vec<&str> = layout.field_names().collect();
        assert_eq!(names, vec!["c0", "id", "c4", "price", "c12"]);

        // Fields partition [0, row_length)
        let mut cursor = 0;
        for field in layout.fields() {
            assert_eq!(field.offset, cursor);
            cursor += field.width;
        }
        assert_eq!(cursor, 16);
    }

    #[test]
    fn test_compile_full_coverage_no_gaps() {
        let columns = vec![
            ColumnSpec::new("a", ColumnKind::U32, 0),
            ColumnSpec::new("b", ColumnKind::U32, 4),
        ];
        let layout = RowLayout::compile(8, &columns).unwrap();
        let names: Vec<&str> = layout.field_names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_compile_rejects_overlap() {
        let columns = vec![
            ColumnSpec::new("a", ColumnKind::U32, 0),
            ColumnSpec::new("b", ColumnKind::U16, 2),
        ];
        assert!(matches!(
            RowLayout::compile(8, &columns),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_compile_rejects_out_of_bounds() {
        let columns = vec![ColumnSpec::new("a", ColumnKind::U64, 4)];
        assert!(matches!(
            RowLayout::compile(8, &columns),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_compile_rejects_wide_bit_sub_field() {
        let columns = vec![ColumnSpec::new("flags", ColumnKind::Bit8, 0)
            .with_bit_fields(vec![BitFieldSpec::new("hi", 6, 4)])];
        assert!(matches!(
            RowLayout::compile(1, &columns),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_compile_rejects_bit_sub_field_offset_overflow() {
        // offset + length must not wrap around u32
        let columns = vec![ColumnSpec::new("flags", ColumnKind::Bit8, 0)
            .with_bit_fields(vec![BitFieldSpec::new("bad", u32::MAX, 1)])];
        assert!(matches!(
            RowLayout::compile(1, &columns),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_compile_rejects_overlapping_bit_sub_fields() {
        let columns = vec![ColumnSpec::new("flags", ColumnKind::Bit16, 0).with_bit_fields(vec![
            BitFieldSpec::new("a", 0, 4),
            BitFieldSpec::new("b", 3, 2),
        ])];
        assert!(matches!(
            RowLayout::compile(2, &columns),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_bitfield_slots() {
        let columns = vec![
            ColumnSpec::new("flags", ColumnKind::Bit8, 0).with_bit_fields(vec![
                BitFieldSpec::new("low", 0, 4),
                BitFieldSpec::new("high", 4, 4),
            ]),
            ColumnSpec::new("id", ColumnKind::U8, 1),
        ];
        let layout = RowLayout::compile(2, &columns).unwrap();
        assert_eq!(layout.slot_count(), 4);
        assert_eq!(layout.slot_of("flags"), Some(0));
        assert_eq!(layout.slot_of("low"), Some(1));
        assert_eq!(layout.slot_of("high"), Some(2));
        assert_eq!(layout.slot_of("id"), Some(3));
        assert_eq!(layout.slot_of("missing"), None);
    }

    #[test]
    fn test_compile_rejects_duplicate_names() {
        let columns = vec![
            ColumnSpec::new("a", ColumnKind::U8, 0),
            ColumnSpec::new("a", ColumnKind::U8, 1),
        ];
        assert!(matches!(
            RowLayout::compile(2, &columns),
            Err(Error::Schema(_))
        ));
    }
}
