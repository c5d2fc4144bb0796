//! Row decoding and encoding
//!
//! A [`Row`] is one fixed-length record decoded through a shared
//! [`RowLayout`]. Decoding is a pure function of the input bytes plus the
//! immutable layout; string references are resolved through an optional
//! caller-supplied callback and never during schema compilation.

use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::layout::{FieldDecode, RowLayout};
use crate::schema::types::Value;

/// What to do when a decoded enum value has no matching label
///
/// The policy is a required decode parameter so the choice is always
/// explicit at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownEnumPolicy {
    /// Fail the row decode with [`Error::UnknownEnumValue`]
    Fail,
    /// Use the decimal rendering of the raw value as the label
    RawLabel,
}

/// Per-decode settings: string resolution and enum fallback policy
pub struct DecodeContext<'a> {
    resolver: Option<&'a dyn Fn(u32) -> Result<String>>,
    unknown_enum: UnknownEnumPolicy,
}

impl<'a> DecodeContext<'a> {
    pub fn new(unknown_enum: UnknownEnumPolicy) -> Self {
        DecodeContext {
            resolver: None,
            unknown_enum,
        }
    }

    /// Resolve `str` columns through `resolver` instead of keeping the
    /// raw offset only
    pub fn with_resolver(mut self, resolver: &'a dyn Fn(u32) -> Result<String>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// One decoded record
#[derive(Debug, Clone)]
pub struct Row {
    layout: Arc<RowLayout>,
    values: Vec<Value>,
}

impl Row {
    /// Decode exactly `layout.row_length()` bytes into a row
    ///
    /// # Errors
    /// [`Error::MalformedRow`] if the slice length does not match the
    /// layout, [`Error::UnknownEnumValue`] under the `Fail` policy, plus
    /// whatever the string resolver returns.
    pub fn decode(layout: &Arc<RowLayout>, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<Row> {
        if bytes.len() != layout.row_length() {
            return Err(Error::MalformedRow {
                expected: layout.row_length(),
                actual: bytes.len(),
            });
        }

        let mut values = Vec::with_capacity(layout.slot_count());
        for field in layout.fields() {
            let window = &bytes[field.offset..field.offset + field.width];
            match &field.decode {
                FieldDecode::Gap => values.push(Value::Bytes(window.to_vec())),
                FieldDecode::Int { kind } => {
                    if kind.is_signed() {
                        values.push(Value::Signed(LittleEndian::read_int(window, field.width)));
                    } else {
                        values.push(Value::Unsigned(LittleEndian::read_uint(window, field.width)));
                    }
                }
                FieldDecode::Float => values.push(Value::Float(LittleEndian::read_f32(window))),
                FieldDecode::Ptr => {
                    values.push(Value::Unsigned(LittleEndian::read_u32(window) as u64))
                }
                FieldDecode::StrRef => {
                    let offset = LittleEndian::read_u32(window);
                    let text = match ctx.resolver {
                        Some(resolve) => Some(resolve(offset)?),
                        None => None,
                    };
                    values.push(Value::StrRef { offset, text });
                }
                FieldDecode::Bits { subs, .. } => {
                    let raw = LittleEndian::read_uint(window, field.width);
                    values.push(Value::Unsigned(raw));
                    for sub in subs {
                        values.push(Value::Unsigned((raw >> sub.bit_offset) & sub.mask()));
                    }
                }
                FieldDecode::Enum { labels } => {
                    let raw = LittleEndian::read_uint(window, field.width);
                    let label = match labels.get(&raw) {
                        Some(label) => label.clone(),
                        None => match ctx.unknown_enum {
                            UnknownEnumPolicy::Fail => {
                                return Err(Error::UnknownEnumValue {
                                    column: field.name.clone(),
                                    value: raw,
                                })
                            }
                            UnknownEnumPolicy::RawLabel => format!("{}", raw),
                        },
                    };
                    values.push(Value::Enum { raw, label });
                }
            }
        }

        Ok(Row {
            layout: Arc::clone(layout),
            values,
        })
    }

    /// Encode the row back into its byte representation
    ///
    /// Inverse of [`Row::decode`]: string references and enums write their
    /// raw integers back, gap fields copy their stored bytes, and bitfields
    /// recombine sub-field values into the parent by clearing each declared
    /// bit range first, so undeclared parent bits survive unchanged and
    /// `decode(encode(row))` reproduces the row for all field kinds.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; self.layout.row_length()];
        let mut slot = 0usize;

        for field in self.layout.fields() {
            let window = &mut bytes[field.offset..field.offset + field.width];
            let value = &self.values[slot];
            match &field.decode {
                FieldDecode::Gap => {
                    let Value::Bytes(raw) = value else {
                        return Err(Error::Format(format!(
                            "gap field '{}' holds a non-byte value",
                            field.name
                        )));
                    };
                    if raw.len() != field.width {
                        return Err(Error::MalformedRow {
                            expected: field.width,
                            actual: raw.len(),
                        });
                    }
                    window.copy_from_slice(raw);
                }
                FieldDecode::Float => {
                    let Value::Float(v) = value else {
                        return Err(Error::Format(format!(
                            "float field '{}' holds a non-float value",
                            field.name
                        )));
                    };
                    LittleEndian::write_f32(window, *v);
                }
                FieldDecode::Bits { subs, .. } => {
                    let mut raw = self.values[slot].as_u64().unwrap_or(0);
                    for (i, sub) in subs.iter().enumerate() {
                        let sub_value = self.values[slot + 1 + i].as_u64().unwrap_or(0);
                        raw &= !(sub.mask() << sub.bit_offset);
                        raw |= (sub_value & sub.mask()) << sub.bit_offset;
                    }
                    write_uint(window, raw, field.width);
                }
                _ => {
                    let raw = value.as_u64().ok_or_else(|| {
                        Error::Format(format!(
                            "field '{}' holds a value with no integer form",
                            field.name
                        ))
                    })?;
                    write_uint(window, raw, field.width);
                }
            }
            slot += field.slot_count();
        }

        Ok(bytes)
    }

    /// Get a field or bitfield sub-field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout.slot_of(name).map(|slot| &self.values[slot])
    }

    /// All decoded values in slot order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    /// Render the row as one tab-delimited text line
    ///
    /// Bitfield columns render their sub-fields only (the parent raw value
    /// is skipped); gap fields render as lowercase hex byte runs.
    pub fn to_text(&self) -> String {
        let mut words = Vec::new();
        let mut slot = 0usize;
        for field in self.layout.fields() {
            match &field.decode {
                FieldDecode::Bits { subs, .. } => {
                    for (i, sub) in subs.iter().enumerate() {
                        words.push(self.values[slot + 1 + i].render(&sub.format));
                    }
                }
                _ => words.push(self.values[slot].render(&field.format)),
            }
            slot += field.slot_count();
        }
        words.join("\t")
    }
}

/// Write the low `width` bytes of `value` little-endian
///
/// Truncates instead of panicking when the value has more significant
/// bytes than the field.
fn write_uint(window: &mut [u8], value: u64, width: usize) {
    let masked = if width >= 8 {
        value
    } else {
        value & ((1u64 << (width * 8)) - 1)
    };
    LittleEndian::write_uint(window, masked, width);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::layout::{BitFieldSpec, ColumnSpec, RowLayout};
    use crate::schema::types::{ColumnKind, DisplayFormat};
    use std::collections::HashMap;

    fn ctx() -> DecodeContext<'static> {
        DecodeContext::new(UnknownEnumPolicy::Fail)
    }

    #[test]
    fn test_int_float_gap_round_trip() {
        let columns = vec![
            ColumnSpec::new("delta", ColumnKind::S16, 0),
            ColumnSpec::new("count", ColumnKind::U32, 4),
            ColumnSpec::new("rate", ColumnKind::F32, 8),
        ];
        let layout = Arc::new(RowLayout::compile(16, &columns).unwrap());

        let mut bytes = vec![0u8; 16];
        bytes[0..2].copy_from_slice(&(-300i16).to_le_bytes());
        bytes[2..4].copy_from_slice(&[0xAA, 0xBB]); // gap
        bytes[4..8].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes[8..12].copy_from_slice(&1.5f32.to_le_bytes());
        bytes[12..16].copy_from_slice(&[1, 2, 3, 4]); // trailing gap

        let row = Row::decode(&layout, &bytes, &ctx()).unwrap();
        assert_eq!(row.get("delta"), Some(&Value::Signed(-300)));
        assert_eq!(row.get("count"), Some(&Value::Unsigned(0xDEAD_BEEF)));
        assert_eq!(row.get("rate"), Some(&Value::Float(1.5)));
        assert_eq!(row.get("c2"), Some(&Value::Bytes(vec![0xAA, 0xBB])));

        assert_eq!(row.encode().unwrap(), bytes);
    }

    #[test]
    fn test_bitfield_decode_and_round_trip() {
        let columns = vec![ColumnSpec::new("flags", ColumnKind::Bit16, 0).with_bit_fields(vec![
            BitFieldSpec::new("kind", 0, 5),
            BitFieldSpec::new("rank", 5, 3),
            BitFieldSpec::new("tier", 12, 4),
        ])];
        let layout = Arc::new(RowLayout::compile(2, &columns).unwrap());

        // Undeclared bits 8..12 must survive the round trip too
        for raw in [0u16, 0xFFFF, 0xA5C3, 0x1234, 0x0F00] {
            let bytes = raw.to_le_bytes().to_vec();
            let row = Row::decode(&layout, &bytes, &ctx()).unwrap();
            assert_eq!(
                row.get("kind"),
                Some(&Value::Unsigned((raw as u64) & 0x1F))
            );
            assert_eq!(
                row.get("rank"),
                Some(&Value::Unsigned(((raw as u64) >> 5) & 0x7))
            );
            assert_eq!(
                row.get("tier"),
                Some(&Value::Unsigned(((raw as u64) >> 12) & 0xF))
            );
            assert_eq!(row.encode().unwrap(), bytes, "raw {:#06x}", raw);
        }
    }

    #[test]
    fn test_str_ref_resolution_and_round_trip() {
        let columns = vec![ColumnSpec::new("name", ColumnKind::Str, 0)];
        let layout = Arc::new(RowLayout::compile(4, &columns).unwrap());
        let bytes = 0x30u32.to_le_bytes().to_vec();

        let resolve = |offset: u32| -> Result<String> { Ok(format!("text@{}", offset)) };
        let row = Row::decode(&layout, &bytes, &ctx().with_resolver(&resolve)).unwrap();
        assert_eq!(
            row.get("name"),
            Some(&Value::StrRef {
                offset: 0x30,
                text: Some("text@48".into())
            })
        );
        assert_eq!(row.encode().unwrap(), bytes);

        // Without a resolver the raw offset is kept
        let row = Row::decode(&layout, &bytes, &ctx()).unwrap();
        assert_eq!(
            row.get("name"),
            Some(&Value::StrRef {
                offset: 0x30,
                text: None
            })
        );
    }

    #[test]
    fn test_enum_policies() {
        let mut labels = HashMap::new();
        labels.insert(3u64, "Red".to_string());
        let columns =
            vec![ColumnSpec::new("color", ColumnKind::Enum8, 0).with_enum_labels(labels)];
        let layout = Arc::new(RowLayout::compile(1, &columns).unwrap());

        let row = Row::decode(&layout, &[3], &ctx()).unwrap();
        assert_eq!(
            row.get("color"),
            Some(&Value::Enum {
                raw: 3,
                label: "Red".into()
            })
        );
        assert_eq!(row.encode().unwrap(), vec![3]);

        let err = Row::decode(&layout, &[9], &ctx()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownEnumValue { value: 9, .. }
        ));

        let fallback = DecodeContext::new(UnknownEnumPolicy::RawLabel);
        let row = Row::decode(&layout, &[9], &fallback).unwrap();
        assert_eq!(
            row.get("color"),
            Some(&Value::Enum {
                raw: 9,
                label: "9".into()
            })
        );
        assert_eq!(row.encode().unwrap(), vec![9]);
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let columns = vec![ColumnSpec::new("a", ColumnKind::U16, 0)];
        let layout = Arc::new(RowLayout::compile(2, &columns).unwrap());
        let err = Row::decode(&layout, &[1, 2, 3], &ctx()).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedRow {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_to_text() {
        let columns = vec![
            ColumnSpec::new("id", ColumnKind::U8, 0),
            ColumnSpec::new("flags", ColumnKind::Bit8, 1).with_bit_fields(vec![
                BitFieldSpec::new("low", 0, 4),
                BitFieldSpec {
                    name: "high".into(),
                    bit_offset: 4,
                    bit_length: 4,
                    format: "X".parse::<DisplayFormat>().unwrap(),
                },
            ]),
        ];
        let layout = Arc::new(RowLayout::compile(4, &columns).unwrap());
        let row = Row::decode(&layout, &[7, 0xC5, 0xDE, 0xAD], &ctx()).unwrap();
        // bitfield renders sub-fields only; trailing gap renders as hex
        assert_eq!(row.to_text(), "7\t5\tC\tdead");
    }
}
