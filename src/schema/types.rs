//! Column kinds and decoded values for table schemas

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Primitive column kind, as named in the table catalog
///
/// The set is closed: signed/unsigned integers of 1/2/4/8 bytes, 32-bit
/// float, string reference, pointer, bitfields and enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    /// 32-bit byte offset into the container's text region
    Str,
    /// 32-bit pointer, kept as an opaque integer
    Ptr,
    Bit8,
    Bit16,
    Bit32,
    Bit64,
    Enum8,
    Enum16,
}

impl ColumnKind {
    /// Fixed byte width of this kind within a row
    pub fn byte_width(self) -> usize {
        match self {
            ColumnKind::S8 | ColumnKind::U8 | ColumnKind::Bit8 | ColumnKind::Enum8 => 1,
            ColumnKind::S16 | ColumnKind::U16 | ColumnKind::Bit16 | ColumnKind::Enum16 => 2,
            ColumnKind::S32
            | ColumnKind::U32
            | ColumnKind::F32
            | ColumnKind::Str
            | ColumnKind::Ptr
            | ColumnKind::Bit32 => 4,
            ColumnKind::S64 | ColumnKind::U64 | ColumnKind::Bit64 => 8,
        }
    }

    /// Bit width of the parent integer for bitfield kinds
    pub fn bit_width(self) -> Option<u32> {
        match self {
            ColumnKind::Bit8 => Some(8),
            ColumnKind::Bit16 => Some(16),
            ColumnKind::Bit32 => Some(32),
            ColumnKind::Bit64 => Some(64),
            _ => None,
        }
    }

    pub fn is_bitfield(self) -> bool {
        self.bit_width().is_some()
    }

    pub fn is_enum(self) -> bool {
        matches!(self, ColumnKind::Enum8 | ColumnKind::Enum16)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ColumnKind::S8 | ColumnKind::S16 | ColumnKind::S32 | ColumnKind::S64
        )
    }
}

impl FromStr for ColumnKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "s8" => ColumnKind::S8,
            "u8" => ColumnKind::U8,
            "s16" => ColumnKind::S16,
            "u16" => ColumnKind::U16,
            "s32" => ColumnKind::S32,
            "u32" => ColumnKind::U32,
            "s64" => ColumnKind::S64,
            "u64" => ColumnKind::U64,
            "f32" => ColumnKind::F32,
            "str" => ColumnKind::Str,
            "ptr" => ColumnKind::Ptr,
            "bit8" => ColumnKind::Bit8,
            "bit16" => ColumnKind::Bit16,
            "bit32" => ColumnKind::Bit32,
            "bit64" => ColumnKind::Bit64,
            "enum8" => ColumnKind::Enum8,
            "enum16" => ColumnKind::Enum16,
            other => return Err(Error::Schema(format!("unknown column type '{}'", other))),
        })
    }
}

/// Display format for a decoded value in text output
///
/// Parsed from catalog format strings such as `"d"`, `"X"` or `"04X"`
/// (an optional zero-pad width followed by the conversion letter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFormat {
    pub width: usize,
    pub conv: Conversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conversion {
    #[default]
    Decimal,
    HexLower,
    HexUpper,
}

impl FromStr for DisplayFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(last) = s.chars().last() else {
            return Ok(DisplayFormat::default());
        };
        let (width_str, conv_char) = s.split_at(s.len() - last.len_utf8());
        let conv = match conv_char {
            "d" => Conversion::Decimal,
            "x" => Conversion::HexLower,
            "X" => Conversion::HexUpper,
            other => {
                return Err(Error::Schema(format!(
                    "unsupported format conversion '{}'",
                    other
                )))
            }
        };
        let width = if width_str.is_empty() {
            0
        } else {
            width_str
                .parse()
                .map_err(|_| Error::Schema(format!("invalid format string '{}'", s)))?
        };
        Ok(DisplayFormat { width, conv })
    }
}

impl DisplayFormat {
    pub fn render_unsigned(&self, value: u64) -> String {
        match self.conv {
            Conversion::Decimal => format!("{:0width$}", value, width = self.width),
            Conversion::HexLower => format!("{:0width$x}", value, width = self.width),
            Conversion::HexUpper => format!("{:0width$X}", value, width = self.width),
        }
    }

    /// Floats have no hex form; only the zero-pad width applies
    pub fn render_float(&self, value: f32) -> String {
        format!("{:0width$}", value, width = self.width)
    }

    pub fn render_signed(&self, value: i64) -> String {
        match self.conv {
            Conversion::Decimal => format!("{:0width$}", value, width = self.width),
            Conversion::HexLower => format!("{:0width$x}", value, width = self.width),
            Conversion::HexUpper => format!("{:0width$X}", value, width = self.width),
        }
    }
}

/// One decoded field value within a row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    /// String reference: the raw offset is kept so encode can reproduce
    /// the original bytes; the text is filled in when a resolver is given.
    StrRef { offset: u32, text: Option<String> },
    /// Enum value: raw integer plus the matched (or fallback) label
    Enum { raw: u64, label: String },
    /// Raw bytes of a gap field
    Bytes(Vec<u8>),
}

impl Value {
    /// Render the value using the column's display format
    pub fn render(&self, format: &DisplayFormat) -> String {
        match self {
            Value::Signed(v) => format.render_signed(*v),
            Value::Unsigned(v) => format.render_unsigned(*v),
            Value::Float(v) => format.render_float(*v),
            Value::StrRef { offset, text } => match text {
                Some(s) => s.clone(),
                None => format.render_unsigned(*offset as u64),
            },
            Value::Enum { label, .. } => label.clone(),
            Value::Bytes(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    out.push_str(&format!("{:02x}", b));
                }
                out
            }
        }
    }

    /// Underlying integer value, if the variant has one
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Signed(v) => Some(*v as u64),
            Value::StrRef { offset, .. } => Some(*offset as u64),
            Value::Enum { raw, .. } => Some(*raw),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&DisplayFormat::default()))
    }
}
