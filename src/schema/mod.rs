//! Table row schemas and decoding
//!
//! Fantasy Life stores game data as flat tables of fixed-length rows inside
//! SCR containers. This module compiles a declarative column list into a
//! [`RowLayout`] once per schema, then decodes rows through it:
//!
//! - integers, floats, pointers and string references at fixed offsets
//! - bitfield columns expanded into named sub-fields
//! - enum columns mapped to display labels
//! - gap fields synthesized for undeclared byte ranges
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fltools::schema::{ColumnSpec, ColumnKind, RowLayout, Row, DecodeContext, UnknownEnumPolicy};
//!
//! let columns = vec![
//!     ColumnSpec::new("id", ColumnKind::U16, 0),
//!     ColumnSpec::new("price", ColumnKind::U32, 4),
//! ];
//! let layout = Arc::new(RowLayout::compile(8, &columns)?);
//! let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
//! let row = Row::decode(&layout, &[7, 0, 0, 0, 100, 0, 0, 0], &ctx)?;
//! assert_eq!(row.get("price").and_then(|v| v.as_u64()), Some(100));
//! # Ok::<(), fltools::Error>(())
//! ```

mod layout;
mod row;
mod table;
mod types;

pub use layout::{BitFieldSpec, ColumnSpec, RowLayout};
pub use row::{DecodeContext, Row, UnknownEnumPolicy};
pub use table::Table;
pub use types::{ColumnKind, Conversion, DisplayFormat, Value};
