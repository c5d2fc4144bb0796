//! # fltools
//!
//! A Rust library for extracting and decoding Fantasy Life game assets.
//!
//! ## Overview
//!
//! Fantasy Life ships its game data in two simple binary containers:
//!
//! - `.bin` sub-archives: a flat table of contents naming byte ranges
//! - SCR files: one table of fixed-length rows plus a text region holding
//!   UTF-16 dialogue interleaved with control codes (line breaks, pauses,
//!   player choices, button glyphs, furigana, colors)
//!
//! This library provides:
//!
//! - Reading and extracting archive entries
//! - Parsing SCR containers and iterating raw row windows
//! - Compiling declarative row schemas (integers, floats, bitfields,
//!   enums, string references, gap preservation) and decoding/encoding rows
//! - Decoding the control-coded script text to display strings
//! - A JSON table catalog mapping table names and languages to files
//!
//! ## Example
//!
//! ```rust,no_run
//! use fltools::{Scr, TableRegistry, UnknownEnumPolicy};
//!
//! fn main() -> anyhow::Result<()> {
//!     // Dump a raw table
//!     let scr = Scr::open("bin/00000008.scr")?;
//!     for line in scr.dump_lines(&[0])? {
//!         println!("{}", line);
//!     }
//!
//!     // Decode a schema'd table
//!     let registry = TableRegistry::from_path("tables.json")?;
//!     let table = registry.load_table("items", "en", UnknownEnumPolicy::Fail)?;
//!     println!("{}", table.to_text());
//!     Ok(())
//! }
//! ```

pub mod arc;
pub mod error;
pub mod registry;
pub mod schema;
pub mod scr;
pub mod text;
pub mod utils;

pub use arc::{ArcEntry, ArcFile, ARC_MAGIC};
pub use error::{Error, Result};
pub use registry::{TableDef, TableRegistry, LANGUAGES};
pub use schema::{
    BitFieldSpec, ColumnKind, ColumnSpec, DecodeContext, DisplayFormat, Row, RowLayout, Table,
    UnknownEnumPolicy, Value,
};
pub use scr::{Scr, SCR_MAGIC};
pub use text::{button_label, color_name, decode_text, ControlToken, TokenKind};
pub use utils::{collect_files, create_glob_matcher, format_size, matches_filter};
