//! Table catalog loading
//!
//! A tables.json-style catalog maps logical table names to the SCR file
//! holding each language's copy plus the row schema. The registry is an
//! explicit value constructed by the caller and passed where needed; it
//! holds no global state, so independent registries can coexist in tests
//! or parallel batch runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{BitFieldSpec, ColumnSpec, DecodeContext, RowLayout, Table, UnknownEnumPolicy};
use crate::scr::Scr;

/// Language codes in on-disk file order: consecutive archive file indices
/// hold the same table in these languages
pub const LANGUAGES: [&str; 9] = ["jp", "ae", "af", "de", "en", "es", "fr", "it", "uk"];

/// One bit sub-column declaration in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitColumnDef {
    pub name: String,
    pub offset: u32,
    pub length: u32,
    #[serde(default)]
    pub format: String,
}

/// One column declaration in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    #[serde(default)]
    pub format: String,
    /// Bit sub-columns, for `bit*` kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<BitColumnDef>,
    /// Value-to-label map with decimal string keys, for `enum*` kinds
    #[serde(default, rename = "enum", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// One table declaration: where its files live and how rows are laid out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    /// Language code to SCR file path
    pub paths: BTreeMap<String, String>,
    pub row_length: usize,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Compile this declaration into a row layout
    pub fn compile(&self) -> Result<RowLayout> {
        let mut specs = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut spec = ColumnSpec::new(column.name.clone(), column.kind.parse()?, column.offset)
                .with_format(column.format.parse()?);
            if !column.columns.is_empty() {
                let mut bits = Vec::with_capacity(column.columns.len());
                for bit in &column.columns {
                    bits.push(BitFieldSpec {
                        name: bit.name.clone(),
                        bit_offset: bit.offset,
                        bit_length: bit.length,
                        format: bit.format.parse()?,
                    });
                }
                spec = spec.with_bit_fields(bits);
            }
            if !column.labels.is_empty() {
                let mut labels = HashMap::with_capacity(column.labels.len());
                for (key, label) in &column.labels {
                    let value: u64 = key.parse().map_err(|_| {
                        Error::Schema(format!(
                            "enum key '{}' in column '{}' is not an integer",
                            key, column.name
                        ))
                    })?;
                    labels.insert(value, label.clone());
                }
                spec = spec.with_enum_labels(labels);
            }
            specs.push(spec);
        }
        RowLayout::compile(self.row_length, &specs)
    }
}

/// A catalog of table declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRegistry {
    tables: BTreeMap<String, TableDef>,
}

impl TableRegistry {
    pub fn new() -> TableRegistry {
        TableRegistry::default()
    }

    /// Load a catalog from a JSON reader
    pub fn from_reader<R: Read>(reader: R) -> Result<TableRegistry> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a catalog from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TableRegistry> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Write the catalog back out as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Load and decode one table in one language
    ///
    /// Compiles the declared schema, reads the SCR file from the path
    /// registered for `language`, and decodes every row with string
    /// columns resolved through the container's text region.
    pub fn load_table(
        &self,
        name: &str,
        language: &str,
        unknown_enum: UnknownEnumPolicy,
    ) -> Result<Table> {
        let def = self
            .tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        let path = def.paths.get(language).ok_or_else(|| Error::LanguageNotFound {
            table: name.to_string(),
            language: language.to_string(),
        })?;

        let layout = Arc::new(def.compile()?);
        let scr = Scr::open(path)?;
        let resolve = |offset: u32| scr.string_at(offset);
        let ctx = DecodeContext::new(unknown_enum).with_resolver(&resolve);
        Table::from_scr(&layout, &scr, &ctx)
    }

    /// Register all language copies of a table at once
    ///
    /// Archive extraction leaves one sequentially numbered SCR file per
    /// language; given the file holding `first_language`, the remaining
    /// languages of [`LANGUAGES`] are assumed to follow at consecutive
    /// file indices. The schema starts empty (raw rows only) and can be
    /// filled in by hand afterwards.
    pub fn append_language_set<P: AsRef<Path>>(
        &mut self,
        name: &str,
        first_path: P,
        first_language: &str,
    ) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::TableExists(name.to_string()));
        }
        let first_path = first_path.as_ref();
        let scr = Scr::open(first_path)?;
        let paths = language_paths(first_path, first_language)?;
        self.tables.insert(
            name.to_string(),
            TableDef {
                paths,
                row_length: scr.row_length() as usize,
                columns: Vec::new(),
            },
        );
        Ok(())
    }
}

/// Derive per-language paths from the numbered file holding
/// `first_language`
fn language_paths(first_path: &Path, first_language: &str) -> Result<BTreeMap<String, String>> {
    let stem = first_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let first_index: u32 = stem.parse().map_err(|_| {
        Error::Format(format!("file name '{}' is not a numeric index", stem))
    })?;
    let extension = first_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let dir = first_path.parent().unwrap_or_else(|| Path::new(""));

    let first_slot = LANGUAGES
        .iter()
        .position(|&l| l == first_language)
        .ok_or_else(|| Error::Format(format!("unknown language code '{}'", first_language)))?;

    let mut paths = BTreeMap::new();
    for (i, language) in LANGUAGES.iter().enumerate().skip(first_slot) {
        let index = first_index + (i - first_slot) as u32;
        let path = dir.join(format!("{:08}{}", index, extension));
        paths.insert(
            language.to_string(),
            path.to_string_lossy().replace('\\', "/"),
        );
    }
    Ok(paths)
}
