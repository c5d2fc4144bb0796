//! Ordered collections of rows sharing one layout

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::row::{DecodeContext, Row};
use crate::schema::layout::RowLayout;
use crate::schema::types::Value;
use crate::scr::Scr;

/// A homogeneous, ordered sequence of rows decoded through one layout
///
/// Homogeneity is enforced at construction: every row appended must have
/// been decoded through the same layout object.
#[derive(Debug, Clone)]
pub struct Table {
    layout: Arc<RowLayout>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(layout: Arc<RowLayout>) -> Table {
        Table {
            layout,
            rows: Vec::new(),
        }
    }

    /// Decode every row of an SCR container, resolving string columns
    /// through the container's text region
    pub fn from_scr(layout: &Arc<RowLayout>, scr: &Scr, ctx: &DecodeContext<'_>) -> Result<Table> {
        if scr.row_length() as usize != layout.row_length() {
            return Err(Error::Format(format!(
                "container row length {} does not match schema row length {}",
                scr.row_length(),
                layout.row_length()
            )));
        }
        let mut table = Table::new(Arc::clone(layout));
        for window in scr.rows() {
            table.push(Row::decode(layout, window, ctx)?)?;
        }
        Ok(table)
    }

    /// Append a row; it must share this table's layout
    pub fn push(&mut self, row: Row) -> Result<()> {
        if !Arc::ptr_eq(row.layout(), &self.layout) {
            return Err(Error::Schema(
                "row was decoded through a different layout".into(),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    /// Project one named field (or bitfield sub-field) across all rows
    ///
    /// The name is resolved to a slot index once, not per row.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value>> {
        let slot = self
            .layout
            .slot_of(name)
            .ok_or_else(|| Error::Schema(format!("no column named '{}'", name)))?;
        Ok(self.rows.iter().map(move |row| &row.values()[slot]))
    }

    /// Render the whole table, one tab-delimited line per row
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(Row::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::layout::ColumnSpec;
    use crate::schema::row::UnknownEnumPolicy;
    use crate::schema::types::ColumnKind;
    use crate::scr::SCR_MAGIC;
    use std::collections::HashMap;

    /// Build a parsed container with the given rows (descriptor at 0x18,
    /// row data at 0x24)
    fn scr_with_rows(rows: &[&[u8]]) -> Scr {
        let row_length = rows.first().map_or(0, |r| r.len());
        let mut data = vec![0u8; 0x24];
        data[0..4].copy_from_slice(&SCR_MAGIC);
        data[0x14..0x18].copy_from_slice(&0x18u32.to_le_bytes());
        data[0x18..0x1C].copy_from_slice(&(rows.len() as u32).to_le_bytes());
        data[0x1C..0x20].copy_from_slice(&(row_length as u32).to_le_bytes());
        data[0x20..0x24].copy_from_slice(&0x24u32.to_le_bytes());
        for row in rows {
            data.extend_from_slice(row);
        }
        Scr::parse(&data).unwrap()
    }

    fn sample_table() -> Table {
        let columns = vec![
            ColumnSpec::new("id", ColumnKind::U8, 0),
            ColumnSpec::new("hp", ColumnKind::U16, 1),
        ];
        let layout = Arc::new(RowLayout::compile(3, &columns).unwrap());
        let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
        let mut table = Table::new(Arc::clone(&layout));
        for bytes in [[1u8, 0x10, 0x00], [2, 0x20, 0x00], [3, 0x30, 0x00]] {
            table
                .push(Row::decode(&layout, &bytes, &ctx).unwrap())
                .unwrap();
        }
        table
    }

    #[test]
    fn test_column_projection() {
        let table = sample_table();
        let hp: Vec<u64> = table
            .column("hp")
            .unwrap()
            .map(|v| v.as_u64().unwrap())
            .collect();
        assert_eq!(hp, vec![0x10, 0x20, 0x30]);
        assert!(table.column("mp").is_err());
    }

    #[test]
    fn test_to_text() {
        let table = sample_table();
        assert_eq!(table.to_text(), "1\t16\n2\t32\n3\t48");
    }

    #[test]
    fn test_from_scr_decodes_all_rows() {
        let scr = scr_with_rows(&[&[1, 0x10, 0x00], &[2, 0x20, 0x00]]);
        let columns = vec![
            ColumnSpec::new("id", ColumnKind::U8, 0),
            ColumnSpec::new("hp", ColumnKind::U16, 1),
        ];
        let layout = Arc::new(RowLayout::compile(3, &columns).unwrap());
        let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
        let table = Table::from_scr(&layout, &scr, &ctx).unwrap();
        assert_eq!(table.len(), 2);
        let ids: Vec<u64> = table
            .column("id")
            .unwrap()
            .map(|v| v.as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_from_scr_rejects_row_length_mismatch() {
        let scr = scr_with_rows(&[&[1, 2, 3, 4]]);
        let layout =
            Arc::new(RowLayout::compile(3, &[ColumnSpec::new("id", ColumnKind::U8, 0)]).unwrap());
        let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
        assert!(matches!(
            Table::from_scr(&layout, &scr, &ctx),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_from_scr_aborts_on_row_error() {
        // Second row holds an unlabeled enum value; the whole load fails
        let scr = scr_with_rows(&[&[3], &[9]]);
        let mut labels = HashMap::new();
        labels.insert(3u64, "Red".to_string());
        let columns =
            vec![ColumnSpec::new("color", ColumnKind::Enum8, 0).with_enum_labels(labels)];
        let layout = Arc::new(RowLayout::compile(1, &columns).unwrap());
        let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
        assert!(matches!(
            Table::from_scr(&layout, &scr, &ctx),
            Err(Error::UnknownEnumValue { value: 9, .. })
        ));
    }

    #[test]
    fn test_push_rejects_foreign_layout() {
        let mut table = sample_table();
        let other = Arc::new(
            RowLayout::compile(3, &[ColumnSpec::new("id", ColumnKind::U8, 0)]).unwrap(),
        );
        let ctx = DecodeContext::new(UnknownEnumPolicy::Fail);
        let row = Row::decode(&other, &[9, 0, 0], &ctx).unwrap();
        assert!(table.push(row).is_err());
    }
}
