//! SCR container parsing
//!
//! SCR files hold one flat table of fixed-length rows plus a text region
//! referenced by row columns. The layout is minimal: a magic signature, a
//! pointer at 0x14 to a 12-byte table descriptor (row count, row length,
//! table offset), then raw data. Some container variants prepend a 16-byte
//! wrapper before the magic; both forms are accepted and normalized.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};
use crate::text;

/// SCR magic signature as it appears on disk (`0x1D038013` little-endian)
pub const SCR_MAGIC: [u8; 4] = [0x13, 0x80, 0x03, 0x1D];

/// Byte position of the table descriptor pointer
const DESCRIPTOR_PTR: u64 = 0x14;

/// Length of the optional container wrapper before the magic
const WRAPPER_LEN: usize = 0x10;

/// A parsed SCR container
///
/// Owns its byte buffer; rows and strings decoded from it hold offsets
/// only, so independent decodes never contend.
#[derive(Debug, Clone)]
pub struct Scr {
    data: Vec<u8>,
    row_count: u32,
    row_length: u32,
    table_offset: u32,
}

impl Scr {
    /// Check whether a buffer starts with the SCR magic at either
    /// accepted position
    pub fn is_scr(raw: &[u8]) -> bool {
        raw.get(0..4) == Some(&SCR_MAGIC[..])
            || raw.get(WRAPPER_LEN..WRAPPER_LEN + 4) == Some(&SCR_MAGIC[..])
    }

    /// Parse a raw file buffer
    ///
    /// The magic may sit at byte 0 or at byte 0x10; in the second form the
    /// 16-byte wrapper is discarded before parsing.
    ///
    /// # Errors
    /// [`Error::UnsupportedContainer`] if neither magic position matches,
    /// [`Error::Format`] if the descriptor or the table it describes falls
    /// outside the buffer.
    pub fn parse(raw: &[u8]) -> Result<Scr> {
        let data = if raw.get(0..4) == Some(&SCR_MAGIC[..]) {
            raw.to_vec()
        } else if raw.get(WRAPPER_LEN..WRAPPER_LEN + 4) == Some(&SCR_MAGIC[..]) {
            raw[WRAPPER_LEN..].to_vec()
        } else {
            return Err(Error::UnsupportedContainer(
                "SCR magic not found at offset 0 or 0x10".into(),
            ));
        };

        if data.len() < DESCRIPTOR_PTR as usize + 4 {
            return Err(Error::Format("file too small for SCR header".into()));
        }

        let mut cursor = Cursor::new(&data);
        cursor.set_position(DESCRIPTOR_PTR);
        let descriptor_offset = cursor.read_u32::<LittleEndian>()? as u64;

        if descriptor_offset + 12 > data.len() as u64 {
            return Err(Error::Format(format!(
                "table descriptor at {:#x} is outside the file",
                descriptor_offset
            )));
        }
        cursor.set_position(descriptor_offset);
        let row_count = cursor.read_u32::<LittleEndian>()?;
        let row_length = cursor.read_u32::<LittleEndian>()?;
        let table_offset = cursor.read_u32::<LittleEndian>()?;

        let table_end = table_offset as u64 + row_count as u64 * row_length as u64;
        if table_end > data.len() as u64 {
            return Err(Error::Format(format!(
                "table of {} rows x {} bytes at {:#x} exceeds file size {}",
                row_count,
                row_length,
                table_offset,
                data.len()
            )));
        }

        Ok(Scr {
            data,
            row_count,
            row_length,
            table_offset,
        })
    }

    /// Read and parse an SCR file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Scr> {
        let raw = fs::read(path)?;
        Scr::parse(&raw)
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn row_length(&self) -> u32 {
        self.row_length
    }

    pub fn table_offset(&self) -> u32 {
        self.table_offset
    }

    /// The normalized byte buffer (wrapper already stripped)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes of the row at `index`
    pub fn row_bytes(&self, index: u32) -> Option<&[u8]> {
        if index >= self.row_count {
            return None;
        }
        let start = self.table_offset as usize + index as usize * self.row_length as usize;
        Some(&self.data[start..start + self.row_length as usize])
    }

    /// Iterate over the raw byte windows of all rows
    ///
    /// The iterator is read-only and restartable; call it as often as
    /// needed.
    pub fn rows(&self) -> RowWindows<'_> {
        RowWindows { scr: self, index: 0 }
    }

    /// Decode the control-coded string at `offset` in the text region
    pub fn string_at(&self, offset: u32) -> Result<String> {
        text::decode_text(&self.data, offset as usize)
    }

    /// Dump the raw table as tab-delimited lines
    ///
    /// Each line starts with the row's absolute byte offset and its index,
    /// followed by the decoded string for every in-row string-column
    /// position in `string_offsets`, then one two-digit hex column per raw
    /// byte.
    pub fn dump_lines(&self, string_offsets: &[u32]) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(self.row_count as usize);
        for (index, row) in self.rows().enumerate() {
            let local_offset = self.table_offset as usize + index * self.row_length as usize;
            let mut words = vec![
                format!("0x{:08X}", local_offset),
                format!("0x{:04X}", index),
            ];
            for &column_offset in string_offsets {
                let window = row
                    .get(column_offset as usize..column_offset as usize + 4)
                    .ok_or_else(|| {
                        Error::Format(format!(
                            "string column offset {} is outside the {}-byte row",
                            column_offset, self.row_length
                        ))
                    })?;
                let string_offset =
                    u32::from_le_bytes([window[0], window[1], window[2], window[3]]);
                words.push(self.string_at(string_offset)?);
            }
            for byte in row {
                words.push(format!("{:02X}", byte));
            }
            lines.push(words.join("\t"));
        }
        Ok(lines)
    }
}

/// Restartable iterator over per-row byte windows of an SCR table
pub struct RowWindows<'a> {
    scr: &'a Scr,
    index: u32,
}

impl<'a> Iterator for RowWindows<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.scr.row_bytes(self.index)?;
        self.index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.scr.row_count - self.index) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RowWindows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal SCR buffer: descriptor at 0x18, rows at 0x24
    fn sample_scr(rows: &[&[u8]]) -> Vec<u8> {
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
        data
    }

    #[test]
    fn test_parse_magic_at_zero() {
        let data = sample_scr(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
        let scr = Scr::parse(&data).unwrap();
        assert_eq!(scr.row_count(), 2);
        assert_eq!(scr.row_length(), 4);
        assert_eq!(scr.table_offset(), 0x24);
    }

    #[test]
    fn test_parse_magic_behind_wrapper() {
        let inner = sample_scr(&[&[9, 9, 9, 9]]);
        let mut data = vec![0xAB; 0x10];
        data.extend_from_slice(&inner);
        let scr = Scr::parse(&data).unwrap();
        assert_eq!(scr.row_count(), 1);
        assert_eq!(scr.data(), &inner[..]);
        assert_eq!(scr.row_bytes(0), Some(&[9u8, 9, 9, 9][..]));
    }

    #[test]
    fn test_parse_rejects_unknown_magic() {
        let mut data = sample_scr(&[&[1, 2, 3, 4]]);
        data[0] = 0x00;
        assert!(matches!(
            Scr::parse(&data),
            Err(Error::UnsupportedContainer(_))
        ));
    }

    #[test]
    fn test_parse_rejects_oversized_table() {
        let mut data = sample_scr(&[&[1, 2, 3, 4]]);
        // Claim more rows than the buffer holds
        data[0x18..0x1C].copy_from_slice(&100u32.to_le_bytes());
        assert!(matches!(Scr::parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn test_rows_are_restartable() {
        let data = sample_scr(&[&[1, 2, 3, 4], &[5, 6, 7, 8], &[9, 10, 11, 12]]);
        let scr = Scr::parse(&data).unwrap();
        assert_eq!(scr.rows().len(), 3);
        let first: Vec<&[u8]> = scr.rows().collect();
        let second: Vec<&[u8]> = scr.rows().collect();
        assert_eq!(first, second);
        assert_eq!(first[1], &[5, 6, 7, 8]);
        assert_eq!(scr.row_bytes(3), None);
    }

    #[test]
    fn test_dump_lines() {
        // One row whose u32 at offset 0 points at a string in the buffer
        let mut data = sample_scr(&[&[0, 0, 0, 0, 0xAA, 0xBB]]);
        let string_offset = data.len() as u32;
        data.extend("Hi".encode_utf16().flat_map(u16::to_le_bytes));
        data.extend([0x00, 0x00]);
        let row_start = 0x24;
        data[row_start..row_start + 4].copy_from_slice(&string_offset.to_le_bytes());

        let scr = Scr::parse(&data).unwrap();
        let lines = scr.dump_lines(&[0]).unwrap();
        assert_eq!(lines.len(), 1);
        let words: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(words[0], "0x00000024");
        assert_eq!(words[1], "0x0000");
        assert_eq!(words[2], "Hi");
        // Four offset bytes then the two data bytes
        let hex: Vec<String> = data[0x24..0x2A]
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        assert_eq!(words[3..], hex);
    }
}
