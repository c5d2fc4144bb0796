//! Fantasy Life sub-archive (.bin) reading
//!
//! The archive is a flat container: a 4-byte magic, a 16-byte header, file
//! data, and a table of 20-byte entries naming each stored file. Paths are
//! ASCII and use `/` separators.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};

/// Archive magic signature
pub const ARC_MAGIC: [u8; 4] = *b"R \rC";

/// Size of the magic plus the fixed header
const HEADER_LEN: usize = 0x14;

/// Size of one entry in the table of contents
const ENTRY_LEN: usize = 0x14;

/// One file entry in the archive's table of contents
#[derive(Debug, Clone)]
pub struct ArcEntry {
    /// Relative path of the stored file, `/`-separated
    pub path: String,
    pub unknown1: u8,
    pub unknown2: u16,
    pub unknown3: u32,
    pub file_length: u32,
    pub path_offset: u32,
    pub file_offset: u32,
}

/// A parsed archive file
pub struct ArcFile {
    data: Vec<u8>,
    pub data_length: u32,
    entries: Vec<ArcEntry>,
}

impl ArcFile {
    /// Check whether a buffer starts with the archive magic
    pub fn is_arc(raw: &[u8]) -> bool {
        raw.get(0..4) == Some(&ARC_MAGIC[..])
    }

    /// Parse an archive from its raw bytes
    ///
    /// # Errors
    /// [`Error::UnsupportedContainer`] on a magic mismatch;
    /// [`Error::Format`] when the declared data length does not match the
    /// file size or an entry points outside the buffer.
    pub fn parse(raw: Vec<u8>) -> Result<ArcFile> {
        if !Self::is_arc(&raw) {
            return Err(Error::UnsupportedContainer(
                "archive magic mismatch".into(),
            ));
        }
        if raw.len() < HEADER_LEN {
            return Err(Error::Format("file too small for archive header".into()));
        }

        let mut cursor = Cursor::new(&raw);
        cursor.set_position(4);
        let data_length = cursor.read_u32::<LittleEndian>()?;
        let _unknown1 = cursor.read_u32::<LittleEndian>()?;
        let _unknown2 = cursor.read_u32::<LittleEndian>()?;
        let entries_offset = cursor.read_u32::<LittleEndian>()? as usize;

        if HEADER_LEN as u64 + data_length as u64 != raw.len() as u64 {
            return Err(Error::Format(format!(
                "declared data length {} does not match file size {}",
                data_length,
                raw.len()
            )));
        }
        if entries_offset > raw.len() {
            return Err(Error::Format(format!(
                "entry table at {:#x} is outside the file",
                entries_offset
            )));
        }

        let entry_table = &raw[entries_offset..];
        if entry_table.len() % ENTRY_LEN != 0 {
            return Err(Error::Format(format!(
                "entry table length {} is not a multiple of {}",
                entry_table.len(),
                ENTRY_LEN
            )));
        }

        let mut entries = Vec::with_capacity(entry_table.len() / ENTRY_LEN);
        let mut cursor = Cursor::new(entry_table);
        for _ in 0..entry_table.len() / ENTRY_LEN {
            let unknown1 = cursor.read_u8()?;
            let path_length = cursor.read_u8()? as usize;
            let unknown2 = cursor.read_u16::<LittleEndian>()?;
            let unknown3 = cursor.read_u32::<LittleEndian>()?;
            let file_length = cursor.read_u32::<LittleEndian>()?;
            let path_offset = cursor.read_u32::<LittleEndian>()?;
            let file_offset = cursor.read_u32::<LittleEndian>()?;

            let path_end = path_offset as usize + path_length;
            let path_bytes = raw.get(path_offset as usize..path_end).ok_or_else(|| {
                Error::Format(format!("entry path at {:#x} is outside the file", path_offset))
            })?;
            if !path_bytes.is_ascii() {
                return Err(Error::Format(format!(
                    "entry path at {:#x} is not ASCII",
                    path_offset
                )));
            }
            let path = String::from_utf8_lossy(path_bytes).into_owned();

            entries.push(ArcEntry {
                path,
                unknown1,
                unknown2,
                unknown3,
                file_length,
                path_offset,
                file_offset,
            });
        }

        Ok(ArcFile {
            data: raw,
            data_length,
            entries,
        })
    }

    /// Read and parse an archive file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ArcFile> {
        ArcFile::parse(fs::read(path)?)
    }

    pub fn entries(&self) -> &[ArcEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw bytes of one stored file
    pub fn entry_data(&self, entry: &ArcEntry) -> Result<&[u8]> {
        let start = entry.file_offset as usize;
        let end = start + entry.file_length as usize;
        self.data.get(start..end).ok_or_else(|| {
            Error::Format(format!(
                "file data at {:#x} (+{}) is outside the archive",
                entry.file_offset, entry.file_length
            ))
        })
    }

    /// Look up an entry by its stored path
    pub fn entry(&self, path: &str) -> Option<&ArcEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 2-entry archive with known offsets and contents
    fn sample_arc() -> Vec<u8> {
        let file_a = b"alpha";
        let file_b = b"bravo!";
        let path_a = b"sub/a.bin";
        let path_b = b"b.scr";

        let mut data = Vec::new();
        data.extend(ARC_MAGIC);
        data.extend([0u8; 16]); // header, patched below

        let file_a_offset = data.len() as u32;
        data.extend(file_a);
        let file_b_offset = data.len() as u32;
        data.extend(file_b);
        let path_a_offset = data.len() as u32;
        data.extend(path_a);
        let path_b_offset = data.len() as u32;
        data.extend(path_b);

        let entries_offset = data.len() as u32;
        for (path_len, file_len, path_off, file_off) in [
            (path_a.len(), file_a.len(), path_a_offset, file_a_offset),
            (path_b.len(), file_b.len(), path_b_offset, file_b_offset),
        ] {
            data.push(0); // unknown1
            data.push(path_len as u8);
            data.extend(0u16.to_le_bytes());
            data.extend(0u32.to_le_bytes());
            data.extend((file_len as u32).to_le_bytes());
            data.extend(path_off.to_le_bytes());
            data.extend(file_off.to_le_bytes());
        }

        let data_length = (data.len() - HEADER_LEN) as u32;
        data[4..8].copy_from_slice(&data_length.to_le_bytes());
        data[16..20].copy_from_slice(&entries_offset.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_and_extract() {
        let arc = ArcFile::parse(sample_arc()).unwrap();
        assert_eq!(arc.len(), 2);

        let entry = &arc.entries()[0];
        assert_eq!(entry.path, "sub/a.bin");
        assert_eq!(arc.entry_data(entry).unwrap(), b"alpha");

        let entry = arc.entry("b.scr").unwrap();
        assert_eq!(arc.entry_data(entry).unwrap(), b"bravo!");
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = sample_arc();
        data[0] = b'X';
        assert!(matches!(
            ArcFile::parse(data),
            Err(Error::UnsupportedContainer(_))
        ));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let mut data = sample_arc();
        data.push(0); // one stray byte breaks the declared length
        assert!(matches!(ArcFile::parse(data), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_out_of_range_file_data() {
        let mut data = sample_arc();
        let entries_offset = u32::from_le_bytes(data[16..20].try_into().unwrap()) as usize;
        // Point the first entry's file data past the end
        data[entries_offset + 16..entries_offset + 20]
            .copy_from_slice(&0xFFFF_0000u32.to_le_bytes());
        let arc = ArcFile::parse(data).unwrap();
        assert!(arc.entry_data(&arc.entries()[0]).is_err());
    }
}
