//! Zip container access.
//!
//! A `.docx` document and the archive handed to the web client are both plain zip files, so
//! reading entries and writing a bundle live together here.

use crate::DocxResult;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One file stored in a zip container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Path inside the container, always `/`-separated.
    pub name: String,
    pub data: Vec<u8>,
}

/// Reads every entry of a zip container, in stored order.
///
/// Directory entries are skipped.
///
/// # Errors
///
/// Returns `DocxError::Zip` if the bytes are not a readable zip archive and
/// `DocxError::Io` if an entry cannot be decompressed.
pub fn read_entries(bytes: &[u8]) -> DocxResult<Vec<PackageEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push(PackageEntry { name, data });
    }

    Ok(entries)
}

/// In-memory zip writer.
///
/// Entries are deflate-compressed. Adding two entries with the same name fails with a zip
/// error rather than silently shadowing the first.
pub struct ZipBundle {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ZipBundle {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Appends one file to the bundle.
    pub fn add(&mut self, name: &str, data: &[u8]) -> DocxResult<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name, options)?;
        self.writer.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Writes the central directory and returns the archive bytes.
    pub fn finish(self) -> DocxResult<Vec<u8>> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ZipBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZipBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipBundle")
            .field("entries", &self.entries)
            .finish()
    }
}
