//! Zip packaging of rendered posters.
//!
//! Entries are collected in memory and serialised once, at the end of the run.
//! PNG data is already compressed, so entries are stored rather than deflated.
//!
//! Entry names must be unique inside a zip. When a name is added twice the
//! later poster replaces the earlier one and moves to the end, so the archive
//! order is the order in which each name was last produced.

use crate::naming::ARCHIVE_NAME;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
pub struct ArchiveWriter {
    /// Slots in insertion order; a replaced entry leaves `None` behind.
    slots: Vec<Option<(String, Vec<u8>)>>,
    /// Entry name → its live slot.
    positions: HashMap<String, usize>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. An existing entry with the same name is replaced.
    pub fn add(&mut self, name: String, bytes: Vec<u8>) {
        if let Some(old) = self.positions.insert(name.clone(), self.slots.len()) {
            tracing::warn!(name = %name, "duplicate poster name, keeping the later row");
            self.slots[old] = None;
        }
        self.slots.push(Some((name, bytes)));
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn entries(&self) -> impl Iterator<Item = &(String, Vec<u8>)> {
        self.slots.iter().flatten()
    }

    /// Entry names in archive order.
    pub fn names(&self) -> Vec<String> {
        self.entries().map(|(n, _)| n.clone()).collect()
    }

    /// Serialise every entry into one zip payload.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, bytes) in self.entries() {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(bytes)?;
            }
            zip.finish()?;
        }
        tracing::debug!(entries = self.len(), bytes = buf.len(), "archive finished");
        Ok(buf)
    }
}

/// Write the archive payload to `dir` under its fixed name.
pub fn write_archive(dir: &Path, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(ARCHIVE_NAME);
    std::fs::write(&path, bytes)?;
    Ok(path)
}
