//! In-memory zip container for content packages.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Static metadata every package carries, as `(archive path, contents)`.
pub const BOOTSTRAP_ENTRIES: &[(&str, &[u8])] = &[
    (
        "META-INF/vault/properties.xml",
        include_bytes!("../../package_content/META-INF/vault/properties.xml"),
    ),
    (
        "META-INF/vault/config.xml",
        include_bytes!("../../package_content/META-INF/vault/config.xml"),
    ),
    (
        "META-INF/vault/settings.xml",
        include_bytes!("../../package_content/META-INF/vault/settings.xml"),
    ),
];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive already contains an entry at {0}")]
    DuplicateEntry(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("i/o error writing archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Zip archive being assembled in memory.
pub struct PackageArchive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: HashSet<String>,
    file_count: usize,
}

impl PackageArchive {
    /// An empty archive with no entries at all.
    pub fn empty() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: HashSet::new(),
            file_count: 0,
        }
    }

    /// An archive seeded with [`BOOTSTRAP_ENTRIES`].
    pub fn with_bootstrap() -> Result<Self, ArchiveError> {
        let mut archive = Self::empty();
        for (path, bytes) in BOOTSTRAP_ENTRIES {
            archive.add_static_entry(path, bytes)?;
        }
        Ok(archive)
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
    }

    fn write_entry(&mut self, path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        if !self.entries.insert(path.to_string()) {
            return Err(ArchiveError::DuplicateEntry(path.to_string()));
        }
        self.writer.start_file(path, Self::options())?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Add a content file at its repository path (e.g. `jcr_root/apps/foo/a.js`).
    pub fn add_file(&mut self, repo_path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.write_entry(repo_path, bytes)?;
        self.file_count += 1;
        Ok(())
    }

    /// Add package metadata that is not a content file.
    pub fn add_static_entry(&mut self, path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.write_entry(path, bytes)
    }

    /// Number of content files added with [`add_file`](Self::add_file).
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    /// Write the central directory and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        Ok(self.writer.finish()?.into_inner())
    }
}
