//! Atomic save file storage.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{LoadError, SaveEnvelope, SaveError};

/// Save envelope stored at a fixed path.
///
/// Writes go to a temporary file in the same directory which is flushed and
/// then renamed over the target, so readers observe either the old or the
/// new envelope and never a partial one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveFile {
    path: PathBuf,
}

impl SaveFile {
    /// Creates a handle for `path`; nothing is touched until written.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the save.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reports whether a save exists at the path.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Atomically replaces the file with `envelope`.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::Io`] when the temporary file cannot be created,
    /// written, synced or renamed.
    pub fn write(&self, envelope: &SaveEnvelope) -> Result<(), SaveError> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(directory)?;
        staged.write_all(&envelope.to_bytes())?;
        staged.as_file().sync_all()?;
        let _ = staged.persist(&self.path).map_err(|error| error.error)?;
        log::info!(
            "wrote save with nonce {} to {}",
            envelope.nonce(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads and parses the envelope without authenticating it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] when the file cannot be read, or a parse
    /// error from [`SaveEnvelope::from_bytes`].
    pub fn read(&self) -> Result<SaveEnvelope, LoadError> {
        let bytes = fs::read(&self.path)?;
        SaveEnvelope::from_bytes(&bytes)
    }
}
