//! Nonce bookkeeping kept beside each save file.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use delve_system_persistence::NonceCounter;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// Highest nonce written and highest nonce accepted for one save path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NonceLedger {
    last_issued: u64,
    last_accepted: u64,
}

impl NonceLedger {
    /// Sidecar path for a save file: `<save>.nonce`.
    pub(crate) fn path_for(save: &Path) -> PathBuf {
        let mut name = save.as_os_str().to_owned();
        name.push(".nonce");
        PathBuf::from(name)
    }

    /// Reads the ledger, starting fresh when none exists yet.
    pub(crate) fn read(save: &Path) -> Result<Self> {
        let path = Self::path_for(save);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("could not read nonce ledger {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid nonce ledger {}", path.display()))
    }

    /// Atomically replaces the ledger next to `save`.
    pub(crate) fn write(&self, save: &Path) -> Result<()> {
        let path = Self::path_for(save);
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let text = toml::to_string(self)?;
        let context = || format!("could not write nonce ledger {}", path.display());

        let mut staged = NamedTempFile::new_in(directory).with_context(context)?;
        staged.write_all(text.as_bytes()).with_context(context)?;
        staged.as_file().sync_all().with_context(context)?;
        let _ = staged
            .persist(&path)
            .map_err(|error| error.error)
            .with_context(context)?;
        Ok(())
    }

    /// Counter continuing after every nonce issued or seen for this save.
    pub(crate) fn counter(&self) -> NonceCounter {
        NonceCounter::resume(self.last_issued.max(self.last_accepted))
    }

    pub(crate) fn record_issued(&mut self, counter: &NonceCounter) {
        self.last_issued = self.last_issued.max(counter.last_issued());
    }

    pub(crate) const fn last_accepted(&self) -> u64 {
        self.last_accepted
    }

    pub(crate) fn record_accepted(&mut self, nonce: u64) {
        self.last_accepted = self.last_accepted.max(nonce);
    }
}
