//! Disk persistence for the ledger (one pretty-printed JSON document).

use crate::error::StoreError;
use crate::record::Record;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Somewhere the full ledger can be saved to and loaded from.
pub trait LedgerStore: Send + Sync {
    /// Load every record, in ledger order. `Ok(None)` means nothing has been
    /// stored yet.
    fn load(&self) -> Result<Option<Vec<Record>>, StoreError>;

    /// Overwrite the stored ledger with `records`.
    fn save(&self, records: &[Record]) -> Result<(), StoreError>;
}

/// Stores the ledger as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<Record>>, StoreError> {
        let buf = match fs::read_to_string(&self.path) {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<Record> = serde_json::from_str(&buf)?;
        debug!(target: "ledger::store", path = %self.path.display(), records = records.len(), "Loaded ledger");
        Ok(Some(records))
    }

    fn save(&self, records: &[Record]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)?;
        debug!(target: "ledger::store", path = %self.path.display(), records = records.len(), "Saved ledger");
        Ok(())
    }
}
