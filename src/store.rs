//! Persisted per-table state.
//!
//! For every table the store keeps two files in the state directory:
//!
//! - `<name>.ipset`: the last command document written for the table. This is
//!   the change-detection fingerprint and is never deleted by normal runs.
//! - `<name>.pending`: present while the apply sequence for that document
//!   has not completed. A document that was written but never applied
//!   (crash, failing `ipset`) is re-applied on the next run even though it
//!   compares equal.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::document::CommandDocument;
use crate::fs_abstraction::{FileSystem, RealFileSystem};

const DOCUMENT_EXTENSION: &str = "ipset";
const PENDING_EXTENSION: &str = "pending";

/// What the store knows about a table from previous runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Raw bytes of the last written document, `None` on first run
    pub document: Option<Vec<u8>>,
    /// The last written document has not been applied successfully
    pub pending: bool,
}

/// File-backed store of command documents, keyed by table name.
#[derive(Debug, Clone)]
pub struct DocumentStore<F = RealFileSystem> {
    dir: PathBuf,
    fs: F,
}

impl DocumentStore<RealFileSystem> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(dir, RealFileSystem)
    }
}

impl<F: FileSystem> DocumentStore<F> {
    pub fn with_fs(dir: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the state directory if it does not exist yet.
    pub fn ensure_dir(&self) -> io::Result<()> {
        if !self.fs.exists(&self.dir) {
            self.fs.create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    pub fn document_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", table, DOCUMENT_EXTENSION))
    }

    pub fn pending_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", table, PENDING_EXTENSION))
    }

    /// Load the persisted state for `table`.
    ///
    /// An unreadable document is treated like a missing one, which forces
    /// a fresh write and apply.
    pub fn load(&self, table: &str) -> PersistedState {
        let path = self.document_path(table);
        let document = match self.fs.read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(table, "No persisted document at {:?}", path);
                None
            }
            Err(e) => {
                warn!(table, "Cannot read persisted document {:?}: {}", path, e);
                None
            }
        };

        PersistedState {
            document,
            pending: self.fs.exists(&self.pending_path(table)),
        }
    }

    /// Persist `document` for `table` and mark it as not yet applied.
    ///
    /// The pending marker goes first: if the process dies between the two
    /// writes, the next run still sees an unapplied document.
    pub fn save(&self, table: &str, document: &CommandDocument) -> io::Result<()> {
        self.fs.write_atomic(&self.pending_path(table), b"")?;
        self.fs
            .write_atomic(&self.document_path(table), document.as_bytes())
    }

    /// Mark the persisted document for `table` as applied.
    pub fn clear_pending(&self, table: &str) -> io::Result<()> {
        match self.fs.remove_file(&self.pending_path(table)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
