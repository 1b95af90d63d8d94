//! Import / export of the persisted history.
//!
//! Export copies the store file verbatim to a timestamped file in the
//! export directory. Import validates a user-chosen file with the
//! history codec and, only if it holds at least one valid record,
//! overwrites the store with its bytes verbatim. Import replaces the
//! history outright; the caller obtains confirmation beforehand.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::codec::{self, DecodeError};
use super::writer::Persister;
use super::StoragePaths;
use crate::history::ClipEntry;

/// Failure outcome of an import or export. The `Display` text is the
/// user-facing reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("No history to export")]
    NothingToExport,
    #[error("Could not write export file")]
    ExportWriteFailed,
    #[error("File not found")]
    NotFound,
    #[error("Could not read file")]
    Unreadable,
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Invalid format: expected an array")]
    NotAnArray,
    #[error("No valid clipboard items found")]
    NoValidItems,
    #[error("Could not write history file")]
    StoreWriteFailed,
}

/// A validated import, already written to the store.
#[derive(Debug)]
pub struct Imported {
    /// Valid entries found in the file, newest first.
    pub entries: Vec<ClipEntry>,
}

impl Imported {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Import/export over the store managed by a [`Persister`].
#[derive(Debug, Clone)]
pub struct TransferService {
    paths: StoragePaths,
}

impl TransferService {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Copy the store file to `<export_dir>/clipboard_history_export_<stamp>.json`.
    ///
    /// Pending saves are flushed first so the copy reflects the current
    /// history. Returns the destination path.
    pub async fn export(
        &self,
        persister: &Persister,
        now: DateTime<Local>,
    ) -> Result<PathBuf, TransferError> {
        persister.flush().await;

        let source = &self.paths.registry_file;
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(TransferError::NothingToExport);
        }

        let dest = self.paths.export_dir.join(export_file_name(now));
        if let Err(e) = tokio::fs::create_dir_all(&self.paths.export_dir).await {
            tracing::warn!(path = %self.paths.export_dir.display(), error = %e, "cannot create export directory");
            return Err(TransferError::ExportWriteFailed);
        }
        if let Err(e) = tokio::fs::copy(source, &dest).await {
            tracing::warn!(dest = %dest.display(), error = %e, "export copy failed");
            return Err(TransferError::ExportWriteFailed);
        }

        tracing::info!(dest = %dest.display(), "history exported");
        Ok(dest)
    }

    /// Validate `location` and, if valid, overwrite the store with it.
    ///
    /// `None` reads the default import file. On any failure the store is
    /// left untouched.
    pub async fn import(
        &self,
        location: Option<&Path>,
        persister: &Persister,
    ) -> Result<Imported, TransferError> {
        let path = location
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.paths.default_import_path());

        let (bytes, entries) = read_import(&path).await?;

        if let Err(e) = persister.write_now(bytes).await {
            tracing::warn!(error = %e, "import could not replace the history file");
            return Err(TransferError::StoreWriteFailed);
        }

        tracing::info!(path = %path.display(), count = entries.len(), "history imported");
        Ok(Imported { entries })
    }
}

/// Read and validate an import file without touching the store.
pub async fn read_import(path: &Path) -> Result<(Vec<u8>, Vec<ClipEntry>), TransferError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TransferError::NotFound);
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read import file");
            return Err(TransferError::Unreadable);
        }
    };

    let decoded = match codec::decode(&bytes) {
        Ok(decoded) => decoded,
        Err(DecodeError::InvalidJson(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "import file is not JSON");
            return Err(TransferError::InvalidJson);
        }
        Err(DecodeError::NotAnArray) => return Err(TransferError::NotAnArray),
    };

    if decoded.entries.is_empty() {
        return Err(TransferError::NoValidItems);
    }
    if decoded.dropped > 0 {
        tracing::info!(path = %path.display(), dropped = decoded.dropped, "import skips invalid records");
    }
    Ok((bytes, decoded.entries))
}

/// `clipboard_history_export_YYYY-MM-DD_HH-MM-SS.json`
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!(
        "clipboard_history_export_{}.json",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}
