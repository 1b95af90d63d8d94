//! Durable storage: file locations, the history codec, the background
//! writer, and import/export.
//!
//! Storage is a best-effort mirror of the in-memory history: failures
//! are reported and logged, never rolled back into memory.

pub mod codec;
pub mod transfer;
pub mod writer;

use std::path::{Path, PathBuf};

use crate::history::ClipEntry;

/// Subdirectory of the user cache directory holding the store.
pub const APP_DIR: &str = "cliprecall";
/// Store file name.
pub const REGISTRY_FILE: &str = "clipboard_history.json";
/// File looked up by `import` when no path is given.
pub const DEFAULT_IMPORT_FILE: &str = "clipboard_history_export.json";

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("cannot determine the user {0} directory")]
    NoDirectory(&'static str),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("history writer stopped")]
    WriterGone,
}

/// Where the store lives and where exports go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Active store file.
    pub registry_file: PathBuf,
    /// Directory receiving export files (the user's home).
    pub export_dir: PathBuf,
}

impl StoragePaths {
    /// Resolve the per-user locations:
    /// `<cache>/cliprecall/clipboard_history.json` and `<home>`.
    pub fn resolve() -> Result<Self, StorageError> {
        let cache = dirs::cache_dir().ok_or(StorageError::NoDirectory("cache"))?;
        let home = dirs::home_dir().ok_or(StorageError::NoDirectory("home"))?;
        Ok(Self {
            registry_file: cache.join(APP_DIR).join(REGISTRY_FILE),
            export_dir: home,
        })
    }

    /// Lay out both locations under a single root directory.
    #[cfg(test)]
    pub fn under(root: &Path) -> Self {
        Self {
            registry_file: root.join("cache").join(APP_DIR).join(REGISTRY_FILE),
            export_dir: root.join("home"),
        }
    }

    pub fn default_import_path(&self) -> PathBuf {
        self.export_dir.join(DEFAULT_IMPORT_FILE)
    }
}

/// Load the persisted history.
///
/// A missing file is a fresh start; unreadable or malformed data is
/// logged and yields an empty history.
pub async fn load_history(path: &Path) -> Vec<ClipEntry> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let entries = codec::deserialize(&bytes);
            tracing::info!(path = %path.display(), count = entries.len(), "history loaded");
            entries
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no history file yet, starting empty");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read history file");
            Vec::new()
        }
    }
}
