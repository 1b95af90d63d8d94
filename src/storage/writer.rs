//! Background history writer.
//!
//! Saves are fire-and-forget: the daemon loop hands over serialized
//! bytes and continues. A single writer task owns the store file, so
//! writes land in submission order. Queued saves are coalesced to the
//! newest one. Each write goes to a temp file renamed over the store.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::StorageError;

#[derive(Debug)]
enum Job {
    /// Best-effort save; failure is only logged.
    Save(Vec<u8>),
    /// Write and report the result to the caller.
    WriteNow {
        bytes: Vec<u8>,
        ack: oneshot::Sender<Result<(), StorageError>>,
    },
    /// Acknowledge once every earlier job is done.
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task.
#[derive(Debug)]
pub struct Persister {
    path: PathBuf,
    tx: mpsc::UnboundedSender<Job>,
    task: JoinHandle<()>,
}

impl Persister {
    /// Spawn the writer task for the store at `path`.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(path.clone(), rx));
        Self { path, tx, task }
    }

    /// Queue a save without waiting for it.
    pub fn save(&self, bytes: Vec<u8>) {
        if self.tx.send(Job::Save(bytes)).is_err() {
            tracing::warn!("history writer stopped, save dropped");
        }
    }

    /// Write `bytes` after all queued saves and report the outcome.
    pub async fn write_now(&self, bytes: Vec<u8>) -> Result<(), StorageError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Job::WriteNow { bytes, ack })
            .map_err(|_| StorageError::WriterGone)?;
        done.await.map_err(|_| StorageError::WriterGone)?
    }

    /// Wait until every queued save has been written (or has failed).
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Job::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Drain the queue and stop the writer.
    pub async fn shutdown(self) {
        drop(self.tx);
        match self.task.await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "history writer stopped"),
            Err(e) => tracing::warn!(error = %e, "history writer task failed"),
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Job>) {
    let mut next: Option<Job> = None;
    loop {
        let job = match next.take() {
            Some(job) => job,
            None => match rx.recv().await {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Save(mut bytes) => {
                let mut coalesced = 0usize;
                while let Ok(queued) = rx.try_recv() {
                    match queued {
                        Job::Save(newer) => {
                            bytes = newer;
                            coalesced += 1;
                        }
                        other => {
                            next = Some(other);
                            break;
                        }
                    }
                }
                match write_atomic(&path, &bytes).await {
                    Ok(()) => tracing::debug!(
                        path = %path.display(),
                        bytes = bytes.len(),
                        coalesced,
                        "history saved"
                    ),
                    Err(e) => tracing::warn!(error = %e, "failed to save history"),
                }
            }
            Job::WriteNow { bytes, ack } => {
                let result = write_atomic(&path, &bytes).await;
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "failed to write history");
                }
                let _ = ack.send(result);
            }
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("history writer stopped");
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StorageError::WriteFailed {
            path: tmp.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
