//! Debounced search scheduling.
//!
//! Each new query cancels the pending evaluation and schedules a fresh
//! one after a quiet period. At most one evaluation is in flight, and
//! a superseded one never fires: its timer task is aborted, and a
//! generation check drops anything it managed to send before the abort.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period before a search runs.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub struct SearchDebouncer {
    quiet: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<(u64, String)>,
    rx: mpsc::UnboundedReceiver<(u64, String)>,
}

impl SearchDebouncer {
    pub fn new(quiet: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            quiet,
            generation: 0,
            pending: None,
            tx,
            rx,
        }
    }

    /// Replace any pending evaluation with one for `query`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, query: impl Into<String>) {
        self.cancel();
        let generation = self.generation;
        let query = query.into();
        let quiet = self.quiet;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send((generation, query));
        }));
    }

    /// Drop the pending evaluation, if any.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the current evaluation to come due and return its query.
    ///
    /// Pends forever while nothing is scheduled. Cancel-safe, so it can
    /// sit in a `select!` arm.
    pub async fn fired(&mut self) -> String {
        loop {
            let Some((generation, query)) = self.rx.recv().await else {
                // Unreachable while `self.tx` is alive.
                return std::future::pending().await;
            };
            if generation == self.generation {
                self.pending = None;
                return query;
            }
            tracing::trace!(generation, "dropping stale search evaluation");
        }
    }
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
