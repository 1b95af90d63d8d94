//! Clipboard access: provider abstraction and change detection.
//!
//! The engine never assumes push notification: the daemon polls a
//! [`ClipboardProvider`] and feeds the snapshots through a
//! [`monitor::ClipboardMonitor`], which reports only changes.

pub mod monitor;
pub mod xclip;

use bytes::Bytes;

/// Clipboard errors.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// The helper process could not be run (e.g. xclip not installed).
    #[error("clipboard helper unavailable: {0}")]
    Unavailable(String),
    /// Reading or writing failed.
    #[error("clipboard: {0}")]
    Io(String),
}

/// Reads and writes the system clipboard.
///
/// `Send + Sync` because the daemon calls it from blocking tasks.
pub trait ClipboardProvider: Send + Sync {
    /// Current text content, or `None` when the clipboard holds no text.
    fn get_text(&self) -> Result<Option<String>, ClipboardError>;

    /// Current image content as `(bytes, mime_type)`, or `None` when the
    /// clipboard holds no image.
    fn get_content(&self) -> Result<Option<(Bytes, String)>, ClipboardError>;

    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;

    fn set_content(&self, data: &[u8], mime_type: &str) -> Result<(), ClipboardError>;
}

/// What the clipboard held at one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub text: Option<String>,
    pub image: Option<(Bytes, String)>,
}

/// Read text and image content in one go.
///
/// A failure on one side is logged and treated as "nothing there" so
/// that the other side is still observed.
pub fn take_snapshot(provider: &dyn ClipboardProvider) -> ClipboardSnapshot {
    let text = provider.get_text().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "clipboard text read failed");
        None
    });
    let image = provider.get_content().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "clipboard image read failed");
        None
    });
    ClipboardSnapshot { text, image }
}

/// In-memory clipboard used by tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: std::sync::Mutex<ClipboardSnapshot>,
    fail_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a copy of text by another application.
    pub fn copy_text(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.text = Some(text.to_string());
        state.image = None;
    }

    /// Simulate a copy of an image by another application.
    pub fn copy_image(&self, data: &[u8], mime_type: &str) {
        let mut state = self.state.lock().unwrap();
        state.text = None;
        state.image = Some((Bytes::copy_from_slice(data), mime_type.to_string()));
    }

    pub fn current(&self) -> ClipboardSnapshot {
        self.state.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::Relaxed);
    }

    fn check_writable(&self) -> Result<(), ClipboardError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            Err(ClipboardError::Io("write refused".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
impl ClipboardProvider for MemoryClipboard {
    fn get_text(&self) -> Result<Option<String>, ClipboardError> {
        Ok(self.state.lock().unwrap().text.clone())
    }

    fn get_content(&self) -> Result<Option<(Bytes, String)>, ClipboardError> {
        Ok(self.state.lock().unwrap().image.clone())
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.check_writable()?;
        self.copy_text(text);
        Ok(())
    }

    fn set_content(&self, data: &[u8], mime_type: &str) -> Result<(), ClipboardError> {
        self.check_writable()?;
        self.copy_image(data, mime_type);
        Ok(())
    }
}
