//! Daemon configuration, built from command-line arguments.

use std::time::Duration;

pub const MIN_CAPACITY: usize = 5;
pub const MAX_CAPACITY: usize = 50;
pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_PREVIEW_LENGTH: usize = 15;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings the history engine runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of entries kept.
    pub history_capacity: usize,
    /// Characters shown in copy notifications.
    pub preview_length: usize,
    /// Attach a preview of each newly copied entry to change pushes.
    pub notify_on_copy: bool,
    /// How often the clipboard is polled.
    pub poll_interval: Duration,
    /// Longest the loop waits on a single clipboard read or write.
    pub clipboard_timeout: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            preview_length: DEFAULT_PREVIEW_LENGTH,
            notify_on_copy: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clipboard_timeout: DEFAULT_CLIPBOARD_TIMEOUT,
        }
    }
}
