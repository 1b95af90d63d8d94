//! Clipboard history engine: entries, the ordered store, search.
//!
//! Everything in this module is pure state with no I/O. The daemon
//! loop is the only writer; collaborators receive cloned snapshots.

pub mod debounce;
pub mod search;
pub mod store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use store::HistoryStore;

/// MIME type assumed for image entries whose type is unknown.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Process-unique identity of a history entry.
///
/// Monotonically increasing counter. Never persisted: entries loaded
/// from disk receive fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an id received over the wire.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry discriminant, also used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    Image,
}

/// Payload of a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipContent {
    /// Non-empty UTF-8 text.
    Text(String),
    /// Opaque image bytes. `data` is `None` for entries restored from
    /// disk, since image bytes are not persisted.
    Image {
        data: Option<Bytes>,
        mime_type: String,
    },
}

/// One clipboard history record.
///
/// Identity and content are fixed at construction. Only the favorite
/// flag changes, and only through [`HistoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEntry {
    id: EntryId,
    content: ClipContent,
    created_at: u64,
    favorite: bool,
}

impl ClipEntry {
    pub fn text(content: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: EntryId::new(),
            content: ClipContent::Text(content.into()),
            created_at,
            favorite: false,
        }
    }

    pub fn image(data: Option<Bytes>, mime_type: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: EntryId::new(),
            content: ClipContent::Image {
                data,
                mime_type: mime_type.into(),
            },
            created_at,
            favorite: false,
        }
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn content(&self) -> &ClipContent {
        &self.content
    }

    /// Capture time, Unix epoch millis.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn kind(&self) -> EntryKind {
        match self.content {
            ClipContent::Text(_) => EntryKind::Text,
            ClipContent::Image { .. } => EntryKind::Image,
        }
    }

    /// Text content, or `None` for images.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            ClipContent::Text(text) => Some(text),
            ClipContent::Image { .. } => None,
        }
    }

    /// Image MIME type, or `None` for text.
    pub fn mime_type(&self) -> Option<&str> {
        match &self.content {
            ClipContent::Text(_) => None,
            ClipContent::Image { mime_type, .. } => Some(mime_type),
        }
    }

    /// Size of the held payload in bytes (0 for images without data).
    pub fn byte_length(&self) -> usize {
        match &self.content {
            ClipContent::Text(text) => text.len(),
            ClipContent::Image { data, .. } => data.as_ref().map_or(0, Bytes::len),
        }
    }

    /// Short display label.
    ///
    /// Text longer than `max_chars` characters is cut to `max_chars - 3`
    /// characters followed by `...`. Images render as `[Image]`.
    pub fn preview(&self, max_chars: usize) -> String {
        match &self.content {
            ClipContent::Text(text) => truncate_preview(text, max_chars),
            ClipContent::Image { .. } => IMAGE_LABEL.to_string(),
        }
    }
}

/// Display label for image entries.
pub const IMAGE_LABEL: &str = "[Image]";

/// Cut `text` to `max_chars` characters, ending in `...` when shortened.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let keep = max_chars.saturating_sub(3);
        let mut cut: String = text.chars().take(keep).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

/// A clipboard value seen by a collaborator, not yet recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Text(String),
    Image { data: Bytes, mime_type: String },
}

/// Current wall-clock time as Unix epoch millis.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
