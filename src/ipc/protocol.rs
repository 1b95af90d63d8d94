//! Wire protocol message types for daemon IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and
//! `id` fields. Requests carry a client-chosen `id` that the matching
//! `response` echoes. `hello`/`hello_ack` always use id 0, as do
//! unsolicited `history_changed` pushes.
//!
//! `toggle_favorite` and `remove` on an entry that no longer exists are
//! no-ops answered with `ok` and `changed: false`. `restore` of a
//! missing entry fails with `entry_not_found`, since nothing can be
//! written to the clipboard.

use serde::{Deserialize, Serialize};

use crate::history::search::Searchable;
use crate::history::{ClipEntry, EntryKind};

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32 },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Queries --
    #[serde(rename = "list")]
    List { id: u32 },

    // -- Mutations --
    #[serde(rename = "ingest")]
    Ingest {
        id: u32,
        kind: EntryKind,
        /// UTF-8 text for `text`, raw image bytes for `image`.
        #[serde(with = "serde_bytes")]
        content: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },

    #[serde(rename = "toggle_favorite")]
    ToggleFavorite { id: u32, entry: u64 },

    #[serde(rename = "remove")]
    Remove { id: u32, entry: u64 },

    #[serde(rename = "clear")]
    Clear { id: u32 },

    // -- Clipboard --
    #[serde(rename = "restore")]
    Restore { id: u32, entry: u64 },

    // -- Import / export --
    #[serde(rename = "export")]
    Export { id: u32 },

    #[serde(rename = "import")]
    Import {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    // -- Change notification --
    #[serde(rename = "subscribe")]
    Subscribe { id: u32 },

    /// Unsolicited push to subscribers after every mutation.
    #[serde(rename = "history_changed")]
    HistoryChanged {
        id: u32,
        revision: u64,
        len: u32,
        /// Preview of a newly copied entry, when copy notifications
        /// are enabled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        copied: Option<String>,
    },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Payload>,
    },
}

/// Operation-specific response data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// `list`: the history, newest first.
    Entries(Vec<EntryDescriptor>),
    /// `ingest`, `remove`, `clear`: whether the history changed. Also
    /// answers `toggle_favorite` on a missing entry.
    Changed(bool),
    /// `toggle_favorite`: the new flag value.
    Favorite(bool),
    /// `export`: destination path.
    Exported(String),
    /// `import`: number of valid records imported.
    Imported(u32),
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Entry as seen by clients. Image bytes are not sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub entry: u64,
    pub kind: EntryKind,
    pub timestamp: u64,
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub byte_length: u32,
}

impl From<&ClipEntry> for EntryDescriptor {
    fn from(entry: &ClipEntry) -> Self {
        Self {
            entry: entry.id().get(),
            kind: entry.kind(),
            timestamp: entry.created_at(),
            favorite: entry.is_favorite(),
            text: entry.as_text().map(str::to_string),
            mime_type: entry.mime_type().map(str::to_string),
            byte_length: u32::try_from(entry.byte_length()).unwrap_or(u32::MAX),
        }
    }
}

impl Searchable for EntryDescriptor {
    fn search_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn is_favorite(&self) -> bool {
        self.favorite
    }
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the daemon as a fallback when [`Message`] deserialization
/// fails (e.g. unknown `type` tag), so the error response can echo the
/// request `id`.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Consumed by serde for structural matching; not read by daemon code.
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub msg_type: String,
    pub id: u32,
}

impl Message {
    /// Successful response without payload.
    pub fn ok(id: u32) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            payload: None,
        }
    }

    /// Successful response carrying `payload`.
    pub fn ok_with(id: u32, payload: Payload) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            payload: Some(payload),
        }
    }

    /// Error response with a reason string.
    pub fn error(id: u32, reason: impl Into<String>) -> Self {
        Message::Response {
            id,
            status: Status::Error,
            error: Some(reason.into()),
            payload: None,
        }
    }
}
