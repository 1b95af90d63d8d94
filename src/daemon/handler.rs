//! Message dispatch and request handling.
//!
//! Pure logic, no I/O. Each request mutates [`DaemonState`] and yields
//! a response plus an optional [`Effect`] the daemon loop carries out
//! (persisting, clipboard writes, file transfer).

use std::path::PathBuf;

use bytes::Bytes;

use crate::history::{ClipContent, DEFAULT_IMAGE_MIME, EntryId, EntryKind, Observation};
use crate::ipc::protocol::{EntryDescriptor, Message, PROTOCOL_VERSION, Payload, Status};

use super::state::{ConnectionId, DaemonState};

/// Work the daemon loop performs after a request has been handled.
#[derive(Debug, PartialEq)]
pub enum Effect {
    /// The history changed: persist and notify subscribers.
    Changed,
    /// Put an entry back on the clipboard. The loop builds the response.
    Restore { id: u32, target: RestoreTarget },
    /// Copy the store file to a timestamped export.
    Export { id: u32 },
    /// Replace the history with the contents of a file.
    Import { id: u32, path: Option<PathBuf> },
}

/// Clipboard content to write for a restore.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreTarget {
    Text(String),
    Image { data: Bytes, mime_type: String },
}

/// Dispatch a request to its handler.
///
/// Server-originated variants sent by a client are answered with
/// `unknown_type`.
pub fn handle_message(
    state: &mut DaemonState,
    request: Message,
    connection_id: ConnectionId,
) -> (Message, Option<Effect>) {
    match request {
        Message::Hello { id, version } => (handle_hello(state, id, version, connection_id), None),
        Message::List { id } => (handle_list(state, id), None),
        Message::Ingest {
            id,
            kind,
            content,
            mime_type,
        } => handle_ingest(state, id, kind, content, mime_type),
        Message::ToggleFavorite { id, entry } => {
            match state.history_mut().toggle_favorite(EntryId::from_raw(entry)) {
                Some(favorite) => (
                    Message::ok_with(id, Payload::Favorite(favorite)),
                    Some(Effect::Changed),
                ),
                None => (Message::ok_with(id, Payload::Changed(false)), None),
            }
        }
        Message::Remove { id, entry } => {
            match state.history_mut().remove(EntryId::from_raw(entry)) {
                Some(_) => (
                    Message::ok_with(id, Payload::Changed(true)),
                    Some(Effect::Changed),
                ),
                None => (Message::ok_with(id, Payload::Changed(false)), None),
            }
        }
        Message::Clear { id } => {
            let changed = state.history_mut().clear();
            (
                Message::ok_with(id, Payload::Changed(changed)),
                changed.then_some(Effect::Changed),
            )
        }
        Message::Restore { id, entry } => handle_restore(state, id, entry),
        Message::Export { id } => (Message::ok(id), Some(Effect::Export { id })),
        Message::Import { id, path } => (
            Message::ok(id),
            Some(Effect::Import {
                id,
                path: path.map(PathBuf::from),
            }),
        ),
        Message::Subscribe { id } => {
            state.subscribe(connection_id);
            (Message::ok(id), None)
        }
        Message::HelloAck { id, .. }
        | Message::HistoryChanged { id, .. }
        | Message::Response { id, .. } => (Message::error(id, "unknown_type"), None),
    }
}

// -- Individual handlers --

fn handle_hello(
    state: &mut DaemonState,
    id: u32,
    version: u32,
    connection_id: ConnectionId,
) -> Message {
    let reason = if id != 0 {
        Some("invalid_hello_id")
    } else if version != PROTOCOL_VERSION {
        Some("version_mismatch")
    } else {
        None
    };
    if reason.is_none() {
        state.add_connection(connection_id);
    }
    Message::HelloAck {
        id: 0,
        status: if reason.is_none() {
            Status::Ok
        } else {
            Status::Error
        },
        error: reason.map(str::to_string),
    }
}

fn handle_list(state: &DaemonState, id: u32) -> Message {
    let entries = state
        .history()
        .iter()
        .map(EntryDescriptor::from)
        .collect();
    Message::ok_with(id, Payload::Entries(entries))
}

fn handle_ingest(
    state: &mut DaemonState,
    id: u32,
    kind: EntryKind,
    content: Vec<u8>,
    mime_type: Option<String>,
) -> (Message, Option<Effect>) {
    let observation = match kind {
        EntryKind::Text => match String::from_utf8(content) {
            Ok(text) => Observation::Text(text),
            Err(_) => return (Message::error(id, "invalid_content"), None),
        },
        EntryKind::Image => {
            if content.is_empty() {
                return (Message::error(id, "invalid_content"), None);
            }
            Observation::Image {
                data: Bytes::from(content),
                mime_type: mime_type
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
            }
        }
    };

    let outcome = state.history_mut().ingest(observation);
    let changed = outcome.changed();
    (
        Message::ok_with(id, Payload::Changed(changed)),
        changed.then_some(Effect::Changed),
    )
}

fn handle_restore(state: &DaemonState, id: u32, entry: u64) -> (Message, Option<Effect>) {
    let Some(entry) = state.history().get(EntryId::from_raw(entry)) else {
        return (Message::error(id, "entry_not_found"), None);
    };
    let target = match entry.content() {
        ClipContent::Text(text) => RestoreTarget::Text(text.clone()),
        ClipContent::Image {
            data: Some(data),
            mime_type,
        } => RestoreTarget::Image {
            data: data.clone(),
            mime_type: mime_type.clone(),
        },
        ClipContent::Image { data: None, .. } => {
            return (Message::error(id, "image_unavailable"), None);
        }
    };
    (Message::ok(id), Some(Effect::Restore { id, target }))
}
