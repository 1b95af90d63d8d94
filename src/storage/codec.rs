//! Persistence codec: history ⇄ JSON record list.
//!
//! File format: a JSON array, one record per entry, newest first:
//!
//! ```text
//! [{ "type": 0|1, "timestamp": <epoch-ms>, "favorite": <bool>,
//!    "content": <string|null>, "mimeType": <string, image only> }, ...]
//! ```
//!
//! Image bytes are not persisted: image records keep their MIME type,
//! timestamp and favorite flag, and come back with no data.

use serde::{Deserialize, Serialize};

use crate::history::{ClipContent, ClipEntry, DEFAULT_IMAGE_MIME, epoch_millis};

/// Record `type` value for text entries.
pub const TYPE_TEXT: i64 = 0;
/// Record `type` value for image entries.
pub const TYPE_IMAGE: i64 = 1;

#[derive(Debug, Serialize)]
struct RecordOut<'a> {
    #[serde(rename = "type")]
    kind: i64,
    timestamp: u64,
    favorite: bool,
    content: Option<&'a str>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

/// Untrusted record as read from disk. Every field is optional so a
/// single bad record never fails the whole list.
#[derive(Debug, Deserialize)]
struct RecordIn {
    #[serde(rename = "type")]
    kind: Option<i64>,
    timestamp: Option<u64>,
    favorite: Option<bool>,
    content: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

/// Why a byte buffer could not be read as a record list at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("top-level value is not an array")]
    NotAnArray,
}

/// Successfully parsed record list.
#[derive(Debug)]
pub struct Decoded {
    /// Valid entries, in file order.
    pub entries: Vec<ClipEntry>,
    /// Number of records dropped by validation.
    pub dropped: usize,
}

/// Serialize the history to pretty-printed JSON.
///
/// Text entries without content are skipped with a warning. Unknown
/// timestamps (0) are written as the current time.
pub fn serialize(entries: &[ClipEntry]) -> Result<Vec<u8>, serde_json::Error> {
    let now = epoch_millis();
    let mut records = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let timestamp = if entry.created_at() == 0 {
            now
        } else {
            entry.created_at()
        };
        let record = match entry.content() {
            ClipContent::Text(text) if text.is_empty() => {
                tracing::warn!(index, "text entry without content, skipping");
                continue;
            }
            ClipContent::Text(text) => RecordOut {
                kind: TYPE_TEXT,
                timestamp,
                favorite: entry.is_favorite(),
                content: Some(text.as_str()),
                mime_type: None,
            },
            ClipContent::Image { mime_type, .. } => RecordOut {
                kind: TYPE_IMAGE,
                timestamp,
                favorite: entry.is_favorite(),
                content: None,
                mime_type: Some(if mime_type.is_empty() {
                    DEFAULT_IMAGE_MIME
                } else {
                    mime_type.as_str()
                }),
            },
        };
        records.push(record);
    }

    serde_json::to_vec_pretty(&records)
}

/// Strictly parse a record list, validating each record.
///
/// Fails only when the buffer is not JSON or not an array. Invalid
/// records (unknown `type`, text without content, wrong field types)
/// are dropped and counted.
pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let serde_json::Value::Array(items) = value else {
        return Err(DecodeError::NotAnArray);
    };

    let total = items.len();
    let mut entries = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RecordIn>(item) {
            Ok(record) => match into_entry(record) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(index, "invalid history record, skipping"),
            },
            Err(e) => tracing::warn!(index, error = %e, "malformed history record, skipping"),
        }
    }

    let dropped = total - entries.len();
    if dropped > 0 {
        tracing::info!(dropped, kept = entries.len(), "filtered invalid history records");
    }
    Ok(Decoded { entries, dropped })
}

/// Soft variant of [`decode`]: any failure yields an empty history.
pub fn deserialize(bytes: &[u8]) -> Vec<ClipEntry> {
    match decode(bytes) {
        Ok(decoded) => decoded.entries,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable history data, starting empty");
            Vec::new()
        }
    }
}

fn into_entry(record: RecordIn) -> Option<ClipEntry> {
    let timestamp = record.timestamp.unwrap_or(0);
    let favorite = record.favorite.unwrap_or(false);
    let entry = match record.kind? {
        TYPE_TEXT => {
            let content = record.content.filter(|c| !c.is_empty())?;
            ClipEntry::text(content, timestamp)
        }
        TYPE_IMAGE => {
            let mime_type = record
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
            ClipEntry::image(None, mime_type, timestamp)
        }
        _ => return None,
    };
    Some(entry.with_favorite(favorite))
}
