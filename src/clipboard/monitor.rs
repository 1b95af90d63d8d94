//! Change detection over successive clipboard snapshots.

use bytes::Bytes;

use super::ClipboardSnapshot;
use crate::history::Observation;

/// Remembers the last text and image seen on the clipboard and reports
/// only values that differ from them.
///
/// This is change detection on the source, not deduplication: the
/// history still records every reported image as a new entry.
#[derive(Debug, Default)]
pub struct ClipboardMonitor {
    last_text: Option<String>,
    last_image: Option<Bytes>,
}

impl ClipboardMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a snapshot into at most one text and one image observation.
    pub fn observe(&mut self, snapshot: ClipboardSnapshot) -> Vec<Observation> {
        let mut observations = Vec::new();

        match snapshot.text {
            Some(text) if !text.is_empty() => {
                if self.last_text.as_deref() != Some(text.as_str()) {
                    self.last_text = Some(text.clone());
                    observations.push(Observation::Text(text));
                }
            }
            _ => self.last_text = None,
        }

        match snapshot.image {
            Some((data, mime_type)) if mime_type.starts_with("image/") && !data.is_empty() => {
                if self.last_image.as_ref() != Some(&data) {
                    self.last_image = Some(data.clone());
                    observations.push(Observation::Image { data, mime_type });
                }
            }
            _ => self.last_image = None,
        }

        observations
    }

    /// Record text the daemon itself put on the clipboard.
    pub fn note_written_text(&mut self, text: &str) {
        self.last_text = Some(text.to_string());
    }

    /// Record an image the daemon itself put on the clipboard.
    pub fn note_written_image(&mut self, data: Bytes) {
        self.last_image = Some(data);
    }
}
