//! X11 clipboard provider: read/write via `xclip`.
//!
//! Wraps `xclip -selection clipboard`. Text is read with the default
//! target; images are found by listing `TARGETS` and reading the first
//! `image/*` target. Calls are synchronous (`std::process::Command`);
//! the daemon runs them on blocking tasks.

use std::io::Write;
use std::process::{Command, Stdio};

use bytes::Bytes;

use super::{ClipboardError, ClipboardProvider};

/// `ClipboardProvider` backed by the `xclip` binary.
#[derive(Debug, Clone, Default)]
pub struct XclipProvider;

impl XclipProvider {
    pub fn new() -> Self {
        Self
    }

    /// Run `xclip -selection clipboard <args> -o`. `Ok(None)` when xclip
    /// exits non-zero, which it does when the target is not available.
    fn read_target(&self, target: Option<&str>) -> Result<Option<Vec<u8>>, ClipboardError> {
        let mut cmd = Command::new("xclip");
        cmd.args(["-selection", "clipboard"]);
        if let Some(target) = target {
            cmd.args(["-t", target]);
        }
        let output = cmd
            .arg("-o")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| ClipboardError::Unavailable(format!("failed to spawn xclip -o: {e}")))?;

        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    fn write_target(&self, content: &[u8], target: Option<&str>) -> Result<(), ClipboardError> {
        let mut cmd = Command::new("xclip");
        cmd.args(["-selection", "clipboard"]);
        if let Some(target) = target {
            cmd.args(["-t", target]);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClipboardError::Unavailable(format!("failed to spawn xclip: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content)
                .map_err(|e| ClipboardError::Io(format!("failed to write to xclip: {e}")))?;
            // Drop stdin to close the pipe so xclip can finish.
        }

        let status = child
            .wait()
            .map_err(|e| ClipboardError::Io(format!("failed to wait for xclip: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::Io(format!(
                "xclip exited with status {status}"
            )))
        }
    }
}

impl ClipboardProvider for XclipProvider {
    fn get_text(&self) -> Result<Option<String>, ClipboardError> {
        let Some(targets) = self.read_target(Some("TARGETS"))? else {
            return Ok(None);
        };
        if !has_text_target(&String::from_utf8_lossy(&targets)) {
            return Ok(None);
        }
        let bytes = self.read_target(Some("UTF8_STRING"))?;
        Ok(bytes.and_then(|b| String::from_utf8(b).ok()))
    }

    fn get_content(&self) -> Result<Option<(Bytes, String)>, ClipboardError> {
        let Some(targets) = self.read_target(Some("TARGETS"))? else {
            return Ok(None);
        };
        let Some(mime_type) = first_image_target(&String::from_utf8_lossy(&targets)) else {
            return Ok(None);
        };
        let bytes = self.read_target(Some(&mime_type))?;
        Ok(bytes
            .filter(|b| !b.is_empty())
            .map(|b| (Bytes::from(b), mime_type)))
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.write_target(text.as_bytes(), None)
    }

    fn set_content(&self, data: &[u8], mime_type: &str) -> Result<(), ClipboardError> {
        self.write_target(data, Some(mime_type))
    }
}

/// Whether a `TARGETS` listing offers plain text.
fn has_text_target(targets: &str) -> bool {
    targets
        .lines()
        .map(str::trim)
        .any(|t| matches!(t, "UTF8_STRING" | "STRING" | "TEXT" | "text/plain" | "text/plain;charset=utf-8"))
}

/// First `image/*` entry of a `TARGETS` listing.
fn first_image_target(targets: &str) -> Option<String> {
    targets
        .lines()
        .map(str::trim)
        .find(|t| t.starts_with("image/"))
        .map(str::to_string)
}
