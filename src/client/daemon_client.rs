//! Daemon connection for the CLI client.
//!
//! Connects to the daemon socket, performs the handshake, and exposes
//! one method per request. Requests are strictly sequential; pushed
//! `history_changed` frames that arrive while waiting for a response
//! are skipped unless the caller is watching for them.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::daemon;
use crate::history::EntryKind;
use crate::ipc::codec::MessageCodec;
use crate::ipc::protocol::{EntryDescriptor, Message, PROTOCOL_VERSION, Payload, Status};

use super::ClientError;

/// A pushed change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub len: u32,
    pub copied: Option<String>,
}

pub struct DaemonClient {
    framed: Framed<UnixStream, MessageCodec>,
    next_id: u32,
}

impl DaemonClient {
    /// Connect to the daemon at its default socket.
    pub async fn connect() -> Result<Self, ClientError> {
        let socket_path =
            daemon::resolve_socket_path().map_err(|e| ClientError::Connect(e.to_string()))?;
        Self::connect_to(&socket_path).await
    }

    /// Connect to a daemon socket and perform the handshake.
    pub async fn connect_to(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ClientError::Connect(format!("{}: {e} (is the daemon running?)", socket_path.display()))
        })?;
        let mut framed = Framed::new(stream, MessageCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            })
            .await?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Protocol(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Protocol(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self { framed, next_id: 1 })
    }

    pub async fn list(&mut self) -> Result<Vec<EntryDescriptor>, ClientError> {
        let id = self.take_id();
        match self.request(Message::List { id }).await? {
            Some(Payload::Entries(entries)) => Ok(entries),
            None => Ok(Vec::new()),
            other => Err(unexpected("list", other)),
        }
    }

    /// Add text to the history. Returns whether the history changed.
    pub async fn add_text(&mut self, text: &str) -> Result<bool, ClientError> {
        let id = self.take_id();
        let request = Message::Ingest {
            id,
            kind: EntryKind::Text,
            content: text.as_bytes().to_vec(),
            mime_type: None,
        };
        self.changed("ingest", request).await
    }

    /// Flip an entry's favorite flag. Returns the new value, or `None`
    /// when the entry does not exist.
    pub async fn toggle_favorite(&mut self, entry: u64) -> Result<Option<bool>, ClientError> {
        let id = self.take_id();
        match self.request(Message::ToggleFavorite { id, entry }).await? {
            Some(Payload::Favorite(favorite)) => Ok(Some(favorite)),
            Some(Payload::Changed(false)) => Ok(None),
            other => Err(unexpected("toggle_favorite", other)),
        }
    }

    pub async fn remove(&mut self, entry: u64) -> Result<bool, ClientError> {
        let id = self.take_id();
        self.changed("remove", Message::Remove { id, entry }).await
    }

    pub async fn clear(&mut self) -> Result<bool, ClientError> {
        let id = self.take_id();
        self.changed("clear", Message::Clear { id }).await
    }

    pub async fn restore(&mut self, entry: u64) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request(Message::Restore { id, entry }).await?;
        Ok(())
    }

    /// Export the history. Returns the written file's path.
    pub async fn export(&mut self) -> Result<String, ClientError> {
        let id = self.take_id();
        match self.request(Message::Export { id }).await? {
            Some(Payload::Exported(path)) => Ok(path),
            other => Err(unexpected("export", other)),
        }
    }

    /// Import a history file, replacing the current history. Returns
    /// the number of entries imported.
    ///
    /// A relative path is resolved against this process's working
    /// directory, not the daemon's.
    pub async fn import(&mut self, path: Option<&Path>) -> Result<u32, ClientError> {
        let id = self.take_id();
        let path = path.map(wire_path).transpose()?;
        match self.request(Message::Import { id, path }).await? {
            Some(Payload::Imported(count)) => Ok(count),
            other => Err(unexpected("import", other)),
        }
    }

    /// Ask the daemon to push change notifications on this connection.
    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request(Message::Subscribe { id }).await?;
        Ok(())
    }

    /// Wait for the next pushed change. `None` when the daemon closes
    /// the connection.
    pub async fn next_change(&mut self) -> Result<Option<ChangeEvent>, ClientError> {
        loop {
            match self.framed.next().await {
                Some(Ok(Message::HistoryChanged {
                    revision,
                    len,
                    copied,
                    ..
                })) => {
                    return Ok(Some(ChangeEvent {
                        revision,
                        len,
                        copied,
                    }));
                }
                Some(Ok(other)) => {
                    tracing::debug!(?other, "ignoring unexpected frame");
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    async fn changed(&mut self, op: &str, request: Message) -> Result<bool, ClientError> {
        match self.request(request).await? {
            Some(Payload::Changed(changed)) => Ok(changed),
            other => Err(unexpected(op, other)),
        }
    }

    /// Send a request and wait for its response.
    async fn request(&mut self, request: Message) -> Result<Option<Payload>, ClientError> {
        let expected = request_id(&request);
        self.framed.send(request).await?;

        loop {
            match self.framed.next().await {
                Some(Ok(Message::Response {
                    id,
                    status,
                    error,
                    payload,
                })) if id == expected => {
                    return match status {
                        Status::Ok => Ok(payload),
                        Status::Error => Err(ClientError::Daemon(error.unwrap_or_default())),
                    };
                }
                Some(Ok(Message::HistoryChanged { .. })) => continue,
                Some(Ok(other)) => {
                    return Err(ClientError::Protocol(format!(
                        "unexpected response: {other:?}"
                    )));
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(ClientError::Protocol(
                        "daemon closed the connection".into(),
                    ));
                }
            }
        }
    }
}

fn request_id(msg: &Message) -> u32 {
    match msg {
        Message::Hello { id, .. }
        | Message::HelloAck { id, .. }
        | Message::List { id }
        | Message::Ingest { id, .. }
        | Message::ToggleFavorite { id, .. }
        | Message::Remove { id, .. }
        | Message::Clear { id }
        | Message::Restore { id, .. }
        | Message::Export { id }
        | Message::Import { id, .. }
        | Message::Subscribe { id }
        | Message::HistoryChanged { id, .. }
        | Message::Response { id, .. } => *id,
    }
}

/// Absolute, UTF-8 form of a user-supplied path for the daemon.
fn wire_path(path: &Path) -> Result<String, ClientError> {
    let absolute = std::path::absolute(path)?;
    absolute
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidPath(path.to_path_buf()))
}

fn unexpected(op: &str, payload: Option<Payload>) -> ClientError {
    ClientError::Protocol(format!("unexpected {op} payload: {payload:?}"))
}
