//! History daemon: clipboard polling, history ownership, client requests.
//!
//! Architecture: channel-based actor. A single loop owns all mutable
//! state ([`state::DaemonState`]) and multiplexes the clipboard poll
//! tick, requests forwarded by per-connection tasks, disconnects and
//! shutdown. Change notifications reach subscribers through
//! per-connection push channels. Persistence is delegated to a
//! background [`Persister`] so saves never block the loop.

mod connection;
mod handler;
pub mod state;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use connection::{DaemonCommand, DisconnectNotice};
use handler::{Effect, RestoreTarget};
use state::{ConnectionId, DaemonState};

use crate::clipboard::monitor::ClipboardMonitor;
use crate::clipboard::xclip::XclipProvider;
use crate::clipboard::{self, ClipboardError, ClipboardProvider, ClipboardSnapshot};
use crate::config::HistoryConfig;
use crate::history::store::IngestOutcome;
use crate::history::{HistoryStore, Observation};
use crate::ipc::protocol::{Message, Payload};
use crate::storage::transfer::TransferService;
use crate::storage::writer::Persister;
use crate::storage::{self, StorageError, StoragePaths, codec};

/// Daemon startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("daemon already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the daemon until SIGTERM or SIGINT.
///
/// Listens on `$XDG_RUNTIME_DIR/cliprecall/daemon.sock`, polls the X11
/// clipboard through `xclip`, and keeps the history in the user cache
/// directory. The socket file is removed on exit.
pub async fn run(config: HistoryConfig) -> Result<(), DaemonError> {
    let paths = StoragePaths::resolve()?;
    let socket_path = resolve_socket_path()?;
    let listener = bind_socket(&socket_path).await?;

    tracing::info!(
        path = %socket_path.display(),
        store = %paths.registry_file.display(),
        capacity = config.history_capacity,
        "daemon listening"
    );

    let shutdown = CancellationToken::new();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let signalled = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
        signalled.cancel();
    });

    let clipboard: Arc<dyn ClipboardProvider> = Arc::new(XclipProvider::new());
    let result = serve(listener, config, paths, clipboard, shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("daemon stopped");
    result
}

/// Serve clients on `listener` until `shutdown` is cancelled.
///
/// Loads the persisted history, then runs the actor loop. Pending saves
/// are drained before returning.
pub async fn serve(
    listener: UnixListener,
    config: HistoryConfig,
    paths: StoragePaths,
    clipboard: Arc<dyn ClipboardProvider>,
    shutdown: CancellationToken,
) -> Result<(), DaemonError> {
    let loaded = storage::load_history(&paths.registry_file).await;
    let history = HistoryStore::from_entries(loaded, config.history_capacity);
    tracing::info!(
        entries = history.len(),
        capacity = history.capacity(),
        "history ready"
    );
    if history.is_empty() {
        tracing::debug!("starting with an empty history");
    }

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<DaemonCommand>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut daemon = Daemon {
        state: DaemonState::new(history),
        persister: Persister::spawn(paths.registry_file.clone()),
        transfer: TransferService::new(paths),
        clipboard,
        monitor: ClipboardMonitor::new(),
        stalled_read: None,
        push_senders: HashMap::new(),
        config,
    };

    loop {
        tokio::select! {
            // -- New connection --
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => daemon.accept(stream, &cmd_tx, &disconnect_tx),
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }

            // -- Request from a connection task --
            Some(cmd) = cmd_rx.recv() => daemon.handle_command(cmd).await,

            // -- Connection closed --
            Some(notice) = disconnect_rx.recv() => daemon.disconnect(notice.connection_id),

            // -- Clipboard poll --
            _ = ticker.tick() => daemon.poll_clipboard().await,

            _ = shutdown.cancelled() => break,
        }
    }

    daemon.persister.shutdown().await;
    Ok(())
}

/// Everything the daemon loop owns.
struct Daemon {
    state: DaemonState,
    persister: Persister,
    transfer: TransferService,
    clipboard: Arc<dyn ClipboardProvider>,
    monitor: ClipboardMonitor,
    /// A clipboard read that outlived the timeout. No new read starts
    /// until it returns.
    stalled_read: Option<JoinHandle<ClipboardSnapshot>>,
    push_senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    config: HistoryConfig,
}

impl Daemon {
    fn accept(
        &mut self,
        stream: UnixStream,
        cmd_tx: &mpsc::UnboundedSender<DaemonCommand>,
        disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
    ) {
        let conn_id = ConnectionId::new();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        self.push_senders.insert(conn_id, push_tx);
        connection::spawn_connection(
            stream,
            conn_id,
            cmd_tx.clone(),
            push_rx,
            disconnect_tx.clone(),
        );
        tracing::debug!(?conn_id, "accepted connection");
    }

    fn disconnect(&mut self, conn_id: ConnectionId) {
        self.push_senders.remove(&conn_id);
        self.state.remove_connection(conn_id);
        tracing::debug!(
            ?conn_id,
            remaining = self.state.connection_count(),
            "connection cleaned up"
        );
    }

    async fn handle_command(&mut self, cmd: DaemonCommand) {
        let (response, effect) =
            handler::handle_message(&mut self.state, cmd.request, cmd.connection_id);
        let response = match effect {
            Some(effect) => self.apply(effect, response).await,
            None => response,
        };
        let _ = cmd.response_tx.send(response);
    }

    /// Carry out a handler effect. Returns the response to send, which
    /// replaces the provisional one for deferred operations.
    async fn apply(&mut self, effect: Effect, response: Message) -> Message {
        match effect {
            Effect::Changed => {
                self.commit(None);
                response
            }
            Effect::Restore { id, target } => self.restore(id, target).await,
            Effect::Export { id } => match self.transfer.export(&self.persister, Local::now()).await
            {
                Ok(dest) => Message::ok_with(id, Payload::Exported(dest.display().to_string())),
                Err(e) => Message::error(id, e.to_string()),
            },
            Effect::Import { id, path } => {
                match self.transfer.import(path.as_deref(), &self.persister).await {
                    Ok(imported) => {
                        let count = u32::try_from(imported.count()).unwrap_or(u32::MAX);
                        self.state.history_mut().replace_all(imported.entries);
                        // The store file already holds the imported bytes.
                        self.notify(None);
                        Message::ok_with(id, Payload::Imported(count))
                    }
                    Err(e) => Message::error(id, e.to_string()),
                }
            }
        }
    }

    /// Poll the clipboard once and ingest whatever changed.
    ///
    /// The read is bounded by the clipboard timeout. A read that hangs
    /// is left to finish on its own and its result is discarded.
    async fn poll_clipboard(&mut self) {
        if let Some(stalled) = self.stalled_read.take() {
            if !stalled.is_finished() {
                self.stalled_read = Some(stalled);
                return;
            }
            tracing::debug!("stalled clipboard read finished");
        }

        let provider = Arc::clone(&self.clipboard);
        let mut read =
            tokio::task::spawn_blocking(move || clipboard::take_snapshot(provider.as_ref()));
        let snapshot = match tokio::time::timeout(self.config.clipboard_timeout, &mut read).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "clipboard poll task failed");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.clipboard_timeout.as_millis() as u64,
                    "clipboard read timed out"
                );
                self.stalled_read = Some(read);
                return;
            }
        };

        for observation in self.monitor.observe(snapshot) {
            let copied = match self.state.history_mut().ingest(observation) {
                IngestOutcome::Unchanged => continue,
                IngestOutcome::Discarded => {
                    tracing::debug!("copy dropped, history is full of favorites");
                    continue;
                }
                IngestOutcome::MovedToFront(id) => {
                    tracing::debug!(entry = %id, "copied entry moved to front");
                    None
                }
                IngestOutcome::Inserted { id, evicted } => {
                    tracing::debug!(entry = %id, "new clipboard entry recorded");
                    if let Some(evicted) = evicted {
                        tracing::debug!(entry = %evicted, "evicted to stay within capacity");
                    }
                    if self.config.notify_on_copy {
                        self.state
                            .history()
                            .get(id)
                            .map(|entry| entry.preview(self.config.preview_length))
                    } else {
                        None
                    }
                }
            };
            self.commit(copied);
        }
    }

    /// Write an entry back to the clipboard.
    ///
    /// Restored text moves to the front of the history right away; the
    /// monitor is told about the write so the next poll ignores it.
    async fn restore(&mut self, id: u32, target: RestoreTarget) -> Message {
        let provider = Arc::clone(&self.clipboard);
        let write = tokio::task::spawn_blocking(move || {
            let result = write_clipboard(provider.as_ref(), &target);
            (target, result)
        });

        let target = match tokio::time::timeout(self.config.clipboard_timeout, write).await {
            Ok(Ok((target, Ok(())))) => target,
            Ok(Ok((_, Err(e)))) => {
                tracing::warn!(error = %e, "restore failed");
                return Message::error(id, "clipboard_failed");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "restore task failed");
                return Message::error(id, "clipboard_failed");
            }
            Err(_) => {
                tracing::warn!("clipboard write timed out");
                return Message::error(id, "clipboard_failed");
            }
        };

        match target {
            RestoreTarget::Text(text) => {
                self.monitor.note_written_text(&text);
                if self
                    .state
                    .history_mut()
                    .ingest(Observation::Text(text))
                    .changed()
                {
                    self.commit(None);
                }
            }
            RestoreTarget::Image { data, .. } => self.monitor.note_written_image(data),
        }
        Message::ok(id)
    }

    /// Persist the history and notify subscribers.
    fn commit(&mut self, copied: Option<String>) {
        match codec::serialize(&self.state.history().snapshot()) {
            Ok(bytes) => self.persister.save(bytes),
            Err(e) => tracing::warn!(error = %e, "failed to serialize history"),
        }
        self.notify(copied);
    }

    /// Bump the revision and push `history_changed` to subscribers.
    fn notify(&mut self, copied: Option<String>) {
        let revision = self.state.bump_revision();
        let len = u32::try_from(self.state.history().len()).unwrap_or(u32::MAX);
        for conn_id in self.state.subscribers() {
            let Some(tx) = self.push_senders.get(&conn_id) else {
                continue;
            };
            let push = Message::HistoryChanged {
                id: 0,
                revision,
                len,
                copied: copied.clone(),
            };
            if tx.send(push).is_err() {
                tracing::debug!(?conn_id, "subscriber gone");
            }
        }
    }
}

fn write_clipboard(
    provider: &dyn ClipboardProvider,
    target: &RestoreTarget,
) -> Result<(), ClipboardError> {
    match target {
        RestoreTarget::Text(text) => provider.set_text(text),
        RestoreTarget::Image { data, mime_type } => provider.set_content(data, mime_type),
    }
}

// -- Socket setup --

/// Resolve the daemon socket path from `$XDG_RUNTIME_DIR`.
pub fn resolve_socket_path() -> Result<PathBuf, DaemonError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| DaemonError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir)
        .join(storage::APP_DIR)
        .join("daemon.sock"))
}

/// Create the socket directory (mode 0700) and bind the listener.
///
/// On `EADDRINUSE` the existing socket is probed: a live daemon is an
/// error, a dead socket is removed and the bind retried.
pub async fn bind_socket(path: &Path) -> Result<UnixListener, DaemonError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(|e| DaemonError::MkdirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).map_err(|e| {
            DaemonError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            }
        })?;
    }

    let bind_failed = |e| DaemonError::BindFailed {
        path: path.to_path_buf(),
        source: e,
    };
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(DaemonError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::Framed;

    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::history::EntryKind;
    use crate::ipc::codec::MessageCodec;
    use crate::ipc::protocol::{EntryDescriptor, PROTOCOL_VERSION, Status};

    type Conn = Framed<UnixStream, MessageCodec>;

    struct Harness {
        dir: tempfile::TempDir,
        sock: PathBuf,
        clipboard: Arc<MemoryClipboard>,
        shutdown: CancellationToken,
        task: JoinHandle<Result<(), DaemonError>>,
    }

    fn test_config() -> HistoryConfig {
        HistoryConfig {
            poll_interval: Duration::from_millis(20),
            ..HistoryConfig::default()
        }
    }

    async fn start_in(dir: tempfile::TempDir, config: HistoryConfig) -> Harness {
        let sock = dir.path().join("run").join("daemon.sock");
        let listener = bind_socket(&sock).await.unwrap();
        let clipboard = Arc::new(MemoryClipboard::new());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(
            listener,
            config,
            StoragePaths::under(dir.path()),
            clipboard.clone(),
            shutdown.clone(),
        ));
        Harness {
            dir,
            sock,
            clipboard,
            shutdown,
            task,
        }
    }

    async fn start(config: HistoryConfig) -> Harness {
        start_in(tempfile::tempdir().unwrap(), config).await
    }

    async fn connect(h: &Harness) -> Conn {
        connect_to(&h.sock).await
    }

    async fn connect_to(sock: &Path) -> Conn {
        let stream = UnixStream::connect(sock).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        let ack = send_recv(
            &mut conn,
            Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            },
        )
        .await;
        assert!(matches!(
            ack,
            Message::HelloAck {
                status: Status::Ok,
                ..
            }
        ));
        conn
    }

    async fn send_recv(conn: &mut Conn, msg: Message) -> Message {
        conn.send(msg).await.unwrap();
        conn.next().await.unwrap().unwrap()
    }

    async fn list(conn: &mut Conn) -> Vec<EntryDescriptor> {
        match send_recv(conn, Message::List { id: 50 }).await {
            Message::Response {
                payload: Some(Payload::Entries(entries)),
                ..
            } => entries,
            other => panic!("expected entries, got {other:?}"),
        }
    }

    async fn texts(conn: &mut Conn) -> Vec<String> {
        list(conn).await.into_iter().filter_map(|e| e.text).collect()
    }

    async fn add(conn: &mut Conn, text: &str) {
        let resp = send_recv(
            conn,
            Message::Ingest {
                id: 1,
                kind: EntryKind::Text,
                content: text.as_bytes().to_vec(),
                mime_type: None,
            },
        )
        .await;
        assert_eq!(resp, Message::ok_with(1, Payload::Changed(true)));
    }

    /// Poll `list` until `len` entries are present.
    async fn wait_for_len(conn: &mut Conn, len: usize) -> Vec<EntryDescriptor> {
        for _ in 0..100 {
            let entries = list(conn).await;
            if entries.len() == len {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("history never reached {len} entries");
    }

    fn error_reason(msg: &Message) -> Option<&str> {
        match msg {
            Message::Response { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    // -- Clipboard polling --

    #[tokio::test]
    async fn copied_text_and_image_are_recorded() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;

        h.clipboard.copy_text("from another app");
        let entries = wait_for_len(&mut conn, 1).await;
        assert_eq!(entries[0].text.as_deref(), Some("from another app"));

        h.clipboard.copy_image(b"\x89PNG", "image/png");
        let entries = wait_for_len(&mut conn, 2).await;
        assert_eq!(entries[0].kind, EntryKind::Image);
        assert_eq!(entries[0].byte_length, 4);

        // A static image is not re-recorded on later ticks.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(list(&mut conn).await.len(), 2);
    }

    #[tokio::test]
    async fn subscriber_gets_copy_preview() {
        let config = HistoryConfig {
            notify_on_copy: true,
            preview_length: 8,
            ..test_config()
        };
        let h = start(config).await;
        let mut conn = connect(&h).await;
        assert_eq!(send_recv(&mut conn, Message::Subscribe { id: 2 }).await, Message::ok(2));

        h.clipboard.copy_text("a rather long clipboard text");
        let push = tokio::time::timeout(Duration::from_secs(2), conn.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match push {
            Message::HistoryChanged {
                id, len, copied, ..
            } => {
                assert_eq!(id, 0);
                assert_eq!(len, 1);
                assert_eq!(copied.as_deref(), Some("a rat..."));
            }
            other => panic!("expected history_changed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mutation_pushes_without_preview_when_disabled() {
        let h = start(test_config()).await;
        let mut watcher = connect(&h).await;
        send_recv(&mut watcher, Message::Subscribe { id: 1 }).await;

        let mut conn = connect(&h).await;
        add(&mut conn, "typed").await;

        let push = tokio::time::timeout(Duration::from_secs(2), watcher.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(
            push,
            Message::HistoryChanged {
                len: 1,
                copied: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn copy_dropped_beside_favorites_is_not_announced() {
        let config = HistoryConfig {
            history_capacity: 1,
            ..test_config()
        };
        let h = start(config).await;
        let mut conn = connect(&h).await;
        add(&mut conn, "pinned").await;
        let entry = list(&mut conn).await[0].entry;
        send_recv(&mut conn, Message::ToggleFavorite { id: 2, entry }).await;
        send_recv(&mut conn, Message::Subscribe { id: 3 }).await;

        h.clipboard.copy_text("no room");
        tokio::time::sleep(Duration::from_millis(100)).await;

        // A push would arrive ahead of the list response.
        assert_eq!(texts(&mut conn).await, vec!["pinned"]);

        let resp = send_recv(
            &mut conn,
            Message::Ingest {
                id: 4,
                kind: EntryKind::Text,
                content: b"typed".to_vec(),
                mime_type: None,
            },
        )
        .await;
        assert_eq!(resp, Message::ok_with(4, Payload::Changed(false)));
    }

    // -- Restore --

    #[tokio::test]
    async fn restore_writes_clipboard_and_moves_to_front() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        add(&mut conn, "first").await;
        add(&mut conn, "second").await;

        let older = list(&mut conn).await[1].entry;
        let resp = send_recv(&mut conn, Message::Restore { id: 3, entry: older }).await;
        assert_eq!(resp, Message::ok(3));

        assert_eq!(h.clipboard.current().text.as_deref(), Some("first"));
        assert_eq!(texts(&mut conn).await, vec!["first", "second"]);

        // The poll must not record the restored text again.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(list(&mut conn).await.len(), 2);
    }

    #[tokio::test]
    async fn restore_reports_clipboard_failure() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        add(&mut conn, "x").await;
        h.clipboard.fail_writes(true);

        let entry = list(&mut conn).await[0].entry;
        let resp = send_recv(&mut conn, Message::Restore { id: 4, entry }).await;
        assert_eq!(error_reason(&resp), Some("clipboard_failed"));
    }

    #[tokio::test]
    async fn remove_unknown_entry_is_noop() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        let resp = send_recv(&mut conn, Message::Remove { id: 5, entry: 0 }).await;
        assert_eq!(resp, Message::ok_with(5, Payload::Changed(false)));
    }

    #[tokio::test]
    async fn restore_unknown_entry() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        let resp = send_recv(&mut conn, Message::Restore { id: 6, entry: 0 }).await;
        assert_eq!(error_reason(&resp), Some("entry_not_found"));
    }

    // -- Persistence --

    #[tokio::test]
    async fn history_survives_restart() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        add(&mut conn, "older").await;
        add(&mut conn, "newer").await;
        let favorite = list(&mut conn).await[1].entry;
        send_recv(
            &mut conn,
            Message::ToggleFavorite {
                id: 2,
                entry: favorite,
            },
        )
        .await;
        drop(conn);

        h.shutdown.cancel();
        h.task.await.unwrap().unwrap();

        let h = start_in(h.dir, test_config()).await;
        let mut conn = connect(&h).await;
        let entries = list(&mut conn).await;
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.text.clone().unwrap(), e.favorite))
            .collect();
        assert_eq!(
            summary,
            vec![("newer".to_string(), false), ("older".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn export_then_import_replaces_history() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        add(&mut conn, "keep me").await;

        let exported = match send_recv(&mut conn, Message::Export { id: 6 }).await {
            Message::Response {
                payload: Some(Payload::Exported(path)),
                ..
            } => PathBuf::from(path),
            other => panic!("expected export path, got {other:?}"),
        };
        assert!(exported.starts_with(h.dir.path().join("home")));

        add(&mut conn, "scratch").await;
        assert_eq!(texts(&mut conn).await.len(), 2);

        let resp = send_recv(
            &mut conn,
            Message::Import {
                id: 7,
                path: Some(exported.display().to_string()),
            },
        )
        .await;
        assert_eq!(resp, Message::ok_with(7, Payload::Imported(1)));
        assert_eq!(texts(&mut conn).await, vec!["keep me"]);
    }

    #[tokio::test]
    async fn import_failure_reports_reason() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        let resp = send_recv(&mut conn, Message::Import { id: 8, path: None }).await;
        assert_eq!(error_reason(&resp), Some("File not found"));
    }

    #[tokio::test]
    async fn export_before_any_save_fails() {
        let h = start(test_config()).await;
        let mut conn = connect(&h).await;
        let resp = send_recv(&mut conn, Message::Export { id: 9 }).await;
        assert_eq!(error_reason(&resp), Some("No history to export"));
    }

    // -- Protocol --

    #[tokio::test]
    async fn version_mismatch_closes_connection() {
        let h = start(test_config()).await;
        let stream = UnixStream::connect(&h.sock).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        let resp = send_recv(&mut conn, Message::Hello { id: 0, version: 999 }).await;
        assert!(matches!(
            resp,
            Message::HelloAck { status: Status::Error, error: Some(ref e), .. } if e == "version_mismatch"
        ));
        assert!(conn.next().await.is_none());
    }

    #[tokio::test]
    async fn non_hello_first_message_closes_connection() {
        let h = start(test_config()).await;
        let stream = UnixStream::connect(&h.sock).await.unwrap();
        let mut conn = Framed::new(stream, MessageCodec::new());
        conn.send(Message::List { id: 1 }).await.unwrap();
        assert!(conn.next().await.is_none());
    }

    #[tokio::test]
    async fn unknown_type_keeps_connection_open() {
        use bytes::BufMut;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        #[derive(serde::Serialize)]
        struct Unknown {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }

        async fn write_frame(stream: &mut UnixStream, payload: &[u8]) {
            let mut frame = bytes::BytesMut::new();
            frame.put_u32(payload.len() as u32);
            frame.extend_from_slice(payload);
            stream.write_all(&frame).await.unwrap();
        }

        async fn read_frame(stream: &mut UnixStream) -> Message {
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).await.unwrap();
            let mut buf = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut buf).await.unwrap();
            rmp_serde::from_slice(&buf).unwrap()
        }

        let h = start(test_config()).await;
        let mut stream = UnixStream::connect(&h.sock).await.unwrap();

        let hello = Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
        };
        write_frame(&mut stream, &rmp_serde::to_vec_named(&hello).unwrap()).await;
        assert!(matches!(
            read_frame(&mut stream).await,
            Message::HelloAck {
                status: Status::Ok,
                ..
            }
        ));

        let unknown = Unknown {
            msg_type: "paste",
            id: 42,
        };
        write_frame(&mut stream, &rmp_serde::to_vec_named(&unknown).unwrap()).await;
        let resp = read_frame(&mut stream).await;
        assert_eq!(resp, Message::error(42, "unknown_type"));

        let list = rmp_serde::to_vec_named(&Message::List { id: 7 }).unwrap();
        write_frame(&mut stream, &list).await;
        assert!(matches!(
            read_frame(&mut stream).await,
            Message::Response {
                id: 7,
                status: Status::Ok,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn second_bind_on_live_socket_fails() {
        let h = start(test_config()).await;
        let err = bind_socket(&h.sock).await.unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning(_)));
    }

    /// Clipboard whose text reads block until released.
    #[derive(Default)]
    struct HangingClipboard {
        released: AtomicBool,
        reads: AtomicUsize,
    }

    impl ClipboardProvider for HangingClipboard {
        fn get_text(&self) -> Result<Option<String>, ClipboardError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while !self.released.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(Some("late".into()))
        }

        fn get_content(&self) -> Result<Option<(Bytes, String)>, ClipboardError> {
            Ok(None)
        }

        fn set_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Ok(())
        }

        fn set_content(&self, _data: &[u8], _mime_type: &str) -> Result<(), ClipboardError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn hung_clipboard_read_does_not_block_requests() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("daemon.sock");
        let listener = bind_socket(&sock).await.unwrap();
        let clipboard = Arc::new(HangingClipboard::default());
        let shutdown = CancellationToken::new();
        let config = HistoryConfig {
            clipboard_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let task = tokio::spawn(serve(
            listener,
            config,
            StoragePaths::under(dir.path()),
            clipboard.clone(),
            shutdown.clone(),
        ));

        let mut conn = connect_to(&sock).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let entries = tokio::time::timeout(Duration::from_secs(1), list(&mut conn))
            .await
            .unwrap();
        assert!(entries.is_empty());
        // No new read starts while the first one hangs.
        assert_eq!(clipboard.reads.load(Ordering::SeqCst), 1);

        clipboard.released.store(true, Ordering::SeqCst);
        let entries = wait_for_len(&mut conn, 1).await;
        assert_eq!(entries[0].text.as_deref(), Some("late"));

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("daemon.sock");
        let stale = std::os::unix::net::UnixListener::bind(&sock).unwrap();
        drop(stale);
        assert!(sock.exists());
        assert!(bind_socket(&sock).await.is_ok());
    }
}
