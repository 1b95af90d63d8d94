//! CLI client for daemon operations.
//!
//! One-shot commands connect, perform a single request, print the
//! result and exit. `watch` and `browse` stay connected: the former
//! prints pushed changes, the latter runs debounced searches over the
//! history as query lines arrive on stdin.

mod daemon_client;
mod format;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::ClientAction;
use crate::history::debounce::SearchDebouncer;
use crate::history::search;
use crate::ipc::codec::CodecError;
use daemon_client::DaemonClient;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach daemon: {0}")]
    Connect(String),
    /// The daemon rejected a request; carries its reason.
    #[error("daemon: {0}")]
    Daemon(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidPath(std::path::PathBuf),
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    #[error("prompt: {0}")]
    Prompt(#[from] inquire::InquireError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a client command against the daemon.
pub async fn run(action: ClientAction) -> Result<(), ClientError> {
    let mut daemon = DaemonClient::connect().await?;

    match action {
        ClientAction::List { query } => {
            let entries = daemon.list().await?;
            let query = query.unwrap_or_default();
            format::print_history(&search::apply(&entries, &query), &query);
        }
        ClientAction::Add { text } => {
            let changed = daemon.add_text(&text).await?;
            format::print_added(changed);
        }
        ClientAction::Favorite { id } => {
            match daemon.toggle_favorite(id).await? {
                Some(favorite) => format::print_favorite(id, favorite),
                None => format::print_missing(id),
            }
        }
        ClientAction::Remove { id } => {
            if daemon.remove(id).await? {
                format::print_removed(id);
            } else {
                format::print_missing(id);
            }
        }
        ClientAction::Clear { yes } => {
            if yes || confirm("Clear the whole clipboard history, favorites included?")? {
                let changed = daemon.clear().await?;
                format::print_cleared(changed);
            }
        }
        ClientAction::Restore { id } => {
            daemon.restore(id).await?;
            format::print_restored(id);
        }
        ClientAction::Export => {
            let path = daemon.export().await?;
            format::print_exported(&path);
        }
        ClientAction::Import { path, yes } => {
            if yes || confirm("Replace the current history with the imported file?")? {
                let count = daemon.import(path.as_deref()).await?;
                format::print_imported(count);
            }
        }
        ClientAction::Watch => watch(&mut daemon).await?,
        ClientAction::Browse => browse(&mut daemon).await?,
    }

    Ok(())
}

/// Ask a yes/no question; defaults to no.
fn confirm(question: &str) -> Result<bool, ClientError> {
    let answer = inquire::Confirm::new(question)
        .with_default(false)
        .prompt()?;
    if !answer {
        println!("Cancelled");
    }
    Ok(answer)
}

async fn watch(daemon: &mut DaemonClient) -> Result<(), ClientError> {
    daemon.subscribe().await?;
    println!("Watching clipboard history (Ctrl-C to stop)");
    while let Some(event) = daemon.next_change().await? {
        format::print_change(&event);
    }
    println!("Daemon closed the connection");
    Ok(())
}

/// Interactive search: each stdin line replaces the query; the view is
/// rendered once typing pauses.
async fn browse(daemon: &mut DaemonClient) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut debouncer = SearchDebouncer::default();

    show(daemon, "").await?;
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(query) => debouncer.schedule(query),
                None => break,
            },
            query = debouncer.fired() => show(daemon, &query).await?,
        }
    }

    // Input closed: run whatever was still pending.
    if debouncer.is_pending() {
        let query = debouncer.fired().await;
        show(daemon, &query).await?;
    }
    Ok(())
}

async fn show(daemon: &mut DaemonClient, query: &str) -> Result<(), ClientError> {
    let entries = daemon.list().await?;
    format::print_history(&search::apply(&entries, query), query);
    Ok(())
}
