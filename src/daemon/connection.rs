//! Per-connection task: framed I/O, handshake, command forwarding.
//!
//! Each client connection runs a task that reads the mandatory `hello`
//! first, then forwards every request to the daemon loop and writes the
//! response back, interleaved with `history_changed` pushes. On exit the
//! daemon loop is told so it can drop the connection's subscription.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::state::ConnectionId;

/// Request forwarded from a connection task to the daemon loop.
#[derive(Debug)]
pub struct DaemonCommand {
    pub request: Message,
    pub response_tx: oneshot::Sender<Message>,
    pub connection_id: ConnectionId,
}

/// Sent when a connection closes.
#[derive(Debug)]
pub struct DisconnectNotice {
    pub connection_id: ConnectionId,
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("daemon loop closed")]
    DaemonGone,
    #[error("response channel closed")]
    ResponseDropped,
}

/// Spawn the task serving one connection.
pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<DaemonCommand>,
    push_rx: mpsc::UnboundedReceiver<Message>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        if let Err(e) = serve_connection(stream, conn_id, cmd_tx, push_rx).await {
            tracing::debug!(?conn_id, error = %e, "connection closed");
        }
        let _ = disconnect_tx.send(DisconnectNotice {
            connection_id: conn_id,
        });
    });
}

async fn serve_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<DaemonCommand>,
    mut push_rx: mpsc::UnboundedReceiver<Message>,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // -- Handshake --
    let first = framed.next().await.ok_or(ConnectionError::HandshakeEof)??;
    let hello = match decode_frame(&first) {
        DecodeResult::Ok(msg @ Message::Hello { .. }) => msg,
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(e.into()),
    };

    let ack = forward(&cmd_tx, hello, conn_id).await?;
    let rejected = matches!(
        ack,
        Message::HelloAck {
            status: Status::Error,
            ..
        }
    );
    framed.send(ack).await?;
    if rejected {
        return Ok(());
    }

    // -- Requests and pushes --
    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(raw) => raw?,
                    None => return Ok(()),
                };
                let response = match decode_frame(&raw) {
                    DecodeResult::Ok(msg) => forward(&cmd_tx, msg, conn_id).await?,
                    DecodeResult::UnknownType(envelope) => {
                        Message::error(envelope.id, "unknown_type")
                    }
                    DecodeResult::Malformed(e) => return Err(e.into()),
                };
                framed.send(response).await?;
            }
            push = push_rx.recv() => {
                match push {
                    Some(msg) => framed.send(msg).await?,
                    // Daemon loop dropped our sender: shutting down.
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Hand a request to the daemon loop and wait for its response.
async fn forward(
    cmd_tx: &mpsc::UnboundedSender<DaemonCommand>,
    request: Message,
    conn_id: ConnectionId,
) -> Result<Message, ConnectionError> {
    let (response_tx, response_rx) = oneshot::channel();
    cmd_tx
        .send(DaemonCommand {
            request,
            response_tx,
            connection_id: conn_id,
        })
        .map_err(|_| ConnectionError::DaemonGone)?;
    response_rx
        .await
        .map_err(|_| ConnectionError::ResponseDropped)
}
