//! IPC between the daemon and its clients: MessagePack over a Unix socket.

pub mod codec;
pub mod protocol;
