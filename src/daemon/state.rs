//! Daemon state: the history plus connection and subscriber tracking.
//!
//! Owned exclusively by the daemon loop; no locking.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::history::HistoryStore;

/// Unique identifier for a client connection.
///
/// Monotonically increasing counter. Used to route change
/// notifications to subscribed connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct DaemonState {
    history: HistoryStore,
    /// Connections that completed the handshake.
    connections: HashSet<ConnectionId>,
    /// Connections that asked for `history_changed` pushes.
    subscribers: HashSet<ConnectionId>,
    /// Bumped on every mutation.
    revision: u64,
}

impl DaemonState {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            history,
            connections: HashSet::new(),
            subscribers: HashSet::new(),
            revision: 0,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn add_connection(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Forget a connection, including its subscription.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.subscribers.remove(&id);
    }

    /// Subscribe a connection to change pushes. Idempotent.
    pub fn subscribe(&mut self, id: ConnectionId) {
        self.subscribers.insert(id);
    }

    pub fn subscribers(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.subscribers.iter().copied()
    }

    /// Record a mutation and return the new revision.
    pub fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}
