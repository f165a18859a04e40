//! Session directory and replica identity.
//!
//! The transport reports connect/disconnect events keyed by a session
//! identifier; the directory maps those to stable logical indices. Entries
//! are marked disconnected in place and never removed, so indices handed
//! out earlier stay valid.

use crate::raft::NodeId;

/// Transport-level session identifier.
pub type SessionId = i32;

/// One peer-to-peer or client-to-peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEntry {
    pub session_id: SessionId,
    /// Stable index of this entry in the directory.
    pub index: usize,
    pub connected: bool,
}

/// Append-only map from transport sessions to logical indices.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    entries: Vec<SessionEntry>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly established session and return its stable index.
    pub fn register(&mut self, session_id: SessionId) -> usize {
        let index = self.entries.len();
        self.entries.push(SessionEntry {
            session_id,
            index,
            connected: true,
        });
        tracing::info!(session_id, index, "session connected");
        index
    }

    /// Mark a session disconnected in place. The entry is never reused for
    /// a different peer.
    ///
    /// # Panics
    ///
    /// Panics if the session id was never registered; an event for an
    /// unknown session is a transport protocol violation.
    pub fn mark_disconnected(&mut self, session_id: SessionId) -> usize {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.session_id == session_id)
            .unwrap_or_else(|| panic!("event for unregistered session {session_id}"));
        entry.connected = false;
        tracing::info!(session_id, index = entry.index, "session disconnected");
        entry.index
    }

    pub fn get(&self, index: usize) -> Option<&SessionEntry> {
        self.entries.get(index)
    }

    pub fn index_of(&self, session_id: SessionId) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.session_id == session_id)
            .map(|e| e.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive a deterministic node id from a process's network identity.
///
/// The id is a 32-bit hash of the URI, unique per process in practice but
/// *not* guaranteed collision-free across a cluster. That risk is accepted
/// rather than papered over with an id-assignment scheme this system does
/// not have.
pub fn derive_node_id(uri: &str) -> NodeId {
    crc32fast::hash(uri.as_bytes())
}
