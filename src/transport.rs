//! Transport boundary.
//!
//! The replication core does not own an RPC stack; it consumes a
//! connection abstraction that exposes session identifiers, connect and
//! disconnect events, and best-effort sends of opaque byte buffers tagged
//! with a request type. Framing and delivery are the transport's problem.

use crate::session::SessionId;
use crate::Result;

/// Tags distinguishing the traffic classes multiplexed over one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReqType {
    /// Raft request-vote RPC between replicas.
    RequestVote = 3,
    /// Raft append-entries RPC between replicas.
    AppendEntries = 4,
    /// Client-to-replica write request.
    ClientRequest = 5,
}

/// Session lifecycle events delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { session_id: SessionId },
    Disconnected { session_id: SessionId },
}

/// Outbound side of the connection abstraction.
pub trait Transport {
    /// Enqueue `payload` on `session_id`. An `Err` means transient
    /// backpressure: the caller counts it and relies on the engine's own
    /// retry logic, never crashes.
    fn send(&mut self, session_id: SessionId, req: ReqType, payload: &[u8]) -> Result<()>;
}
