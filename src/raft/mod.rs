//! The consensus boundary: identifier types and the two traits that split
//! the replica from its Raft engine.
//!
//! The engine is external to this crate. The host side implements
//! [`RaftHost`] (the callbacks the engine invokes synchronously while it
//! runs) and calls into the engine through [`ConsensusEngine`] to submit
//! entries, query leadership, and drive its internal timer.

pub mod bridge;
pub mod commit;
pub mod timer;

pub use bridge::HostBridge;
pub use commit::CommitTracker;
pub use timer::PeriodicDriver;

use crate::log::LogRecord;
use crate::Result;

/// Cluster-wide node identifier, derived locally from a process's network
/// identity (see [`crate::session::derive_node_id`]).
pub type NodeId = u32;

/// Raft term number.
pub type Term = u64;

/// Position in the replicated log. The first entry has index 1.
pub type LogIndex = u64;

/// Redirect target used when no leader is currently known.
pub const UNKNOWN_LEADER: NodeId = NodeId::MAX;

/// Identifies one submitted entry so its commit can later be verified.
/// Equivalent to the engine's message-entry response: a commit counts only
/// if both the index and the term at that index match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTicket {
    pub term: Term,
    pub index: LogIndex,
}

/// Membership change notification payload. Observed and logged only; this
/// system does not support dynamic membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    Added,
    Removed,
}

/// Callbacks the consensus engine invokes on its host.
///
/// All callbacks run to completion synchronously on the single worker
/// thread that owns the engine; the engine decides the order and the host
/// must persist/apply in exactly that order. Storage faults and contract
/// violations inside a callback are fatal (panic), never silently dropped;
/// partial support of a consensus safety path is worse than a crash.
pub trait RaftHost {
    /// Apply a committed application entry to the state machine. The entry
    /// must be an application entry carrying exactly one serialized client
    /// request; anything else is a fatal invariant violation.
    fn apply_entry(&mut self, record: &LogRecord);

    /// Durably record the voted-for node before returning. A no-op in
    /// volatile mode, which upholds no crash-recovery guarantee.
    fn persist_vote(&mut self, voted_for: Option<NodeId>);

    /// Durably record term and voted-for together. The two fields must
    /// never be persisted independently of each other.
    fn persist_hard_state(&mut self, term: Term, voted_for: Option<NodeId>);

    /// Append an entry at the next log index.
    fn offer_entry(&mut self, record: &LogRecord);

    /// Remove the most recent log entry. Invoked when a follower discovers
    /// a conflicting leader and must truncate its uncommitted suffix.
    fn pop_entry(&mut self);

    /// Remove the first log entry (compaction). Always fatal: there is no
    /// snapshot mechanism to bound log growth.
    fn poll_entry(&mut self);

    /// Resolve which node a configuration-change entry affects. Always
    /// fatal: configuration changes are unsupported.
    fn entry_node_id(&mut self, record: &LogRecord) -> NodeId;

    /// A non-voting node has caught up enough to be promoted. Observed,
    /// not acted upon.
    fn node_has_sufficient_logs(&mut self, node: NodeId);

    /// Membership change notification. Observed, not acted upon.
    fn membership_event(&mut self, node: NodeId, event: MembershipEvent);

    /// Ship a snapshot to a lagging follower. Always fatal: snapshots are
    /// unsupported.
    fn send_snapshot(&mut self, node: NodeId);
}

/// The calls the replica makes into its consensus engine.
///
/// Every method that can advance engine state takes the host so the engine
/// can invoke [`RaftHost`] callbacks synchronously while it runs.
pub trait ConsensusEngine {
    /// Submit an application entry for replication. On success the engine
    /// has already offered the entry to the log via
    /// [`RaftHost::offer_entry`] and returns the ticket to watch for
    /// commit.
    fn submit(&mut self, host: &mut dyn RaftHost, payload: Vec<u8>) -> Result<CommitTicket>;

    /// Advance the engine's internal timer by `elapsed_ms` milliseconds.
    /// Called on every event-loop iteration; `elapsed_ms` is 0 or 1 (see
    /// [`PeriodicDriver`]).
    fn periodic(&mut self, host: &mut dyn RaftHost, elapsed_ms: u64);

    /// Whether this node currently believes it is the leader.
    fn is_leader(&self) -> bool;

    /// The node this replica currently believes is the leader, if any.
    fn leader_id(&self) -> Option<NodeId>;

    /// Whether the entry identified by `ticket` has been committed at the
    /// same term it was submitted under.
    fn is_committed(&self, ticket: CommitTicket) -> bool;
}
