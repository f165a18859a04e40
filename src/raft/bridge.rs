//! Host-side implementation of the consensus engine's callback set.
//!
//! [`HostBridge`] owns the log backend and the key-value table and wires
//! every [`RaftHost`] callback to them. Supported callbacks delegate to the
//! log or the apply path; unsupported ones (compaction, configuration
//! changes, snapshots) fail loudly instead of degrading silently.

use crate::fsm::{key_hash, ClientRequest, Table, TableResult};
use crate::log::{EntryKind, LogRecord, LogStore};
use crate::raft::{MembershipEvent, NodeId, RaftHost, Term};

/// Bridges the engine's callbacks to the log backend and the table.
pub struct HostBridge<T: Table> {
    log: Box<dyn LogStore>,
    table: T,
    entries_applied: u64,
}

impl<T: Table> HostBridge<T> {
    pub fn new(log: Box<dyn LogStore>, table: T) -> Self {
        Self {
            log,
            table,
            entries_applied: 0,
        }
    }

    pub fn log(&self) -> &dyn LogStore {
        self.log.as_ref()
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Number of entries applied to the table since startup.
    pub fn entries_applied(&self) -> u64 {
        self.entries_applied
    }
}

impl<T: Table> RaftHost for HostBridge<T> {
    fn apply_entry(&mut self, record: &LogRecord) {
        assert_eq!(
            record.kind,
            EntryKind::Normal,
            "apply of a non-application entry at index {}",
            record.index
        );
        // Other callbacks handle arbitrary opaque payloads; the apply path
        // alone knows the exact shape of what it consumes.
        let request = ClientRequest::from_bytes(&record.payload).unwrap_or_else(|| {
            panic!(
                "apply at index {}: payload of {} bytes is not a client request",
                record.index,
                record.payload.len()
            )
        });

        tracing::trace!(index = record.index, term = record.term, "applying entry");

        let result = self
            .table
            .set(key_hash(&request.key), &request.key, &request.value);
        assert_eq!(
            result,
            TableResult::Success,
            "table rejected a committed write at index {}",
            record.index
        );
        self.entries_applied += 1;
    }

    fn persist_vote(&mut self, voted_for: Option<NodeId>) {
        if let Err(e) = self.log.persist_vote(voted_for) {
            panic!("failed to persist vote: {e}");
        }
    }

    fn persist_hard_state(&mut self, term: Term, voted_for: Option<NodeId>) {
        if let Err(e) = self.log.persist_hard_state(term, voted_for) {
            panic!("failed to persist hard state: {e}");
        }
    }

    fn offer_entry(&mut self, record: &LogRecord) {
        if let Err(e) = self.log.append(record) {
            panic!("failed to append log entry {}: {e}", record.index);
        }
    }

    fn pop_entry(&mut self) {
        self.log.remove_last();
    }

    fn poll_entry(&mut self) {
        self.log.remove_first();
    }

    fn entry_node_id(&mut self, record: &LogRecord) -> NodeId {
        panic!(
            "configuration-change entries are unsupported (index {})",
            record.index
        );
    }

    fn node_has_sufficient_logs(&mut self, node: NodeId) {
        tracing::info!(node, "ignoring node_has_sufficient_logs notification");
    }

    fn membership_event(&mut self, node: NodeId, event: MembershipEvent) {
        tracing::info!(node, ?event, "ignoring membership event");
    }

    fn send_snapshot(&mut self, node: NodeId) {
        panic!("snapshot transfer to node {node} is unsupported");
    }
}
