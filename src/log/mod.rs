//! Dual-mode append-only log storage.
//!
//! Two interchangeable backends implement [`LogStore`]: a memory-mapped
//! persistent region ([`pmem::PersistentLog`]) and a DRAM vector with
//! pooled payloads ([`volatile::VolatileLog`]). The backend is selected at
//! startup configuration time and never mixed at runtime; everything above
//! the trait is backend-agnostic.

pub mod pmem;
pub mod volatile;

pub use pmem::PersistentLog;
pub use volatile::VolatileLog;

use crate::raft::{LogIndex, NodeId, Term};
use crate::Result;

/// Largest payload a single log record may carry. Application entries are
/// exactly [`crate::fsm::ClientRequest::WIRE_SIZE`] bytes; the slack leaves
/// room for the engine's small internal records, which are stored as opaque
/// data.
pub const MAX_PAYLOAD: usize = 128;

/// What a log record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// An application entry: one serialized client request.
    Normal,
    /// A configuration-change entry. Stored and removed as opaque data, but
    /// never applied; membership changes are unsupported.
    ConfigChange,
}

/// One record of the replicated log, as exchanged with the engine and read
/// back from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub term: Term,
    pub index: LogIndex,
    pub kind: EntryKind,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn new(term: Term, index: LogIndex, kind: EntryKind, payload: Vec<u8>) -> Self {
        Self {
            term,
            index,
            kind,
            payload,
        }
    }
}

/// Term and voted-for as persisted together. Neither field is ever durable
/// without the other; see [`LogStore::persist_hard_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardState {
    pub term: Term,
    pub voted_for: Option<NodeId>,
}

/// Contract shared by both log backends.
///
/// Indices are strictly increasing and contiguous: the first record has
/// index 1 and `append` only accepts `entry_count() + 1`. Violations of the
/// host/engine contract (empty-log pop, compaction, gapped append) panic
/// rather than degrade.
pub trait LogStore {
    /// Add a record at the next index.
    ///
    /// # Panics
    ///
    /// Panics if `record.index` is not exactly `entry_count() + 1` or if
    /// the payload exceeds [`MAX_PAYLOAD`].
    fn append(&mut self, record: &LogRecord) -> Result<()>;

    /// Remove the most recent record, releasing its payload buffer exactly
    /// once.
    ///
    /// # Panics
    ///
    /// Panics if the log is empty: the engine only pops entries it
    /// previously offered, so an empty pop means the log has diverged from
    /// the engine's bookkeeping.
    fn remove_last(&mut self);

    /// Remove the first record (compaction).
    ///
    /// # Panics
    ///
    /// Always. There is no snapshot mechanism to bound log growth, so
    /// compaction is unsupported by design.
    fn remove_first(&mut self) {
        panic!("log compaction is unsupported: no snapshot mechanism bounds log growth");
    }

    /// Current log length, O(1).
    fn entry_count(&self) -> u64;

    /// Read back the record at `index` (1-based), if present.
    fn record(&self, index: LogIndex) -> Option<LogRecord>;

    /// Durably record the voted-for node. No-op for the volatile backend.
    fn persist_vote(&mut self, voted_for: Option<NodeId>) -> Result<()>;

    /// Durably record term and voted-for as one unit. No-op for the
    /// volatile backend.
    fn persist_hard_state(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<()>;

    /// The persisted hard state. The volatile backend always reports the
    /// default (it durably stores nothing).
    fn hard_state(&self) -> HardState;
}

pub(crate) fn check_append(next_index: LogIndex, record: &LogRecord) {
    assert_eq!(
        record.index, next_index,
        "log append out of order: offered index {} but next index is {}",
        record.index, next_index
    );
    assert!(
        record.payload.len() <= MAX_PAYLOAD,
        "log record payload of {} bytes exceeds the {} byte record slot",
        record.payload.len(),
        MAX_PAYLOAD
    );
}
