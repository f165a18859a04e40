//! DRAM log backend.
//!
//! Records live in an ordered vector. Application-entry payloads of exactly
//! the client-request size are copied into pool slots and the record keeps
//! the handle; every other payload gets an ad-hoc heap buffer. Removal
//! frees whichever owner the record has, exactly once.

use crate::log::{check_append, EntryKind, HardState, LogRecord, LogStore};
use crate::pool::{EntryPool, PoolHandle};
use crate::raft::{LogIndex, NodeId, Term};
use crate::Result;

enum VolatilePayload {
    Pooled(PoolHandle),
    Heap(Vec<u8>),
    Empty,
}

struct VolatileRecord {
    term: Term,
    index: LogIndex,
    kind: EntryKind,
    payload: VolatilePayload,
}

/// In-memory log with pooled application-entry payloads. Trades durability
/// for pure in-memory performance; externally identical to the persistent
/// backend.
pub struct VolatileLog {
    records: Vec<VolatileRecord>,
    pool: EntryPool,
}

impl VolatileLog {
    /// `pool` must be sized for one application-entry payload per slot.
    pub fn new(pool: EntryPool) -> Self {
        Self {
            records: Vec::new(),
            pool,
        }
    }

    /// Pool slots currently owned by log records. Every pooled payload is
    /// freed exactly when its record is removed, so this always equals the
    /// number of pool-backed records.
    pub fn pooled_payloads(&self) -> usize {
        self.pool.allocated()
    }
}

impl LogStore for VolatileLog {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        check_append(self.entry_count() + 1, record);

        let payload = if record.payload.is_empty() {
            VolatilePayload::Empty
        } else if record.kind == EntryKind::Normal
            && record.payload.len() == self.pool.slot_size()
        {
            let handle = self.pool.alloc();
            self.pool.slot_mut(handle).copy_from_slice(&record.payload);
            VolatilePayload::Pooled(handle)
        } else {
            VolatilePayload::Heap(record.payload.clone())
        };

        self.records.push(VolatileRecord {
            term: record.term,
            index: record.index,
            kind: record.kind,
            payload,
        });
        Ok(())
    }

    fn remove_last(&mut self) {
        let record = self
            .records
            .pop()
            .unwrap_or_else(|| panic!("pop on an empty log: host and engine logs have diverged"));
        match record.payload {
            VolatilePayload::Pooled(handle) => self.pool.free(handle),
            VolatilePayload::Heap(_) | VolatilePayload::Empty => {}
        }
    }

    fn entry_count(&self) -> u64 {
        self.records.len() as u64
    }

    fn record(&self, index: LogIndex) -> Option<LogRecord> {
        if index == 0 {
            return None;
        }
        let record = self.records.get((index - 1) as usize)?;
        let payload = match &record.payload {
            VolatilePayload::Pooled(handle) => self.pool.slot(*handle).to_vec(),
            VolatilePayload::Heap(bytes) => bytes.clone(),
            VolatilePayload::Empty => Vec::new(),
        };
        Some(LogRecord::new(record.term, record.index, record.kind, payload))
    }

    fn persist_vote(&mut self, _voted_for: Option<NodeId>) -> Result<()> {
        // Volatile mode upholds no crash-recovery guarantee.
        Ok(())
    }

    fn persist_hard_state(&mut self, _term: Term, _voted_for: Option<NodeId>) -> Result<()> {
        Ok(())
    }

    fn hard_state(&self) -> HardState {
        HardState::default()
    }
}
