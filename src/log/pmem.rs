//! Persistent-memory log backend.
//!
//! A single memory-mapped file, exclusively owned by the local node, holds
//! the replica's durable state at fixed offsets: a header with magic,
//! version, hard state (term + voted-for) and the persisted entry count,
//! followed by fixed-stride record slots. Durability is explicit
//! flush-on-write, never lazy, and the entry-count field is only updated
//! after the record it covers is durable. A crash can lose the entry
//! being written but never expose a count pointing at garbage.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::log::{check_append, EntryKind, HardState, LogRecord, LogStore, MAX_PAYLOAD};
use crate::raft::{LogIndex, NodeId, Term};
use crate::{Result, SmrError};

const MAGIC: u64 = 0x534D_524C_4F47_3031; // "SMRLOG01"
const VERSION: u32 = 1;

const MAGIC_OFF: usize = 0;
const VERSION_OFF: usize = 8;
// Term and voted-for share one 16-byte record flushed as a unit, so
// neither field is ever durable without the other.
const HARD_STATE_OFF: usize = 16;
const HARD_STATE_LEN: usize = 16;
const TERM_OFF: usize = 16;
const VOTED_FOR_OFF: usize = 24;
const COUNT_OFF: usize = 32;
const RECORDS_OFF: usize = 64;

const RECORD_HEADER: usize = 16;
const RECORD_STRIDE: usize = RECORD_HEADER + MAX_PAYLOAD;

const NO_VOTE: u32 = u32::MAX;

const KIND_NORMAL: u8 = 0;
const KIND_CONFIG: u8 = 1;

/// Log backend over a memory-mapped persistent region.
#[derive(Debug)]
pub struct PersistentLog {
    mmap: MmapMut,
    path: PathBuf,
    capacity_records: u64,
    // Volatile copy of the persisted count; serves entry_count() in O(1).
    num_entries: u64,
}

impl PersistentLog {
    /// Create a fresh region sized for `capacity_records` entries,
    /// truncating any existing file at `path`.
    pub fn create(path: impl AsRef<Path>, capacity_records: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| storage_err(&path, e))?;

        let len = RECORDS_OFF as u64 + capacity_records * RECORD_STRIDE as u64;
        file.set_len(len).map_err(|e| storage_err(&path, e))?;

        let mut mmap = unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(&file)
                .map_err(|e| storage_err(&path, e))?
        };

        mmap[MAGIC_OFF..MAGIC_OFF + 8].copy_from_slice(&MAGIC.to_le_bytes());
        mmap[VERSION_OFF..VERSION_OFF + 4].copy_from_slice(&VERSION.to_le_bytes());
        mmap[TERM_OFF..TERM_OFF + 8].copy_from_slice(&0u64.to_le_bytes());
        mmap[VOTED_FOR_OFF..VOTED_FOR_OFF + 4].copy_from_slice(&NO_VOTE.to_le_bytes());
        mmap[COUNT_OFF..COUNT_OFF + 8].copy_from_slice(&0u64.to_le_bytes());
        mmap.flush_range(0, RECORDS_OFF)
            .map_err(|e| storage_err(&path, e))?;

        Ok(Self {
            mmap,
            path,
            capacity_records,
            num_entries: 0,
        })
    }

    /// Map an existing region and recover its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| storage_err(&path, e))?;

        let len = file
            .metadata()
            .map_err(|e| storage_err(&path, e))?
            .len();
        if (len as usize) < RECORDS_OFF {
            return Err(SmrError::Corrupt("region smaller than its header"));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(&file)
                .map_err(|e| storage_err(&path, e))?
        };

        if read_u64(&mmap, MAGIC_OFF) != MAGIC {
            return Err(SmrError::Corrupt("bad magic"));
        }
        if read_u32(&mmap, VERSION_OFF) != VERSION {
            return Err(SmrError::Corrupt("unsupported region version"));
        }

        let capacity_records = (len as usize - RECORDS_OFF) as u64 / RECORD_STRIDE as u64;
        let num_entries = read_u64(&mmap, COUNT_OFF);
        if num_entries > capacity_records {
            return Err(SmrError::Corrupt("entry count exceeds region capacity"));
        }

        Ok(Self {
            mmap,
            path,
            capacity_records,
            num_entries,
        })
    }

    /// Open `path` if it already holds a region, otherwise create one.
    pub fn open_or_create(path: impl AsRef<Path>, capacity_records: u64) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path, capacity_records)
        }
    }

    pub fn capacity_records(&self) -> u64 {
        self.capacity_records
    }

    fn slot_offset(&self, index: LogIndex) -> usize {
        RECORDS_OFF + (index - 1) as usize * RECORD_STRIDE
    }

    fn flush(&self, offset: usize, len: usize) -> Result<()> {
        self.mmap
            .flush_range(offset, len)
            .map_err(|e| storage_err(&self.path, e))
    }

    fn write_count(&mut self, count: u64) -> Result<()> {
        self.mmap[COUNT_OFF..COUNT_OFF + 8].copy_from_slice(&count.to_le_bytes());
        self.flush(COUNT_OFF, 8)?;
        self.num_entries = count;
        Ok(())
    }
}

impl LogStore for PersistentLog {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        check_append(self.num_entries + 1, record);
        if self.num_entries == self.capacity_records {
            return Err(SmrError::RegionFull);
        }

        let off = self.slot_offset(record.index);
        let kind = match record.kind {
            EntryKind::Normal => KIND_NORMAL,
            EntryKind::ConfigChange => KIND_CONFIG,
        };
        self.mmap[off..off + 8].copy_from_slice(&record.term.to_le_bytes());
        self.mmap[off + 8..off + 12]
            .copy_from_slice(&(record.payload.len() as u32).to_le_bytes());
        self.mmap[off + 12] = kind;
        self.mmap[off + RECORD_HEADER..off + RECORD_HEADER + record.payload.len()]
            .copy_from_slice(&record.payload);

        // The record must be durable before the count covers it.
        self.flush(off, RECORD_HEADER + record.payload.len())?;
        self.write_count(self.num_entries + 1)
    }

    fn remove_last(&mut self) {
        assert!(
            self.num_entries > 0,
            "pop on an empty log: host and engine logs have diverged"
        );
        // The superseded record's bytes stay in place; shrinking the
        // persisted count is what removes it.
        let count = self.num_entries - 1;
        if let Err(e) = self.write_count(count) {
            panic!("failed to persist log truncation: {e}");
        }
    }

    fn entry_count(&self) -> u64 {
        self.num_entries
    }

    fn record(&self, index: LogIndex) -> Option<LogRecord> {
        if index == 0 || index > self.num_entries {
            return None;
        }
        let off = self.slot_offset(index);
        let term = read_u64(&self.mmap, off);
        let len = read_u32(&self.mmap, off + 8) as usize;
        // Only the two known kind bytes are ever written; anything else
        // means the region bytes are no longer what this process wrote.
        let kind = match self.mmap[off + 12] {
            KIND_NORMAL => EntryKind::Normal,
            KIND_CONFIG => EntryKind::ConfigChange,
            other => panic!("log region is corrupt: unknown record kind {other} at index {index}"),
        };
        let payload = self.mmap[off + RECORD_HEADER..off + RECORD_HEADER + len].to_vec();
        Some(LogRecord::new(term, index, kind, payload))
    }

    fn persist_vote(&mut self, voted_for: Option<NodeId>) -> Result<()> {
        let encoded = voted_for.unwrap_or(NO_VOTE);
        self.mmap[VOTED_FOR_OFF..VOTED_FOR_OFF + 4].copy_from_slice(&encoded.to_le_bytes());
        self.flush(HARD_STATE_OFF, HARD_STATE_LEN)
    }

    fn persist_hard_state(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<()> {
        let encoded = voted_for.unwrap_or(NO_VOTE);
        self.mmap[TERM_OFF..TERM_OFF + 8].copy_from_slice(&term.to_le_bytes());
        self.mmap[VOTED_FOR_OFF..VOTED_FOR_OFF + 4].copy_from_slice(&encoded.to_le_bytes());
        // One flush over the combined record: term and vote become durable
        // together or not at all.
        self.flush(HARD_STATE_OFF, HARD_STATE_LEN)
    }

    fn hard_state(&self) -> HardState {
        let voted = read_u32(&self.mmap, VOTED_FOR_OFF);
        HardState {
            term: read_u64(&self.mmap, TERM_OFF),
            voted_for: (voted != NO_VOTE).then_some(voted),
        }
    }
}

fn storage_err(path: &Path, source: std::io::Error) -> SmrError {
    SmrError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::ClientRequest;
    use tempfile::tempdir;

    fn app_record(term: Term, index: LogIndex, fill: u8) -> LogRecord {
        LogRecord::new(
            term,
            index,
            EntryKind::Normal,
            vec![fill; ClientRequest::WIRE_SIZE],
        )
    }

    #[test]
    fn create_append_read_back() {
        let dir = tempdir().unwrap();
        let mut log = PersistentLog::create(dir.path().join("raft.log"), 16).unwrap();

        log.append(&app_record(1, 1, 0x11)).unwrap();
        log.append(&app_record(1, 2, 0x22)).unwrap();

        assert_eq!(log.entry_count(), 2);
        let rec = log.record(1).unwrap();
        assert_eq!(rec.term, 1);
        assert_eq!(rec.payload, vec![0x11; ClientRequest::WIRE_SIZE]);
        assert!(log.record(3).is_none());
    }

    #[test]
    fn reopen_recovers_entries_and_hard_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log");

        {
            let mut log = PersistentLog::create(&path, 8).unwrap();
            log.append(&app_record(3, 1, 0xAB)).unwrap();
            log.append(&app_record(3, 2, 0xCD)).unwrap();
            log.persist_hard_state(3, Some(42)).unwrap();
        }

        let log = PersistentLog::open(&path).unwrap();
        assert_eq!(log.entry_count(), 2);
        assert_eq!(log.capacity_records(), 8);
        assert_eq!(
            log.hard_state(),
            HardState {
                term: 3,
                voted_for: Some(42)
            }
        );
        assert_eq!(
            log.record(2).unwrap().payload,
            vec![0xCD; ClientRequest::WIRE_SIZE]
        );
    }

    #[test]
    fn truncation_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log");

        {
            let mut log = PersistentLog::create(&path, 8).unwrap();
            log.append(&app_record(1, 1, 1)).unwrap();
            log.append(&app_record(2, 2, 2)).unwrap();
            log.remove_last();
        }

        let log = PersistentLog::open(&path).unwrap();
        assert_eq!(log.entry_count(), 1);
        assert!(log.record(2).is_none());
    }

    #[test]
    fn vote_persists_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log");

        {
            let mut log = PersistentLog::create(&path, 4).unwrap();
            log.persist_vote(Some(7)).unwrap();
        }

        let log = PersistentLog::open(&path).unwrap();
        assert_eq!(log.hard_state().voted_for, Some(7));
        assert_eq!(log.hard_state().term, 0);
    }

    #[test]
    fn full_region_reports_region_full() {
        let dir = tempdir().unwrap();
        let mut log = PersistentLog::create(dir.path().join("raft.log"), 1).unwrap();

        log.append(&app_record(1, 1, 0)).unwrap();
        match log.append(&app_record(1, 2, 0)) {
            Err(SmrError::RegionFull) => {}
            other => panic!("expected RegionFull, got {other:?}"),
        }
    }

    #[test]
    fn open_rejects_foreign_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-log");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        match PersistentLog::open(&path) {
            Err(SmrError::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "unknown record kind")]
    fn corrupt_kind_byte_is_fatal_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log");
        {
            let mut log = PersistentLog::create(&path, 4).unwrap();
            log.append(&app_record(1, 1, 0)).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[RECORDS_OFF + 12] = 0x7F;
        std::fs::write(&path, &bytes).unwrap();

        let log = PersistentLog::open(&path).unwrap();
        let _ = log.record(1);
    }

    #[test]
    #[should_panic(expected = "pop on an empty log")]
    fn empty_pop_is_fatal() {
        let dir = tempdir().unwrap();
        let mut log = PersistentLog::create(dir.path().join("raft.log"), 4).unwrap();
        log.remove_last();
    }
}
