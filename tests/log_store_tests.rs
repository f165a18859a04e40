//! Integration tests for the dual-mode log backend.
//!
//! Verifies that:
//! - both backends preserve the prefix invariant under append/pop sequences
//! - persistent and volatile backends are externally indistinguishable
//! - pooled payloads are freed exactly once, with no leak across cycles

use smr_lite::fsm::ClientRequest;
use smr_lite::log::{EntryKind, LogRecord, LogStore, PersistentLog, VolatileLog};
use smr_lite::pool::EntryPool;
use tempfile::tempdir;

fn volatile_log() -> VolatileLog {
    VolatileLog::new(EntryPool::new(ClientRequest::WIRE_SIZE, 16))
}

fn request_record(term: u64, index: u64, fill: u8) -> LogRecord {
    let req = ClientRequest::new([fill; 16], [fill.wrapping_add(1); 64]);
    LogRecord::new(term, index, EntryKind::Normal, req.to_bytes().to_vec())
}

/// One step of a backend-agnostic operation sequence.
enum Op {
    Append { term: u64, fill: u8 },
    Pop,
}

fn drive(log: &mut dyn LogStore, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Append { term, fill } => {
                let index = log.entry_count() + 1;
                log.append(&request_record(*term, index, *fill)).unwrap();
            }
            Op::Pop => log.remove_last(),
        }
    }
}

fn snapshot(log: &dyn LogStore) -> Vec<LogRecord> {
    (1..=log.entry_count())
        .map(|i| log.record(i).expect("record within entry_count"))
        .collect()
}

#[test]
fn log_is_a_gapless_prefix_after_any_append_pop_sequence() {
    let ops = [
        Op::Append { term: 1, fill: 1 },
        Op::Append { term: 1, fill: 2 },
        Op::Append { term: 2, fill: 3 },
        Op::Pop,
        Op::Append { term: 3, fill: 4 },
        Op::Append { term: 3, fill: 5 },
        Op::Pop,
        Op::Pop,
        Op::Append { term: 4, fill: 6 },
    ];

    let mut log = volatile_log();
    drive(&mut log, &ops);

    let records = snapshot(&log);
    assert_eq!(records.len() as u64, log.entry_count());
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.index, i as u64 + 1, "indices must be contiguous");
    }
    // Terms never decrease along the log.
    for pair in records.windows(2) {
        assert!(pair[0].term <= pair[1].term);
    }
}

#[test]
fn persistent_and_volatile_backends_are_equivalent() {
    let ops = [
        Op::Append { term: 1, fill: 10 },
        Op::Append { term: 1, fill: 11 },
        Op::Pop,
        Op::Append { term: 2, fill: 12 },
        Op::Append { term: 2, fill: 13 },
        Op::Append { term: 2, fill: 14 },
        Op::Pop,
    ];

    let dir = tempdir().unwrap();
    let mut pmem = PersistentLog::create(dir.path().join("raft.log"), 64).unwrap();
    let mut dram = volatile_log();

    drive(&mut pmem, &ops);
    drive(&mut dram, &ops);

    assert_eq!(pmem.entry_count(), dram.entry_count());
    assert_eq!(snapshot(&pmem), snapshot(&dram));
}

#[test]
fn opaque_entries_round_trip_on_both_backends() {
    let record = LogRecord::new(5, 1, EntryKind::ConfigChange, vec![0xEE; 24]);

    let dir = tempdir().unwrap();
    let mut pmem = PersistentLog::create(dir.path().join("raft.log"), 4).unwrap();
    let mut dram = volatile_log();

    pmem.append(&record).unwrap();
    dram.append(&record).unwrap();

    assert_eq!(pmem.record(1).unwrap(), record);
    assert_eq!(dram.record(1).unwrap(), record);
}

#[test]
fn pooled_payloads_are_freed_exactly_once_across_cycles() {
    let mut log = volatile_log();

    for round in 0..200u64 {
        log.append(&request_record(1, 1, round as u8)).unwrap();
        log.append(&request_record(1, 2, round as u8)).unwrap();
        assert_eq!(log.pooled_payloads(), 2);
        log.remove_last();
        log.remove_last();
        assert_eq!(log.pooled_payloads(), 0);
    }
    assert_eq!(log.entry_count(), 0);
}

#[test]
fn persistent_region_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raft.log");

    {
        let mut log = PersistentLog::create(&path, 32).unwrap();
        drive(
            &mut log,
            &[
                Op::Append { term: 1, fill: 1 },
                Op::Append { term: 2, fill: 2 },
                Op::Append { term: 2, fill: 3 },
                Op::Pop,
            ],
        );
        log.persist_hard_state(2, Some(1234)).unwrap();
    }

    let log = PersistentLog::open(&path).unwrap();
    assert_eq!(log.entry_count(), 2);
    assert_eq!(log.hard_state().term, 2);
    assert_eq!(log.hard_state().voted_for, Some(1234));
    assert_eq!(log.record(2).unwrap(), request_record(2, 2, 2));
}

#[test]
#[should_panic(expected = "pop on an empty log")]
fn empty_pop_is_fatal_on_the_volatile_backend() {
    let mut log = volatile_log();
    log.remove_last();
}

#[test]
#[should_panic(expected = "pop on an empty log")]
fn empty_pop_is_fatal_on_the_persistent_backend() {
    let dir = tempdir().unwrap();
    let mut log = PersistentLog::create(dir.path().join("raft.log"), 4).unwrap();
    log.remove_last();
}

#[test]
#[should_panic(expected = "log compaction is unsupported")]
fn compaction_is_fatal_on_the_persistent_backend() {
    let dir = tempdir().unwrap();
    let mut log = PersistentLog::create(dir.path().join("raft.log"), 4).unwrap();
    log.append(&request_record(1, 1, 0)).unwrap();
    log.remove_first();
}
