//! Client protocol types and the fixed-schema key-value table boundary.
//!
//! The replicated state machine is a fixed-schema table of 16-byte keys and
//! 64-byte values. A committed application entry carries exactly one
//! serialized [`ClientRequest`]; applying it means
//! `set(key_hash(key), key, value)` on the table, in commit order, exactly
//! once per index, on every replica.

use std::collections::HashMap;
use std::fmt;

use crate::raft::NodeId;

pub const KEY_SIZE: usize = 16;
pub const VALUE_SIZE: usize = 64;

/// A client PUT request: the one command kind this state machine replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRequest {
    pub key: [u8; KEY_SIZE],
    pub value: [u8; VALUE_SIZE],
}

impl ClientRequest {
    /// Serialized size on the wire and in the log: key bytes then value
    /// bytes, nothing else.
    pub const WIRE_SIZE: usize = KEY_SIZE + VALUE_SIZE;

    pub fn new(key: [u8; KEY_SIZE], value: [u8; VALUE_SIZE]) -> Self {
        Self { key, value }
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[..KEY_SIZE].copy_from_slice(&self.key);
        buf[KEY_SIZE..].copy_from_slice(&self.value);
        buf
    }

    /// Decode a request from raw bytes. Returns `None` unless the slice is
    /// exactly [`Self::WIRE_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::WIRE_SIZE {
            return None;
        }
        let mut key = [0u8; KEY_SIZE];
        let mut value = [0u8; VALUE_SIZE];
        key.copy_from_slice(&bytes[..KEY_SIZE]);
        value.copy_from_slice(&bytes[KEY_SIZE..]);
        Some(Self { key, value })
    }
}

/// The three-way client-facing outcome, the entire observable protocol
/// surface of the replication core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientResponse {
    /// The write was committed and applied.
    Success,
    /// This node is not the leader; retry against the carried node id
    /// ([`crate::raft::UNKNOWN_LEADER`] when no leader is known).
    Redirect(NodeId),
    /// The leader already has a write in flight; retry later.
    TryAgain,
}

impl ClientResponse {
    pub const WIRE_SIZE: usize = 5;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        match self {
            ClientResponse::Success => buf[0] = 0,
            ClientResponse::Redirect(leader) => {
                buf[0] = 1;
                buf[1..].copy_from_slice(&leader.to_le_bytes());
            }
            ClientResponse::TryAgain => buf[0] = 2,
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::WIRE_SIZE {
            return None;
        }
        match bytes[0] {
            0 => Some(ClientResponse::Success),
            1 => {
                let mut id = [0u8; 4];
                id.copy_from_slice(&bytes[1..]);
                Some(ClientResponse::Redirect(NodeId::from_le_bytes(id)))
            }
            2 => Some(ClientResponse::TryAgain),
            _ => None,
        }
    }
}

impl fmt::Display for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientResponse::Success => write!(f, "success"),
            ClientResponse::Redirect(leader) => {
                write!(f, "failed: redirect to node {leader}")
            }
            ClientResponse::TryAgain => write!(f, "failed: try again"),
        }
    }
}

/// Fixed-width hash over the raw key bytes, deterministic across replicas.
pub fn key_hash(key: &[u8; KEY_SIZE]) -> u64 {
    crc32fast::hash(key) as u64
}

/// Result of a table mutation. The table must never reject a committed
/// write; a `Failure` on the apply path is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableResult {
    Success,
    Failure,
}

/// The key-value table consumed by the apply engine. The table's internal
/// hashing and storage engine are outside this crate; the apply path only
/// needs `set`.
pub trait Table {
    fn set(&mut self, key_hash: u64, key: &[u8; KEY_SIZE], value: &[u8; VALUE_SIZE])
        -> TableResult;
}

/// In-memory fixed-schema table, sufficient for volatile deployments and
/// for verifying replica convergence in tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemTable {
    slots: HashMap<[u8; KEY_SIZE], [u8; VALUE_SIZE]>,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8; KEY_SIZE]) -> Option<&[u8; VALUE_SIZE]> {
        self.slots.get(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Table for MemTable {
    fn set(
        &mut self,
        _key_hash: u64,
        key: &[u8; KEY_SIZE],
        value: &[u8; VALUE_SIZE],
    ) -> TableResult {
        self.slots.insert(*key, *value);
        TableResult::Success
    }
}
