//! Replica configuration.
//!
//! One `ReplicaConfig` is built at startup and passed by reference to the
//! components it constructs; there is no process-global state. The storage
//! mode picks the log backend once; persistent and volatile backends are
//! never mixed at runtime.

use std::path::PathBuf;
use std::time::Duration;

use crate::fsm::ClientRequest;
use crate::log::{LogStore, PersistentLog, VolatileLog};
use crate::pool::EntryPool;
use crate::raft::NodeId;
use crate::session::derive_node_id;
use crate::Result;

/// Default record capacity of a persistent region (~1M entries, the
/// key-count the fixed-schema table is provisioned for).
pub const DEFAULT_REGION_RECORDS: u64 = 1 << 20;

/// Default pool growth increment for the volatile backend.
pub const DEFAULT_POOL_CHUNK_SLOTS: usize = 1024;

/// Which log backend this replica runs on.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Memory-mapped persistent region at `path`, sized for
    /// `capacity_records` log entries. Gives crash durability without a
    /// conventional write-ahead-log file format.
    Persistent {
        path: PathBuf,
        capacity_records: u64,
    },
    /// DRAM log with pooled application-entry payloads, for environments
    /// without persistent memory. No durability.
    Volatile { pool_chunk_slots: usize },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Volatile {
            pool_chunk_slots: DEFAULT_POOL_CHUNK_SLOTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// host:port the peer's transport listens on.
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// host:port this replica's transport listens on; also the input to
    /// node-id derivation.
    pub listen_uri: String,
    pub peers: Vec<PeerConfig>,
    pub storage: StorageConfig,
    /// Granularity of the periodic driver's engine ticks.
    pub tick_interval: Duration,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            listen_uri: "127.0.0.1:31850".to_string(),
            peers: Vec::new(),
            storage: StorageConfig::default(),
            tick_interval: Duration::from_millis(1),
        }
    }
}

impl ReplicaConfig {
    pub fn new(listen_uri: impl Into<String>) -> Self {
        Self {
            listen_uri: listen_uri.into(),
            ..Default::default()
        }
    }

    pub fn with_peer(mut self, uri: impl Into<String>) -> Self {
        self.peers.push(PeerConfig { uri: uri.into() });
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// This replica's node id, derived from its network identity.
    pub fn node_id(&self) -> NodeId {
        derive_node_id(&self.listen_uri)
    }

    /// Construct the configured log backend. Called once at startup.
    pub fn open_log(&self) -> Result<Box<dyn LogStore>> {
        match &self.storage {
            StorageConfig::Persistent {
                path,
                capacity_records,
            } => {
                let log = PersistentLog::open_or_create(path, *capacity_records)?;
                Ok(Box::new(log))
            }
            StorageConfig::Volatile { pool_chunk_slots } => {
                let pool = EntryPool::new(ClientRequest::WIRE_SIZE, *pool_chunk_slots);
                Ok(Box::new(VolatileLog::new(pool)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = ReplicaConfig::default();
        assert_eq!(cfg.listen_uri, "127.0.0.1:31850");
        assert!(cfg.peers.is_empty());
        assert!(matches!(cfg.storage, StorageConfig::Volatile { .. }));
        assert_eq!(cfg.tick_interval, Duration::from_millis(1));
    }

    #[test]
    fn with_peer_accumulates() {
        let cfg = ReplicaConfig::new("10.0.0.1:31850")
            .with_peer("10.0.0.2:31850")
            .with_peer("10.0.0.3:31850");
        assert_eq!(cfg.peers.len(), 2);
        assert_eq!(cfg.peers[0].uri, "10.0.0.2:31850");
    }

    #[test]
    fn node_id_follows_listen_uri() {
        let a = ReplicaConfig::new("10.0.0.1:31850");
        let b = ReplicaConfig::new("10.0.0.2:31850");
        assert_eq!(a.node_id(), ReplicaConfig::new("10.0.0.1:31850").node_id());
        assert_ne!(a.node_id(), b.node_id());
    }

    #[test]
    fn open_log_volatile_starts_empty() {
        let cfg = ReplicaConfig::default();
        let log = cfg.open_log().unwrap();
        assert_eq!(log.entry_count(), 0);
    }
}
