//! Replication core for a Raft-backed key-value SMR service.
//!
//! This crate is the host side of the consensus boundary: it supplies the
//! log storage and callback set a Raft engine needs (log offer/pop/poll,
//! hard-state persistence, entry application), a dual-mode log backend
//! (memory-mapped region or DRAM with pooled payloads), the leader's
//! single-flight commit tracker, and the session directory mapping
//! transport sessions to replica identities. The consensus engine itself
//! and the RPC transport are external collaborators consumed through the
//! traits in [`raft`] and [`transport`].

pub mod config;
pub mod error;
pub mod fsm;
pub mod log;
pub mod node;
pub mod pool;
pub mod raft;
pub mod session;
pub mod transport;

pub use error::{Result, SmrError};
