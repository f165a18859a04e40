use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transport::ReqType;

/// Recoverable and setup-time errors.
///
/// Unsupported operations (log compaction, snapshot transfer, membership
/// changes) and replication-invariant violations are deliberately *not*
/// represented here: they terminate the process with a panic, because a log
/// that has diverged from the engine's bookkeeping must not keep running.
#[derive(Error, Debug)]
pub enum SmrError {
    #[error("a client request is already awaiting commit")]
    PendingCommit,

    #[error("client request payload has invalid length {0}")]
    InvalidRequest(usize),

    #[error("transport enqueue backpressure for {0:?}")]
    Backpressure(ReqType),

    #[error("consensus engine rejected the entry: {0}")]
    EngineRejected(&'static str),

    #[error("log region {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("log region is full")]
    RegionFull,

    #[error("log region is corrupt: {0}")]
    Corrupt(&'static str),
}

pub type Result<T> = std::result::Result<T, SmrError>;
