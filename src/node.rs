//! The replica context: one value owning every component of the
//! replication core, constructed once at startup.
//!
//! A single worker thread owns the `Replica` and drives it from an
//! external event loop: transport messages dispatch into
//! [`Replica::handle_client_request`] and [`Replica::handle_session_event`],
//! and every loop iteration calls [`Replica::tick`] and
//! [`Replica::poll_commit`] regardless of message arrival. Nothing here
//! blocks or yields; every call runs to completion synchronously, so no
//! locking is needed.

use std::time::Duration;

use crate::config::ReplicaConfig;
use crate::fsm::{ClientRequest, ClientResponse, Table};
use crate::raft::{
    CommitTracker, ConsensusEngine, HostBridge, NodeId, PeriodicDriver, UNKNOWN_LEADER,
};
use crate::session::SessionDirectory;
use crate::transport::{ReqType, SessionEvent, Transport};
use crate::{Result, SmrError};

/// Commit-latency accumulator (microseconds).
#[derive(Debug, Default, Clone, Copy)]
pub struct LatencyStat {
    count: u64,
    total_us: u64,
    max_us: u64,
}

impl LatencyStat {
    pub fn record(&mut self, sample: Duration) {
        let us = sample.as_micros() as u64;
        self.count += 1;
        self.total_us += us;
        self.max_us = self.max_us.max(us);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean_us(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_us / self.count
        }
    }

    pub fn max_us(&self) -> u64 {
        self.max_us
    }
}

/// Counters for the recoverable fault class: transient transport
/// backpressure on replication RPCs. The engine's own retry logic covers
/// the lost sends.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplicaStats {
    pub commit_latency: LatencyStat,
    pub requestvote_enq_fail: u64,
    pub appendentries_enq_fail: u64,
}

/// Everything one replica process owns: the consensus engine, the host
/// bridge (log backend + table), the single-flight commit tracker, the
/// session directory, the periodic driver, and the transport handle.
pub struct Replica<E, T, X, R>
where
    E: ConsensusEngine,
    T: Table,
    X: Transport,
{
    config: ReplicaConfig,
    node_id: NodeId,
    engine: E,
    bridge: HostBridge<T>,
    tracker: CommitTracker<R>,
    directory: SessionDirectory,
    driver: PeriodicDriver,
    transport: X,
    stats: ReplicaStats,
}

impl<E, T, X, R> Replica<E, T, X, R>
where
    E: ConsensusEngine,
    T: Table,
    X: Transport,
{
    /// Build a replica from its configuration, opening the configured log
    /// backend.
    pub fn new(config: ReplicaConfig, engine: E, table: T, transport: X) -> Result<Self> {
        let log = config.open_log()?;
        let node_id = config.node_id();
        tracing::info!(node_id, listen_uri = %config.listen_uri, "replica starting");
        Ok(Self {
            node_id,
            driver: PeriodicDriver::new(config.tick_interval),
            config,
            engine,
            bridge: HostBridge::new(log, table),
            tracker: CommitTracker::new(),
            directory: SessionDirectory::new(),
            transport,
            stats: ReplicaStats::default(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn bridge(&self) -> &HostBridge<T> {
        &self.bridge
    }

    pub fn stats(&self) -> &ReplicaStats {
        &self.stats
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn is_write_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    /// Handle one client write.
    ///
    /// Returns the reply token with its immediate response when the request
    /// cannot be accepted (malformed, redirect or try-again), or `None` when
    /// the write was submitted to the engine and is now the pending
    /// single-flight request; the token then comes back from
    /// [`Replica::poll_commit`]. Every branch hands the token back, so the
    /// caller can always answer the client even when the token is a non-Copy
    /// transport reply handle.
    pub fn handle_client_request(
        &mut self,
        token: R,
        payload: &[u8],
    ) -> Option<(R, ClientResponse)> {
        // Client payloads come off the wire; a bad one is the client's
        // fault, never grounds to take the replica down.
        let request = match ClientRequest::from_bytes(payload) {
            Some(request) => request,
            None => {
                let error = SmrError::InvalidRequest(payload.len());
                tracing::warn!(%error, "rejecting malformed client request");
                return Some((token, ClientResponse::TryAgain));
            }
        };

        if !self.engine.is_leader() {
            let leader = self.engine.leader_id().unwrap_or(UNKNOWN_LEADER);
            tracing::debug!(leader, "client request at a non-leader, redirecting");
            return Some((token, ClientResponse::Redirect(leader)));
        }

        if self.tracker.is_pending() {
            tracing::debug!("client request while a commit is in flight");
            return Some((token, ClientResponse::TryAgain));
        }

        match self.engine.submit(&mut self.bridge, request.to_bytes().to_vec()) {
            Ok(ticket) => {
                // The busy check above makes this infallible.
                self.tracker
                    .begin(ticket, token)
                    .unwrap_or_else(|e| panic!("tracker slot taken after busy check: {e}"));
                tracing::debug!(
                    index = ticket.index,
                    term = ticket.term,
                    "client write submitted for replication"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "engine rejected a client write");
                Some((token, ClientResponse::TryAgain))
            }
        }
    }

    /// Resolve the pending client write, if its fate is known.
    ///
    /// Returns the reply token with `Success` once the engine reports the
    /// submitted entry committed, or with a redirect if this node lost
    /// leadership in the meantime. `None` while the outcome is still open
    /// (or nothing is pending).
    pub fn poll_commit(&mut self) -> Option<(R, ClientResponse)> {
        let ticket = self.tracker.pending_ticket()?;

        if !self.engine.is_leader() {
            let token = self.tracker.abandon()?;
            let leader = self.engine.leader_id().unwrap_or(UNKNOWN_LEADER);
            tracing::info!(leader, "leadership lost with a write pending, redirecting");
            return Some((token, ClientResponse::Redirect(leader)));
        }

        if self.engine.is_committed(ticket) {
            let (token, latency) = self.tracker.complete();
            self.stats.commit_latency.record(latency);
            tracing::debug!(
                index = ticket.index,
                latency_us = latency.as_micros() as u64,
                "client write committed"
            );
            return Some((token, ClientResponse::Success));
        }

        None
    }

    /// Advance the engine's timer. Called on every event-loop iteration.
    pub fn tick(&mut self) {
        let elapsed_ms = self.driver.elapsed_ms();
        self.engine.periodic(&mut self.bridge, elapsed_ms);
    }

    /// Apply a transport session lifecycle event to the directory.
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { session_id } => {
                self.directory.register(session_id);
            }
            SessionEvent::Disconnected { session_id } => {
                self.directory.mark_disconnected(session_id);
            }
        }
    }

    /// Send a replication RPC to the peer at `peer_index`.
    ///
    /// Enqueue failures are transient backpressure: counted and returned,
    /// never fatal. The engine retries on its own schedule.
    ///
    /// # Panics
    ///
    /// Panics if `peer_index` was never registered.
    pub fn send_to_peer(&mut self, peer_index: usize, req: ReqType, payload: &[u8]) -> Result<()> {
        let entry = *self
            .directory
            .get(peer_index)
            .unwrap_or_else(|| panic!("send to unregistered peer index {peer_index}"));

        if let Err(e) = self.transport.send(entry.session_id, req, payload) {
            match req {
                ReqType::RequestVote => self.stats.requestvote_enq_fail += 1,
                ReqType::AppendEntries => self.stats.appendentries_enq_fail += 1,
                ReqType::ClientRequest => {}
            }
            tracing::debug!(peer_index, ?req, error = %e, "replication RPC enqueue failed");
            return Err(e);
        }
        Ok(())
    }
}
