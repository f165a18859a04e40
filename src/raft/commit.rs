//! Leader-side single-flight commit tracking.
//!
//! The leader keeps exactly one slot correlating an in-flight client write
//! with its eventual commit notification. A write arriving while the slot
//! is busy is rejected with try-again: backpressure is explicit and
//! visible to the caller rather than queued.

use std::time::{Duration, Instant};

use crate::raft::CommitTicket;
use crate::{Result, SmrError};

struct Pending<R> {
    ticket: CommitTicket,
    token: R,
    started: Instant,
}

/// Two-state (idle/pending) tracker, generic over the transport's reply
/// token so the core never touches response framing.
pub struct CommitTracker<R> {
    pending: Option<Pending<R>>,
}

impl<R> CommitTracker<R> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The ticket being watched, if a write is in flight.
    pub fn pending_ticket(&self) -> Option<CommitTicket> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    /// idle -> pending. Records the caller's reply token and the request
    /// start time.
    pub fn begin(&mut self, ticket: CommitTicket, token: R) -> Result<()> {
        if self.pending.is_some() {
            return Err(SmrError::PendingCommit);
        }
        self.pending = Some(Pending {
            ticket,
            token,
            started: Instant::now(),
        });
        Ok(())
    }

    /// pending -> idle on commit. Returns the reply token and the elapsed
    /// time as a latency sample.
    ///
    /// # Panics
    ///
    /// Panics if no write is pending; callers check `pending_ticket` first.
    pub fn complete(&mut self) -> (R, Duration) {
        let pending = self
            .pending
            .take()
            .expect("commit completion with no pending request");
        (pending.token, pending.started.elapsed())
    }

    /// pending -> idle without a commit, used when leadership is lost and
    /// the caller must be redirected. Returns the reply token if a write
    /// was in flight.
    pub fn abandon(&mut self) -> Option<R> {
        self.pending.take().map(|p| p.token)
    }
}

impl<R> Default for CommitTracker<R> {
    fn default() -> Self {
        Self::new()
    }
}
