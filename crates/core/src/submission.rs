//! Relay acknowledgements and the record a confirmation poll settles.
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Relay answer to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionAck {
    pub transaction_hash: Option<String>,
    /// Hash echoed back by the relay, if any.
    pub user_op_hash: Option<B256>,
    /// Hash the relay computed itself, if any.
    pub backend_hash: Option<B256>,
}

impl SubmissionAck {
    /// Identifier to poll with: the relay's own hash first, then the echoed
    /// one, then the locally computed digest.
    pub fn relay_hash_or(&self, frontend_hash: B256) -> B256 {
        self.backend_hash
            .or(self.user_op_hash)
            .unwrap_or(frontend_hash)
    }
}

/// Relay-side state of a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Success,
    Failed,
}

/// Tracks one submitted user operation until the polling loop settles it.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// Digest the session key signed.
    pub frontend_hash: B256,
    /// Identifier the relay answers status queries for.
    pub relay_hash: B256,
    pub transaction_hash: Option<String>,
    pub status: SubmissionStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Polling stops at this instant regardless of attempts.
    pub deadline: Instant,
    /// Set once polling stopped without a terminal status.
    pub abandoned: bool,
}

impl SubmissionRecord {
    /// Pending record polled under the hash picked by [`SubmissionAck::relay_hash_or`].
    pub fn new(frontend_hash: B256, ack: &SubmissionAck, max_attempts: u32, timeout: Duration) -> Self {
        Self {
            frontend_hash,
            relay_hash: ack.relay_hash_or(frontend_hash),
            transaction_hash: ack.transaction_hash.clone().filter(|h| !h.is_empty()),
            status: SubmissionStatus::Pending,
            attempts: 0,
            max_attempts,
            deadline: Instant::now() + timeout,
            abandoned: false,
        }
    }

    /// The relay polls under a hash other than the one signed.
    pub fn hashes_diverge(&self) -> bool {
        self.frontend_hash != self.relay_hash
    }

    pub const fn is_terminal(&self) -> bool {
        self.abandoned || !matches!(self.status, SubmissionStatus::Pending)
    }

    pub const fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub(crate) fn settle(&mut self, status: SubmissionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Count one poll; returns the attempt number.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Settle as succeeded. Returns false if already terminal.
    pub fn mark_success(&mut self, transaction_hash: Option<String>) -> bool {
        if let Some(hash) = transaction_hash.filter(|h| !h.is_empty()) {
            self.transaction_hash.get_or_insert(hash);
        }
        self.settle(SubmissionStatus::Success)
    }

    /// Settle as failed. Returns false if already terminal.
    pub fn mark_failed(&mut self) -> bool {
        self.settle(SubmissionStatus::Failed)
    }

    /// Stop tracking without a terminal status.
    pub fn abandon(&mut self) {
        if !self.is_terminal() {
            self.abandoned = true;
        }
    }
}
