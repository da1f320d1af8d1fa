//! Deploy progress model shared with the console UI.
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::{info, warn};

/// Steps of one deploy flow, in happy-path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeployProgress {
    NotStarted,
    GettingSessionKey,
    ApprovingTokens,
    PreparingData,
    SendingTransaction,
    WaitingConfirmation,
    Success,
    Failed,
}

impl DeployProgress {
    /// Percentage shown next to the step.
    pub const fn percent(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::GettingSessionKey => 10,
            Self::ApprovingTokens => 25,
            Self::PreparingData => 40,
            Self::SendingTransaction => 60,
            Self::WaitingConfirmation => 80,
            Self::Success => 100,
            // keeps whatever was reached before failing
            Self::Failed => 0,
        }
    }

    /// `Success` or `Failed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Steps during which a user operation for the sender is in flight.
    pub const fn is_submitting(self) -> bool {
        matches!(self, Self::SendingTransaction | Self::WaitingConfirmation)
    }
}

impl fmt::Display for DeployProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::GettingSessionKey => "getting session key",
            Self::ApprovingTokens => "approving tokens",
            Self::PreparingData => "preparing data",
            Self::SendingTransaction => "sending transaction",
            Self::WaitingConfirmation => "waiting for confirmation",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What the UI renders: step, percentage and a human readable line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub step: DeployProgress,
    /// Percentage of the step, 0 to 100.
    pub percent: u8,
    pub message: String,
    /// Set once the relay reports the transaction.
    pub transaction_hash: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            step: DeployProgress::NotStarted,
            percent: 0,
            message: String::new(),
            transaction_hash: None,
        }
    }
}

/// Owns the progress of one flow instance and publishes every change.
///
/// Happy-path steps only move forward; `Failed` is reachable from any
/// non-terminal step. Rejected transitions are logged and ignored.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Current step.
    pub fn current(&self) -> DeployProgress {
        self.tx.borrow().step
    }

    /// Move to `step`. Returns false when the move would go backwards, leave a
    /// terminal state, or target `Failed` (use [`Self::fail`]).
    pub fn advance(&self, step: DeployProgress, message: impl Into<String>) -> bool {
        let message = message.into();
        let moved = self.tx.send_if_modified(|snapshot| {
            if snapshot.step.is_terminal() || step == DeployProgress::Failed || step <= snapshot.step
            {
                return false;
            }
            snapshot.step = step;
            snapshot.percent = step.percent();
            snapshot.message = message.clone();
            true
        });

        if moved {
            info!(message = "deploy progress", step = %step, percent = step.percent(), detail = %message);
        } else {
            warn!(message = "rejected progress transition", from = %self.current(), to = %step);
        }
        moved
    }

    /// Terminal failure; the percentage reached so far is kept.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let failed = self.tx.send_if_modified(|snapshot| {
            if snapshot.step.is_terminal() {
                return false;
            }
            snapshot.step = DeployProgress::Failed;
            snapshot.message = message.clone();
            true
        });
        if failed {
            warn!(message = "deploy failed", detail = %message);
        }
        failed
    }

    /// Update the status line without changing step.
    pub fn note(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|snapshot| snapshot.message = message);
    }

    pub fn set_transaction_hash(&self, hash: impl Into<String>) {
        let hash = hash.into();
        self.tx
            .send_modify(|snapshot| snapshot.transaction_hash = Some(hash));
    }
}
