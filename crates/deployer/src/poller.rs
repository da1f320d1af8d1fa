//! Bounded confirmation polling of a submitted user operation.
use crate::metrics::DeployerMetrics;
use ballot_core::{ProgressTracker, SubmissionRecord};
use ballot_relay_client::{BundlerApi, RelayStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounds of one confirmation wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicy {
    /// Delay between status queries.
    pub interval: Duration,
    /// Status queries before giving up.
    pub max_attempts: u32,
    /// Wall-clock budget from submission, independent of attempts.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 15,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Why polling stopped before the relay reported a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndeterminateReason {
    AttemptsExhausted,
    TimedOut,
}

impl fmt::Display for IndeterminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptsExhausted => f.write_str("status attempts exhausted"),
            Self::TimedOut => f.write_str("confirmation timed out"),
        }
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed { transaction_hash: Option<String> },
    /// The relay reported failure; `message` is its text, unchanged.
    Failed { message: String },
    /// Stopped without a terminal status; the operation may still land.
    Indeterminate(IndeterminateReason),
    Cancelled,
}

/// Spawns polling tasks that share one bundler and policy.
#[derive(Clone)]
pub struct ConfirmationPoller {
    bundler: Arc<dyn BundlerApi>,
    policy: PollPolicy,
    metrics: DeployerMetrics,
}

impl fmt::Debug for ConfirmationPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationPoller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ConfirmationPoller {
    /// Poller querying `bundler` under `policy`.
    pub fn new(bundler: Arc<dyn BundlerApi>, policy: PollPolicy, metrics: DeployerMetrics) -> Self {
        Self {
            bundler,
            policy,
            metrics,
        }
    }

    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll in the background. `progress` gets a status line per attempt.
    /// Cancelling `parent` stops the task like [`PollingTask::cancel`].
    pub fn spawn(
        &self,
        mut record: SubmissionRecord,
        progress: Option<Arc<ProgressTracker>>,
        parent: &CancellationToken,
    ) -> PollingTask {
        let cancel = parent.child_token();
        let poller = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let outcome = poller
                .await_confirmation(&mut record, &token, progress.as_deref())
                .await;
            (outcome, record)
        });
        PollingTask { cancel, handle }
    }

    /// Poll `record.relay_hash` every interval until a terminal status, the
    /// attempt budget, the record deadline or `cancel`, whichever comes first.
    pub async fn await_confirmation(
        &self,
        record: &mut SubmissionRecord,
        cancel: &CancellationToken,
        progress: Option<&ProgressTracker>,
    ) -> PollOutcome {
        let deadline = record.deadline;
        let mut ticker = interval_at(Instant::now() + self.policy.interval, self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Self::stop(record, PollOutcome::Cancelled),
                _ = sleep_until(deadline) => {
                    return self.give_up(record, IndeterminateReason::TimedOut);
                }
                _ = ticker.tick() => {}
            }

            let attempt = record.record_attempt();
            if let Some(progress) = progress {
                progress.note(format!(
                    "Checking status ({attempt}/{})",
                    record.max_attempts
                ));
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Self::stop(record, PollOutcome::Cancelled),
                _ = sleep_until(deadline) => {
                    return self.give_up(record, IndeterminateReason::TimedOut);
                }
                status = self.bundler.check_status(record.relay_hash) => status,
            };

            match status {
                Ok(RelayStatus::Success { transaction_hash }) => {
                    record.mark_success(transaction_hash);
                    info!(
                        message = "User operation confirmed",
                        relay_hash = %record.relay_hash,
                        attempt,
                        tx_hash = ?record.transaction_hash
                    );
                    return PollOutcome::Confirmed {
                        transaction_hash: record.transaction_hash.clone(),
                    };
                }
                Ok(RelayStatus::Failed { message }) => {
                    record.mark_failed();
                    warn!(
                        message = "Relay reported failure",
                        relay_hash = %record.relay_hash,
                        attempt,
                        reason = %message
                    );
                    return PollOutcome::Failed { message };
                }
                Ok(RelayStatus::Pending { status }) => {
                    debug!(
                        message = "User operation pending",
                        relay_hash = %record.relay_hash,
                        attempt,
                        status = %status
                    );
                }
                Err(e) => {
                    self.metrics.poll_errors.increment(1);
                    warn!(
                        message = "Status check failed",
                        relay_hash = %record.relay_hash,
                        attempt,
                        error = %e
                    );
                }
            }

            if record.attempts_exhausted() {
                return self.give_up(record, IndeterminateReason::AttemptsExhausted);
            }
        }
    }

    fn give_up(&self, record: &mut SubmissionRecord, reason: IndeterminateReason) -> PollOutcome {
        self.metrics.indeterminate_outcomes.increment(1);
        warn!(
            message = "Stopped polling without a terminal status",
            relay_hash = %record.relay_hash,
            attempts = record.attempts,
            reason = %reason
        );
        Self::stop(record, PollOutcome::Indeterminate(reason))
    }

    fn stop(record: &mut SubmissionRecord, outcome: PollOutcome) -> PollOutcome {
        record.abandon();
        outcome
    }
}

/// Handle to a spawned polling loop.
#[derive(Debug)]
pub struct PollingTask {
    cancel: CancellationToken,
    handle: JoinHandle<(PollOutcome, SubmissionRecord)>,
}

impl PollingTask {
    /// Stop polling; the task ends with [`PollOutcome::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has finished.
    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    /// Token that stops the task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the outcome and the settled record.
    pub async fn join(self) -> Result<(PollOutcome, SubmissionRecord), JoinError> {
        self.handle.await
    }
}
