//! One deploy flow: session key, readiness checks, user operation, relay
//! submission and confirmation polling, published through [`ProgressTracker`].
use crate::addresses::CachedAddressResolver;
use crate::coordinator::{FlowBusy, FlowCoordinator};
use crate::metrics::DeployerMetrics;
use crate::poller::{ConfirmationPoller, IndeterminateReason, PollOutcome, PollPolicy};
use crate::provisioning::SessionKeyProvisioner;
use alloy_primitives::{Address, B256, U256};
use ballot_account_abstraction::{
    ChainStateApi, DomainCall, EntryPointApi, FeeThresholds, GasSettings, SignatureScheme,
    UserOperationBuilder, check_fee_readiness, check_ownership, compose_domain_call,
    hash_and_sign, resolve_nonce,
};
use ballot_core::{
    AccountRef, AllowanceError, Clock, ConfigError, DeployProgress, KeyError, NonceError,
    OwnershipError, ProgressSnapshot, ProgressTracker, SignError, SubmissionRecord, SubmitError,
    SystemClock,
};
use ballot_relay_client::{
    BundlerApi, ContractRegistry, RecordApi, SessionKeyService, SessionRecord,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Tunables of a deploy flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Gas limits and fee caps of the operation.
    pub gas: GasSettings,
    /// Fee-token state required before signing.
    pub fee_thresholds: FeeThresholds,
    /// Confirmation wait bounds.
    pub poll: PollPolicy,
    pub signature_scheme: SignatureScheme,
    /// Route gas payment through the paymaster.
    pub sponsored: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            gas: GasSettings::default(),
            fee_thresholds: FeeThresholds::default(),
            poll: PollPolicy::default(),
            signature_scheme: SignatureScheme::default(),
            sponsored: true,
        }
    }
}

/// What the user asked to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Account whose session key signs.
    pub account: AccountRef,
    /// Call forwarded by the wallet.
    pub call: DomainCall,
    /// Contract receiving the call; the registry's election manager if unset.
    pub target: Option<Address>,
    /// Wei sent along with the call.
    pub value: U256,
}

impl DeployRequest {
    /// `createSession(election_id, duration, max_voters)` on the election manager.
    pub fn create_session(
        account: AccountRef,
        election_id: u64,
        duration: u64,
        max_voters: u64,
    ) -> Self {
        Self {
            account,
            call: DomainCall::CreateSession {
                election_id: U256::from(election_id),
                duration: U256::from(duration),
                max_voters: U256::from(max_voters),
            },
            target: None,
            value: U256::ZERO,
        }
    }

    /// Call `target` instead of the registry's election manager.
    pub fn with_target(mut self, target: Address) -> Self {
        self.target = Some(target);
        self
    }
}

/// How a flow that got past submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The relay reported success.
    Confirmed,
    /// Polling stopped without a terminal status; check again later.
    Indeterminate(IndeterminateReason),
    /// The caller stopped polling.
    Abandoned,
}

/// Result of a flow that got past submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub outcome: DeployOutcome,
    /// Smart-contract wallet that sent the operation.
    pub sender: Address,
    pub target: Address,
    pub nonce: U256,
    /// Digest the session key signed.
    pub frontend_hash: B256,
    /// Identifier the relay was polled with.
    pub relay_hash: B256,
    pub transaction_hash: Option<String>,
    pub poll_attempts: u32,
    /// `None` when no record write applies.
    pub record_written: Option<bool>,
    pub progress: ProgressSnapshot,
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    SessionKey(#[from] KeyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Busy(#[from] FlowBusy),

    #[error(transparent)]
    Allowance(#[from] AllowanceError),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The relay reported the operation failed; its message is kept verbatim.
    #[error("{message}")]
    OperationFailed { message: String, relay_hash: B256 },

    /// The tracker belongs to an earlier flow; each flow needs a fresh one.
    #[error("progress tracker already at {0}, start the flow with a new tracker")]
    TrackerInUse(DeployProgress),

    #[error("deploy cancelled before submission")]
    Cancelled,

    #[error("confirmation task stopped unexpectedly: {0}")]
    PollTask(String),
}

/// Backend collaborators of a [`Deployer`].
#[derive(Clone)]
pub struct DeployServices {
    /// Session key fetch and creation.
    pub session_keys: Arc<dyn SessionKeyService>,
    /// Contract address source.
    pub registry: Arc<dyn ContractRegistry>,
    pub entry_point: Arc<dyn EntryPointApi>,
    pub chain: Arc<dyn ChainStateApi>,
    pub bundler: Arc<dyn BundlerApi>,
    /// Session record sink; no record is written when `None`.
    pub records: Option<Arc<dyn RecordApi>>,
}

impl fmt::Debug for DeployServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployServices")
            .field("records", &self.records.is_some())
            .finish_non_exhaustive()
    }
}

/// Runs deploy flows. Holds the caches shared between flows: session keys,
/// contract addresses and the (wallet, target) slots of running flows.
pub struct Deployer {
    services: DeployServices,
    config: DeployConfig,
    clock: Arc<dyn Clock>,
    provisioner: SessionKeyProvisioner,
    addresses: CachedAddressResolver,
    coordinator: FlowCoordinator,
    poller: ConfirmationPoller,
    metrics: DeployerMetrics,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl Deployer {
    /// Deployer on the system clock.
    pub fn new(services: DeployServices, config: DeployConfig) -> Self {
        Self::with_clock(services, config, Arc::new(SystemClock))
    }

    /// Deployer checking session key expiry against `clock`.
    pub fn with_clock(services: DeployServices, config: DeployConfig, clock: Arc<dyn Clock>) -> Self {
        let metrics = DeployerMetrics::default();
        Self {
            provisioner: SessionKeyProvisioner::new(services.session_keys.clone(), clock.clone()),
            addresses: CachedAddressResolver::new(services.registry.clone()),
            coordinator: FlowCoordinator::new(),
            poller: ConfirmationPoller::new(services.bundler.clone(), config.poll, metrics.clone()),
            services,
            config,
            clock,
            metrics,
        }
    }

    pub const fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Session key cache shared by all flows.
    pub const fn provisioner(&self) -> &SessionKeyProvisioner {
        &self.provisioner
    }

    pub const fn addresses(&self) -> &CachedAddressResolver {
        &self.addresses
    }

    /// (wallet, target) pairs with a running flow.
    pub const fn coordinator(&self) -> &FlowCoordinator {
        &self.coordinator
    }

    /// Run one flow to a terminal state or an indeterminate outcome.
    ///
    /// `progress` must be in `NotStarted`. Dropping the returned future stops
    /// confirmation polling.
    ///
    /// Errors leave `progress` in `Failed`, except an insufficient fee-token
    /// allowance, which leaves it in `ApprovingTokens`.
    pub async fn deploy(
        &self,
        request: DeployRequest,
        progress: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> Result<DeployReport, DeployError> {
        let step = progress.current();
        if step != DeployProgress::NotStarted {
            return Err(DeployError::TrackerInUse(step));
        }

        self.metrics.flows_started.increment(1);
        info!(message = "Deploy flow started", account = %request.account);

        let result = self.run(&request, &progress, &cancel).await;
        if let Err(e) = &result {
            let halted_for_approval = matches!(e, DeployError::Allowance(_))
                && progress.current() == DeployProgress::ApprovingTokens;
            if !halted_for_approval {
                self.metrics.flows_failed.increment(1);
                progress.fail(e.to_string());
                error!(message = "Deploy flow failed", account = %request.account, error = %e);
            }
        }
        result
    }

    async fn run(
        &self,
        request: &DeployRequest,
        progress: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<DeployReport, DeployError> {
        progress.advance(DeployProgress::GettingSessionKey, "Getting session key");
        let credential = self.provisioner.ensure_session_key(request.account).await?;
        let addresses = self.addresses.resolve().await?;
        let sender = credential.scw_address;
        let target = request
            .target
            .or(addresses.domain_manager)
            .ok_or(ConfigError::MissingDomainManager)?;

        let _slot = self.coordinator.try_acquire(sender, target)?;

        if let Err(e) = check_fee_readiness(
            self.services.chain.as_ref(),
            &addresses,
            sender,
            &self.config.fee_thresholds,
        )
        .await
        {
            if e.shortfall().is_some() {
                progress.advance(DeployProgress::ApprovingTokens, e.to_string());
            }
            return Err(e.into());
        }

        progress.advance(DeployProgress::PreparingData, "Preparing user operation");
        check_ownership(self.services.chain.as_ref(), sender, target).await?;

        let nonce = resolve_nonce(self.services.entry_point.as_ref(), addresses.entry_point, sender)
            .await?;
        let call_data = compose_domain_call(target, request.value, &request.call);
        let paymaster = self.config.sponsored.then_some(addresses.paymaster);
        let operation = UserOperationBuilder::new(sender, nonce, call_data)
            .gas(self.config.gas)
            .paymaster(paymaster)
            .build();

        let signed = hash_and_sign(
            self.services.entry_point.as_ref(),
            &addresses,
            operation,
            &credential,
            self.config.signature_scheme,
            self.clock.now_ms(),
        )
        .await?;
        let frontend_hash = signed.hash();

        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        progress.advance(DeployProgress::SendingTransaction, "Sending user operation");
        let ack = self.services.bundler.submit(&signed).await?;
        self.metrics.operations_submitted.increment(1);

        let record = SubmissionRecord::new(
            frontend_hash,
            &ack,
            self.config.poll.max_attempts,
            self.config.poll.timeout,
        );
        if record.hashes_diverge() {
            warn!(
                message = "Relay hash differs from signed hash",
                frontend_hash = %record.frontend_hash,
                relay_hash = %record.relay_hash
            );
        }
        if let Some(hash) = &record.transaction_hash {
            progress.set_transaction_hash(hash.clone());
        }
        progress.advance(
            DeployProgress::WaitingConfirmation,
            format!("Waiting for confirmation of {}", record.relay_hash),
        );

        let submitted_at = Instant::now();
        let task = self.poller.spawn(record, Some(progress.clone()), cancel);
        // stops the poll loop if this flow is dropped mid-wait
        let _stop_polling = task.cancellation_token().drop_guard();
        let (outcome, record) = task
            .join()
            .await
            .map_err(|e| DeployError::PollTask(e.to_string()))?;

        let outcome = match outcome {
            PollOutcome::Confirmed { transaction_hash } => {
                self.metrics.operations_confirmed.increment(1);
                self.metrics
                    .confirmation_latency
                    .record(submitted_at.elapsed().as_secs_f64());
                if let Some(hash) = transaction_hash {
                    progress.set_transaction_hash(hash);
                }
                progress.advance(DeployProgress::Success, "User operation confirmed");
                DeployOutcome::Confirmed
            }
            PollOutcome::Failed { message } => {
                return Err(DeployError::OperationFailed {
                    message,
                    relay_hash: record.relay_hash,
                });
            }
            PollOutcome::Indeterminate(reason) => {
                progress.note(format!(
                    "{reason}; the operation may still complete, check {} later",
                    record.relay_hash
                ));
                DeployOutcome::Indeterminate(reason)
            }
            PollOutcome::Cancelled => {
                progress.note("Stopped waiting for confirmation");
                DeployOutcome::Abandoned
            }
        };

        let record_written = if outcome == DeployOutcome::Confirmed {
            self.write_record(request, sender, target, &record).await
        } else {
            None
        };

        Ok(DeployReport {
            outcome,
            sender,
            target,
            nonce: signed.nonce(),
            frontend_hash: record.frontend_hash,
            relay_hash: record.relay_hash,
            transaction_hash: record.transaction_hash.clone(),
            poll_attempts: record.attempts,
            record_written,
            progress: progress.snapshot(),
        })
    }

    async fn write_record(
        &self,
        request: &DeployRequest,
        sender: Address,
        target: Address,
        record: &SubmissionRecord,
    ) -> Option<bool> {
        let records = self.services.records.as_ref()?;
        let DomainCall::CreateSession {
            election_id,
            duration,
            max_voters,
        } = &request.call
        else {
            return None;
        };

        let body = SessionRecord {
            election_id: election_id.to_string(),
            duration: duration.to_string(),
            max_voters: max_voters.to_string(),
            scw_address: sender.to_string(),
            contract_address: target.to_string(),
            user_op_hash: record.relay_hash.to_string(),
            transaction_hash: record.transaction_hash.clone(),
            account_id: request.account.account_id,
        };
        match records.write_session(&body).await {
            Ok(()) => Some(true),
            Err(e) => {
                warn!(
                    message = "Session record not written; on-chain result stands",
                    relay_hash = %record.relay_hash,
                    error = %e
                );
                Some(false)
            }
        }
    }
}
