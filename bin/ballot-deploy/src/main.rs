use alloy_primitives::Address;
use alloy_provider::{ProviderBuilder, RootProvider};
use ballot_account_abstraction::{FeeThresholds, GasSettings, OnchainReader, SignatureScheme};
use ballot_core::logger::{LogFormat, init_logger};
use ballot_core::{AccountRef, ProgressTracker};
use ballot_deployer::{
    DeployConfig, DeployOutcome, DeployRequest, DeployServices, Deployer, PollPolicy,
    init_prometheus_exporter,
};
use ballot_relay_client::{
    ApiClient, HttpBundler, HttpContractRegistry, HttpRecordApi, HttpSessionKeyService, RecordApi,
};
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "ballot-deploy")]
#[command(about = "Create an election session through a session-key smart wallet")]
struct Config {
    /// JSON-RPC endpoint of the chain hosting the entry point
    #[arg(long, env = "BALLOT_RPC_URL")]
    rpc_url: Url,

    /// Base URL of the session-key, registry and relay backend
    #[arg(long, env = "BALLOT_API_URL")]
    api_url: Url,

    #[arg(long, env = "BALLOT_HTTP_TIMEOUT_MS", default_value = "10000")]
    http_timeout_ms: u64,

    #[arg(long, env = "BALLOT_ACCOUNT_ID")]
    account_id: i64,

    #[arg(long, env = "BALLOT_WALLET_ID")]
    wallet_id: i64,

    #[arg(long, env = "BALLOT_ELECTION_ID", default_value = "1")]
    election_id: u64,

    /// Session length in seconds
    #[arg(long, env = "BALLOT_SESSION_DURATION")]
    duration: u64,

    #[arg(long, env = "BALLOT_MAX_VOTERS")]
    max_voters: u64,

    /// Election manager to call instead of the one the registry publishes
    #[arg(long, env = "BALLOT_ELECTION_MANAGER")]
    election_manager: Option<Address>,

    #[arg(long, env = "BALLOT_SIGNATURE_SCHEME", default_value = "personal-message")]
    signature_scheme: SignatureScheme,

    /// Pay gas through the paymaster
    #[arg(long, env = "BALLOT_SPONSORED", default_value_t = true, action = ArgAction::Set)]
    sponsored: bool,

    #[arg(long, env = "BALLOT_POLL_INTERVAL_SECS", default_value = "5")]
    poll_interval_secs: u64,

    #[arg(long, env = "BALLOT_POLL_MAX_ATTEMPTS", default_value = "15")]
    poll_max_attempts: u32,

    #[arg(long, env = "BALLOT_POLL_TIMEOUT_SECS", default_value = "120")]
    poll_timeout_secs: u64,

    /// Persist the created session through the backend once confirmed
    #[arg(long, env = "BALLOT_WRITE_RECORD", default_value_t = true, action = ArgAction::Set)]
    write_record: bool,

    #[arg(long, env = "BALLOT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "BALLOT_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "BALLOT_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

impl Config {
    fn deploy_config(&self) -> DeployConfig {
        DeployConfig {
            gas: GasSettings::default(),
            fee_thresholds: FeeThresholds::default(),
            poll: PollPolicy {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.poll_max_attempts,
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
            signature_scheme: self.signature_scheme,
            sponsored: self.sponsored,
        }
    }

    fn request(&self) -> DeployRequest {
        let request = DeployRequest::create_session(
            AccountRef::new(self.account_id, self.wallet_id),
            self.election_id,
            self.duration,
            self.max_voters,
        );
        match self.election_manager {
            Some(target) => request.with_target(target),
            None => request,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    init_logger(&config.log_level, config.log_format);

    if let Some(addr) = config.metrics_addr {
        init_prometheus_exporter(addr)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus exporter: {e}"))?;
    }

    info!(
        message = "Starting ballot deploy",
        rpc_url = %config.rpc_url,
        api_url = %config.api_url,
        account_id = config.account_id,
        wallet_id = config.wallet_id,
        signature_scheme = ?config.signature_scheme,
        sponsored = config.sponsored,
    );

    let api = ApiClient::new(
        config.api_url.clone(),
        Duration::from_millis(config.http_timeout_ms),
    )?;

    let provider: RootProvider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_http(config.rpc_url.clone());
    let chain = Arc::new(OnchainReader::new(provider));

    let records = config
        .write_record
        .then(|| Arc::new(HttpRecordApi::new(api.clone())) as Arc<dyn RecordApi>);

    let services = DeployServices {
        session_keys: Arc::new(HttpSessionKeyService::new(api.clone())),
        registry: Arc::new(HttpContractRegistry::new(api.clone())),
        entry_point: chain.clone(),
        chain,
        bundler: Arc::new(HttpBundler::new(api)),
        records,
    };
    let deployer = Deployer::new(services, config.deploy_config());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(message = "Interrupted, stopping deploy");
            on_signal.cancel();
        }
    });

    let progress = Arc::new(ProgressTracker::new());
    let mut updates = progress.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            println!("[{:>3}%] {}: {}", snapshot.percent, snapshot.step, snapshot.message);
            if snapshot.step.is_terminal() {
                break;
            }
        }
    });

    let result = deployer.deploy(config.request(), progress, cancel).await;
    printer.abort();
    let report = result?;

    match &report.outcome {
        DeployOutcome::Confirmed => info!(
            message = "Election session created",
            sender = %report.sender,
            target = %report.target,
            user_op_hash = %report.relay_hash,
            transaction_hash = ?report.transaction_hash,
            record_written = ?report.record_written,
        ),
        DeployOutcome::Indeterminate(reason) => warn!(
            message = "Deploy outcome unknown, check the relay later",
            reason = %reason,
            user_op_hash = %report.relay_hash,
        ),
        DeployOutcome::Abandoned => warn!(
            message = "Stopped waiting for confirmation",
            user_op_hash = %report.relay_hash,
        ),
    }

    Ok(())
}
