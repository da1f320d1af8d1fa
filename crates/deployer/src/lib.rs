//! Runs session-key deploy flows against the relay backend and the chain.
pub mod addresses;
pub mod coordinator;
pub mod flow;
pub mod metrics;
pub mod poller;
pub mod provisioning;

pub use addresses::CachedAddressResolver;
pub use coordinator::{FlowBusy, FlowCoordinator, FlowGuard};
pub use flow::{
    DeployConfig, DeployError, DeployOutcome, DeployReport, DeployRequest, DeployServices, Deployer,
};
pub use metrics::{DeployerMetrics, init_prometheus_exporter};
pub use poller::{ConfirmationPoller, IndeterminateReason, PollOutcome, PollPolicy, PollingTask};
pub use provisioning::{DEFAULT_MAX_FETCH_ATTEMPTS, SessionKeyProvisioner};
