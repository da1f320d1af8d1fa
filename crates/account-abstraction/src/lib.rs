//! Building blocks for EIP-4337 user operations sent from a smart-contract
//! wallet with a session key.
pub mod builder;
pub mod calldata;
pub mod chain_state;
pub mod contracts;
pub mod entry_point;
pub mod onchain;
pub mod signer;

pub use builder::{GasSettings, UserOperationBuilder};
pub use calldata::{DEFAULT_ELECTION_ID, DomainCall, compose_domain_call, compose_execute};
pub use chain_state::{ChainStateApi, FeeThresholds, check_fee_readiness, check_ownership};
pub use entry_point::{EntryPointApi, resolve_nonce};
pub use onchain::OnchainReader;
pub use signer::{SignatureScheme, hash_and_sign};
