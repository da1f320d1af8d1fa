//! Error taxonomy of the deploy flow. Every variant below the state machine
//! ends the flow in `Failed` with its display string as the user message.
use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Contract address registry unreachable or unsuccessful.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("contract registry unreachable: {0}")]
    Unreachable(String),

    #[error("contract registry returned an unsuccessful response: {0}")]
    Unsuccessful(String),

    #[error("contract registry returned an invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("no election manager address configured")]
    MissingDomainManager,
}

/// Both nonce accessors failed.
#[derive(Error, Debug)]
#[error("could not read nonce for {sender}: primary accessor: {primary}; secondary accessor: {secondary}")]
pub struct NonceError {
    pub sender: Address,
    pub primary: String,
    pub secondary: String,
}

/// The smart-contract wallet cannot act as the privileged caller.
#[derive(Error, Debug)]
pub enum OwnershipError {
    #[error("smart-contract wallet {wallet} is not deployed")]
    WalletNotDeployed { wallet: Address },

    #[error("smart-contract wallet {wallet} is not the owner of {target} (owner is {owner})")]
    NotOwner {
        wallet: Address,
        target: Address,
        owner: Address,
    },

    #[error("could not read owner of {target}: {reason}")]
    Lookup { target: Address, reason: String },
}

/// Which fee-token requirement was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceShortfall {
    Balance,
    FactoryAllowance,
    PaymasterAllowance,
}

/// Fee-token balance or allowance below the required threshold.
#[derive(Error, Debug)]
pub enum AllowanceError {
    #[error("{kind:?} of {holder} is {actual}, at least {required} required")]
    Insufficient {
        kind: AllowanceShortfall,
        holder: Address,
        actual: U256,
        required: U256,
    },

    #[error("could not read fee token state: {0}")]
    Lookup(String),
}

impl AllowanceError {
    /// Which allowance fell short, if that was the failure.
    pub const fn shortfall(&self) -> Option<AllowanceShortfall> {
        match self {
            Self::Insufficient { kind, .. } => Some(*kind),
            Self::Lookup(_) => None,
        }
    }
}

/// Expired credential, hash view call failure or signer failure.
#[derive(Error, Debug)]
pub enum SignError {
    #[error("session key expired at {expires_at}")]
    CredentialExpired { expires_at: u64 },

    #[error("session key does not belong to wallet {expected}")]
    WrongWallet { expected: Address },

    #[error("entry point hash call failed: {0}")]
    HashCall(String),

    #[error("signing failed: {0}")]
    Signer(String),
}

/// Coarse reason the relay rejected a submission, used for messaging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitCause {
    Paymaster,
    Gas,
    Signature,
    Nonce,
    Other,
}

impl SubmitCause {
    /// Classify a relay error message using the EIP-4337 `AAxx` codes first,
    /// then keywords.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("aa24") || lower.contains("aa34") || lower.contains("signature") {
            Self::Signature
        } else if lower.contains("aa25") || lower.contains("nonce") {
            Self::Nonce
        } else if lower.contains("aa3") || lower.contains("paymaster") {
            Self::Paymaster
        } else if lower.contains("aa21")
            || lower.contains("aa4")
            || lower.contains("aa51")
            || lower.contains("gas")
            || lower.contains("prefund")
        {
            Self::Gas
        } else {
            Self::Other
        }
    }

    /// User-facing explanation of the cause.
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Paymaster => "the paymaster refused to sponsor the operation",
            Self::Gas => "gas limits or fees were not accepted",
            Self::Signature => "the session key signature was rejected",
            Self::Nonce => "the wallet nonce is stale",
            Self::Other => "the relay rejected the operation",
        }
    }
}

/// The relay rejected the submission.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("{}: {message}", .cause.hint())]
    Rejected { cause: SubmitCause, message: String },

    #[error("relay unreachable: {0}")]
    Transport(String),
}

impl SubmitError {
    /// Rejection with its cause classified from the relay message.
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Rejected {
            cause: SubmitCause::classify(&message),
            message,
        }
    }
}

/// Session key could not be obtained.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("session key service unreachable: {0}")]
    Transport(String),

    #[error("session key service refused: {0}")]
    Refused(String),

    #[error("session key service returned an invalid {field}")]
    Invalid { field: &'static str },

    #[error("session key creation failed: {0}")]
    Create(String),

    #[error("no usable session key after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}
