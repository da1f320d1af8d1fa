//! Wallet `execute` call data wrapping a call into the election manager.
use crate::contracts::{IElectionManager, ISmartAccount};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

/// Election id used when the caller does not pick one.
pub const DEFAULT_ELECTION_ID: u64 = 1;

/// The inner call the wallet forwards to the election manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainCall {
    /// `createSession(electionId, duration, maxVoters)`.
    CreateSession {
        election_id: U256,
        duration: U256,
        max_voters: U256,
    },
    /// Pre-encoded call data, forwarded untouched.
    Raw(Bytes),
}

impl DomainCall {
    /// `createSession` for the default election.
    pub fn create_session(duration: u64, max_voters: u64) -> Self {
        Self::CreateSession {
            election_id: U256::from(DEFAULT_ELECTION_ID),
            duration: U256::from(duration),
            max_voters: U256::from(max_voters),
        }
    }

    /// ABI-encoded call data of the inner call.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::CreateSession {
                election_id,
                duration,
                max_voters,
            } => IElectionManager::createSessionCall {
                electionId: *election_id,
                duration: *duration,
                maxVoters: *max_voters,
            }
            .abi_encode()
            .into(),
            Self::Raw(data) => data.clone(),
        }
    }
}

/// `execute(target, value, inner)` on the smart-contract wallet.
pub fn compose_execute(target: Address, value: U256, inner: Bytes) -> Bytes {
    ISmartAccount::executeCall {
        dest: target,
        value,
        func: inner,
    }
    .abi_encode()
    .into()
}

/// [`compose_execute`] with `call` encoded as the inner call data.
pub fn compose_domain_call(target: Address, value: U256, call: &DomainCall) -> Bytes {
    compose_execute(target, value, call.encode())
}

/// Reverse of [`compose_execute`].
pub fn decode_execute(data: &[u8]) -> Result<(Address, U256, Bytes), alloy_sol_types::Error> {
    let call = ISmartAccount::executeCall::abi_decode(data)?;
    Ok((call.dest, call.value, call.func))
}
