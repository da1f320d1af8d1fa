//! JSON-RPC implementation of the chain reads.
use crate::chain_state::ChainStateApi;
use crate::contracts::{IERC20, IElectionManager, IEntryPoint, ILegacyNonce};
use crate::entry_point::EntryPointApi;
use alloy_primitives::{Address, B256, Bytes, U256, aliases::U192};
use alloy_provider::Provider;
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use anyhow::Context;
use async_trait::async_trait;
use ballot_core::UserOperation;
use tracing::trace;

/// Entry point and chain state reads over a JSON-RPC provider.
#[derive(Debug, Clone)]
pub struct OnchainReader<P> {
    provider: P,
}

impl<P: Provider> OnchainReader<P> {
    /// Reader issuing `eth_call`s through `provider`.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    async fn eth_call<C>(&self, to: Address, call: C) -> anyhow::Result<C::Return>
    where
        C: SolCall + Send,
    {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(call.abi_encode())));

        trace!(message = "eth_call", to = %to, signature = C::SIGNATURE);
        let output = self
            .provider
            .call(tx)
            .await
            .with_context(|| format!("{} on {to} failed", C::SIGNATURE))?;

        C::abi_decode_returns(&output)
            .with_context(|| format!("{} on {to} returned undecodable data", C::SIGNATURE))
    }
}

#[async_trait]
impl<P: Provider> EntryPointApi for OnchainReader<P> {
    async fn get_nonce(&self, entry_point: Address, sender: Address) -> anyhow::Result<U256> {
        self.eth_call(
            entry_point,
            IEntryPoint::getNonceCall {
                sender,
                key: U192::ZERO,
            },
        )
        .await
    }

    async fn get_legacy_nonce(
        &self,
        entry_point: Address,
        sender: Address,
    ) -> anyhow::Result<U256> {
        self.eth_call(entry_point, ILegacyNonce::noncesCall { sender })
            .await
    }

    async fn get_user_op_hash(
        &self,
        entry_point: Address,
        op: &UserOperation,
    ) -> anyhow::Result<B256> {
        self.eth_call(
            entry_point,
            IEntryPoint::getUserOpHashCall { userOp: op.into() },
        )
        .await
    }
}

#[async_trait]
impl<P: Provider> ChainStateApi for OnchainReader<P> {
    async fn token_balance(&self, token: Address, holder: Address) -> anyhow::Result<U256> {
        self.eth_call(token, IERC20::balanceOfCall { account: holder })
            .await
    }

    async fn token_allowance(
        &self,
        token: Address,
        holder: Address,
        spender: Address,
    ) -> anyhow::Result<U256> {
        self.eth_call(
            token,
            IERC20::allowanceCall {
                owner: holder,
                spender,
            },
        )
        .await
    }

    async fn contract_owner(&self, target: Address) -> anyhow::Result<Address> {
        self.eth_call(target, IElectionManager::ownerCall {}).await
    }

    async fn has_code(&self, address: Address) -> anyhow::Result<bool> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .with_context(|| format!("eth_getCode for {address} failed"))?;
        Ok(!code.is_empty())
    }
}
