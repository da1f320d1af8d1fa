//! Fee-token and wallet readiness checks run before building an operation.
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use ballot_core::{AllowanceError, AllowanceShortfall, ContractAddressSet, OwnershipError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Read-only chain state used by the readiness checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainStateApi: Send + Sync {
    async fn token_balance(&self, token: Address, holder: Address) -> anyhow::Result<U256>;

    async fn token_allowance(
        &self,
        token: Address,
        holder: Address,
        spender: Address,
    ) -> anyhow::Result<U256>;

    /// `owner()` of an ownable contract.
    async fn contract_owner(&self, target: Address) -> anyhow::Result<Address>;

    /// Whether any code is deployed at `address`.
    async fn has_code(&self, address: Address) -> anyhow::Result<bool>;
}

/// Minimum fee-token state a wallet needs before deploying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeThresholds {
    /// Fee-token balance the wallet must hold.
    pub min_balance: U256,
    /// Allowance granted to the factory.
    pub min_factory_allowance: U256,
    /// Allowance granted to the paymaster.
    pub min_paymaster_allowance: U256,
}

impl Default for FeeThresholds {
    fn default() -> Self {
        Self {
            min_balance: U256::from(ONE_TOKEN),
            min_factory_allowance: U256::from(ONE_TOKEN),
            min_paymaster_allowance: U256::from(ONE_TOKEN),
        }
    }
}

/// Checks factory allowance, then paymaster allowance, then balance of the
/// fee token held by `wallet`.
pub async fn check_fee_readiness<C>(
    chain: &C,
    addresses: &ContractAddressSet,
    wallet: Address,
    thresholds: &FeeThresholds,
) -> Result<(), AllowanceError>
where
    C: ChainStateApi + ?Sized,
{
    let token = addresses.fee_token;
    let lookup = |e: anyhow::Error| AllowanceError::Lookup(e.to_string());

    let factory_allowance = chain
        .token_allowance(token, wallet, addresses.factory)
        .await
        .map_err(lookup)?;
    ensure_at_least(
        AllowanceShortfall::FactoryAllowance,
        wallet,
        factory_allowance,
        thresholds.min_factory_allowance,
    )?;

    let paymaster_allowance = chain
        .token_allowance(token, wallet, addresses.paymaster)
        .await
        .map_err(lookup)?;
    ensure_at_least(
        AllowanceShortfall::PaymasterAllowance,
        wallet,
        paymaster_allowance,
        thresholds.min_paymaster_allowance,
    )?;

    let balance = chain.token_balance(token, wallet).await.map_err(lookup)?;
    ensure_at_least(
        AllowanceShortfall::Balance,
        wallet,
        balance,
        thresholds.min_balance,
    )?;

    debug!(
        message = "Fee token ready",
        wallet = %wallet,
        balance = %balance,
        factory_allowance = %factory_allowance,
        paymaster_allowance = %paymaster_allowance
    );
    Ok(())
}

fn ensure_at_least(
    kind: AllowanceShortfall,
    holder: Address,
    actual: U256,
    required: U256,
) -> Result<(), AllowanceError> {
    if actual < required {
        info!(
            message = "Fee token requirement not met",
            kind = ?kind,
            holder = %holder,
            actual = %actual,
            required = %required
        );
        return Err(AllowanceError::Insufficient {
            kind,
            holder,
            actual,
            required,
        });
    }
    Ok(())
}

/// The wallet must be deployed and be the `owner()` of `target`.
pub async fn check_ownership<C>(
    chain: &C,
    wallet: Address,
    target: Address,
) -> Result<(), OwnershipError>
where
    C: ChainStateApi + ?Sized,
{
    let deployed = chain
        .has_code(wallet)
        .await
        .map_err(|e| OwnershipError::Lookup {
            target: wallet,
            reason: e.to_string(),
        })?;
    if !deployed {
        return Err(OwnershipError::WalletNotDeployed { wallet });
    }

    let owner = chain
        .contract_owner(target)
        .await
        .map_err(|e| OwnershipError::Lookup {
            target,
            reason: e.to_string(),
        })?;
    if owner != wallet {
        return Err(OwnershipError::NotOwner {
            wallet,
            target,
            owner,
        });
    }
    Ok(())
}
