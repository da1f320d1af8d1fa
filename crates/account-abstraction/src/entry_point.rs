//! Entry point reads and nonce resolution.
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use ballot_core::{NonceError, UserOperation};
use tracing::{debug, warn};

/// Read-only view of the EIP-4337 entry point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryPointApi: Send + Sync {
    /// `getNonce(sender, 0)`.
    async fn get_nonce(&self, entry_point: Address, sender: Address) -> anyhow::Result<U256>;

    /// `nonces(sender)`, kept by entry points predating keyed nonces.
    async fn get_legacy_nonce(&self, entry_point: Address, sender: Address)
    -> anyhow::Result<U256>;

    /// `getUserOpHash(op)` over the operation as given.
    async fn get_user_op_hash(
        &self,
        entry_point: Address,
        op: &UserOperation,
    ) -> anyhow::Result<B256>;
}

/// Current nonce of `sender`, trying the keyed accessor first and the legacy
/// accessor second.
pub async fn resolve_nonce<E>(
    api: &E,
    entry_point: Address,
    sender: Address,
) -> Result<U256, NonceError>
where
    E: EntryPointApi + ?Sized,
{
    let primary = match api.get_nonce(entry_point, sender).await {
        Ok(nonce) => {
            debug!(message = "Resolved nonce", sender = %sender, nonce = %nonce);
            return Ok(nonce);
        }
        Err(e) => e,
    };

    warn!(
        message = "getNonce failed, falling back to nonces()",
        sender = %sender,
        error = %primary
    );

    match api.get_legacy_nonce(entry_point, sender).await {
        Ok(nonce) => {
            debug!(message = "Resolved legacy nonce", sender = %sender, nonce = %nonce);
            Ok(nonce)
        }
        Err(secondary) => Err(NonceError {
            sender,
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        }),
    }
}
