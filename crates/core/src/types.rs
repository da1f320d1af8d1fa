//! Accounts, session key credentials and contract addresses.
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Contract addresses needed to build and sponsor a user operation on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddressSet {
    /// Chain the addresses belong to.
    pub chain_id: u64,
    pub entry_point: Address,
    pub factory: Address,
    pub paymaster: Address,
    /// ERC-20 token gas is paid in.
    pub fee_token: Address,
    /// Election manager contract; older registries do not publish it.
    pub domain_manager: Option<Address>,
}

/// The console account a session key is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    #[serde(rename = "TaiKhoanID")]
    pub account_id: i64,
    #[serde(rename = "ViID")]
    pub wallet_id: i64,
}

impl AccountRef {
    pub const fn new(account_id: i64, wallet_id: i64) -> Self {
        Self {
            account_id,
            wallet_id,
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account {} / wallet {}", self.account_id, self.wallet_id)
    }
}

/// Private key bytes of a session key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningMaterial(B256);

impl SigningMaterial {
    /// Wrap raw key bytes.
    pub const fn new(secret: B256) -> Self {
        Self(secret)
    }

    pub const fn secret(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningMaterial(<redacted>)")
    }
}

/// A short-lived key allowed to sign on behalf of one smart-contract wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyCredential {
    pub signing_material: SigningMaterial,
    pub scw_address: Address,
    /// Unix seconds.
    pub expires_at: u64,
}

impl SessionKeyCredential {
    /// A credential is unusable from the millisecond its expiry is reached.
    pub const fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.saturating_mul(1000) <= now_ms
    }

    /// [`Self::is_expired_at`] against the system clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_millis())
    }
}

/// Milliseconds since the unix epoch, zero if the system clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Source of wall-clock time, swappable in tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        unix_millis()
    }
}
