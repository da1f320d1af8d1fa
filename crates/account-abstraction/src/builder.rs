//! Builder for unsigned user operations.
use alloy_primitives::{Address, Bytes, U256};
use ballot_core::UserOperation;
use serde::{Deserialize, Serialize};

const GWEI: u64 = 1_000_000_000;

/// Gas limits and fee caps applied to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    /// Gas for the wallet `execute` call.
    pub call_gas_limit: U256,
    /// Gas for wallet validation and deployment.
    pub verification_gas_limit: U256,
    /// Overhead paid to the bundler.
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            call_gas_limit: U256::from(2_000_000),
            verification_gas_limit: U256::from(1_500_000),
            pre_verification_gas: U256::from(500_000),
            max_fee_per_gas: U256::from(30 * GWEI),
            max_priority_fee_per_gas: U256::from(GWEI),
        }
    }
}

/// Assembles an unsigned [`UserOperation`].
#[derive(Debug, Clone)]
pub struct UserOperationBuilder {
    sender: Address,
    nonce: U256,
    call_data: Bytes,
    init_code: Bytes,
    gas: GasSettings,
    paymaster: Option<Address>,
}

impl UserOperationBuilder {
    /// Builder with default gas, no init code and no paymaster.
    pub fn new(sender: Address, nonce: U256, call_data: Bytes) -> Self {
        Self {
            sender,
            nonce,
            call_data,
            init_code: Bytes::new(),
            gas: GasSettings::default(),
            paymaster: None,
        }
    }

    /// Replace the gas limits and fee caps.
    pub fn gas(mut self, gas: GasSettings) -> Self {
        self.gas = gas;
        self
    }

    /// Sponsor through `paymaster`; its address alone is the paymaster data.
    pub fn paymaster(mut self, paymaster: Option<Address>) -> Self {
        self.paymaster = paymaster;
        self
    }

    /// Factory call for a wallet that is not deployed yet.
    pub fn init_code(mut self, init_code: Bytes) -> Self {
        self.init_code = init_code;
        self
    }

    /// Unsigned operation; sign it with [`UserOperation::into_signed`].
    pub fn build(self) -> UserOperation {
        let paymaster_and_data = self
            .paymaster
            .map(|paymaster| Bytes::copy_from_slice(paymaster.as_slice()))
            .unwrap_or_default();

        UserOperation::unsigned(
            self.sender,
            self.nonce,
            self.init_code,
            self.call_data,
            self.gas.call_gas_limit,
            self.gas.verification_gas_limit,
            self.gas.pre_verification_gas,
            self.gas.max_fee_per_gas,
            self.gas.max_priority_fee_per_gas,
            paymaster_and_data,
        )
    }
}
