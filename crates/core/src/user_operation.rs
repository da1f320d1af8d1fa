//! EIP-4337 v0.6 user operation envelope as exchanged with the relay.
//!
//! Numeric fields are `U256` in memory and decimal strings on the wire.
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

/// User operation envelope. The signature can only be attached once, through
/// [`UserOperation::into_signed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    #[serde(with = "decimal_u256")]
    pub call_gas_limit: U256,
    #[serde(with = "decimal_u256")]
    pub verification_gas_limit: U256,
    #[serde(with = "decimal_u256")]
    pub pre_verification_gas: U256,
    #[serde(with = "decimal_u256")]
    pub max_fee_per_gas: U256,
    #[serde(with = "decimal_u256")]
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    signature: Bytes,
}

impl UserOperation {
    /// Create an unsigned envelope; the signature stays empty until signing.
    #[allow(clippy::too_many_arguments)]
    pub fn unsigned(
        sender: Address,
        nonce: U256,
        init_code: Bytes,
        call_data: Bytes,
        call_gas_limit: U256,
        verification_gas_limit: U256,
        pre_verification_gas: U256,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        paymaster_and_data: Bytes,
    ) -> Self {
        Self {
            sender,
            nonce,
            init_code,
            call_data,
            call_gas_limit,
            verification_gas_limit,
            pre_verification_gas,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            paymaster_and_data,
            signature: Bytes::new(),
        }
    }

    pub const fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Whether a signature is attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Attach the signature over `hash`, consuming the unsigned envelope.
    pub fn into_signed(mut self, hash: B256, signature: Bytes) -> SignedUserOperation {
        self.signature = signature;
        SignedUserOperation {
            operation: self,
            hash,
        }
    }
}

/// A user operation together with the entry point digest its signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUserOperation {
    operation: UserOperation,
    hash: B256,
}

impl SignedUserOperation {
    pub const fn operation(&self) -> &UserOperation {
        &self.operation
    }

    /// Digest returned by the entry point for the unsigned envelope.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    pub const fn sender(&self) -> Address {
        self.operation.sender
    }

    pub const fn nonce(&self) -> U256 {
        self.operation.nonce
    }
}

/// Serde adapter writing `U256` as a base-10 string. Reading also accepts
/// `0x`-prefixed hex strings and plain JSON integers.
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserializer, Serializer, de};
    use std::fmt;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        deserializer.deserialize_any(U256Visitor)
    }

    struct U256Visitor;

    impl de::Visitor<'_> for U256Visitor {
        type Value = U256;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal or 0x-prefixed uint256 string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
            Ok(U256::from(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
            U256::from_str(v.trim()).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes};

    fn sample() -> UserOperation {
        UserOperation::unsigned(
            address!("0x1111111111111111111111111111111111111111"),
            U256::from(7),
            Bytes::new(),
            bytes!("0xb61d27f6"),
            U256::from(2_000_000),
            U256::from(1_500_000),
            U256::from(500_000),
            U256::from(30_000_000_000u64),
            U256::from(1_000_000_000u64),
            bytes!("0x3333333333333333333333333333333333333333"),
        )
    }

    #[test]
    fn serializes_numeric_fields_as_decimal_strings() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["nonce"], "7");
        assert_eq!(json["callGasLimit"], "2000000");
        assert_eq!(json["maxFeePerGas"], "30000000000");
        assert_eq!(json["initCode"], "0x");
        assert_eq!(json["signature"], "0x");
        assert_eq!(
            json["paymasterAndData"],
            "0x3333333333333333333333333333333333333333"
        );
    }

    #[test]
    fn should_deserialize_hex_and_decimal_quantities() {
        const TEST_USER_OPERATION: &str = r#"
        {
            "sender": "0x1111111111111111111111111111111111111111",
            "nonce": "0x0",
            "initCode": "0x",
            "callData": "0x",
            "callGasLimit": "21000",
            "verificationGasLimit": "0x100000",
            "preVerificationGas": 65536,
            "maxFeePerGas": "1500000000",
            "maxPriorityFeePerGas": "0x3b9aca00",
            "paymasterAndData": "0x",
            "signature": "0x01"
        }
    "#;
        let user_operation: UserOperation = serde_json::from_str(TEST_USER_OPERATION).unwrap();
        assert_eq!(user_operation.nonce, U256::ZERO);
        assert_eq!(user_operation.call_gas_limit, U256::from(21_000));
        assert_eq!(user_operation.verification_gas_limit, U256::from(0x100000));
        assert_eq!(user_operation.pre_verification_gas, U256::from(65_536));
        assert_eq!(user_operation.max_priority_fee_per_gas, U256::from(0x3b9aca00));
        assert_eq!(user_operation.signature(), &bytes!("0x01"));
    }

    #[test]
    fn should_throw_error_when_deserializing_invalid_user_operation() {
        const TEST_INVALID_USER_OPERATION: &str = r#"
        {
            "sender": "0x1111111111111111111111111111111111111111",
            "nonce": "0x0",
            "callGasLimit": "0x5208"
        }
    "#;
        let user_operation = serde_json::from_str::<UserOperation>(TEST_INVALID_USER_OPERATION);
        assert!(user_operation.is_err());
    }

    #[test]
    fn signing_attaches_signature_and_keeps_hash() {
        let unsigned = sample();
        assert!(!unsigned.is_signed());

        let hash = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");
        let signed = unsigned.clone().into_signed(hash, bytes!("0x0102"));

        assert_eq!(signed.hash(), hash);
        assert!(signed.operation().is_signed());
        assert_eq!(signed.operation().call_data, unsigned.call_data);
        assert_eq!(signed.nonce(), U256::from(7));
    }
}
