use crate::types::{AccountRef, ContractAddressSet, SessionKeyCredential, SigningMaterial};
use alloy_primitives::{Address, B256, address, b256};
use alloy_signer_local::PrivateKeySigner;

/// First Anvil account key, used as session key in tests.
pub const TEST_SESSION_KEY: B256 =
    b256!("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");

pub const TEST_WALLET: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const TEST_ENTRY_POINT: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
pub const TEST_FACTORY: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
pub const TEST_PAYMASTER: Address = address!("0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9");
pub const TEST_FEE_TOKEN: Address = address!("0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9");
pub const TEST_ELECTION_MANAGER: Address = address!("0x0165878A594ca255338adfa4d48449f69242Eb8F");

pub fn create_test_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&TEST_SESSION_KEY).expect("valid test private key")
}

pub const fn create_test_account() -> AccountRef {
    AccountRef::new(42, 7)
}

pub const fn create_test_credential(expires_at: u64) -> SessionKeyCredential {
    SessionKeyCredential {
        signing_material: SigningMaterial::new(TEST_SESSION_KEY),
        scw_address: TEST_WALLET,
        expires_at,
    }
}

pub const fn create_test_addresses() -> ContractAddressSet {
    ContractAddressSet {
        chain_id: 31337,
        entry_point: TEST_ENTRY_POINT,
        factory: TEST_FACTORY,
        paymaster: TEST_PAYMASTER,
        fee_token: TEST_FEE_TOKEN,
        domain_manager: Some(TEST_ELECTION_MANAGER),
    }
}
