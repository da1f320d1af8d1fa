#![allow(dead_code)]

/// In-memory stand-ins for the relay backend and the chain.
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use ballot_account_abstraction::{ChainStateApi, EntryPointApi};
use ballot_core::test_utils::{TEST_WALLET, create_test_addresses, create_test_credential};
use ballot_core::{
    AccountRef, Clock, ConfigError, ContractAddressSet, KeyError, SessionKeyCredential,
    SignedUserOperation, SubmissionAck, SubmitError, UserOperation,
};
use ballot_deployer::{DeployConfig, DeployServices, Deployer};
use ballot_relay_client::{
    ApiError, BundlerApi, ContractRegistry, RecordApi, RelayStatus, SessionKeyService,
    SessionRecord,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const NOW_MS: u64 = 1_700_000_000_000;
pub const OP_HASH: B256 = B256::repeat_byte(0x44);
pub const RELAY_HASH: B256 = B256::repeat_byte(0x55);
pub const TX_HASH: &str = "0x9a3f000000000000000000000000000000000000000000000000000000000001";

pub const ONE_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

pub struct FakeSessionKeys {
    pub credential: Mutex<Option<SessionKeyCredential>>,
    /// Credential issued by `create-session`.
    pub issued_on_create: Mutex<Option<SessionKeyCredential>>,
    pub fetches: AtomicUsize,
    pub creates: AtomicUsize,
}

impl FakeSessionKeys {
    pub fn with_valid_key() -> Arc<Self> {
        Arc::new(Self {
            credential: Mutex::new(Some(create_test_credential(NOW_MS / 1000 + 3_600))),
            issued_on_create: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        })
    }

    pub fn without_key() -> Arc<Self> {
        Arc::new(Self {
            credential: Mutex::new(None),
            issued_on_create: Mutex::new(Some(create_test_credential(NOW_MS / 1000 + 3_600))),
            fetches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SessionKeyService for FakeSessionKeys {
    async fn get_session_key(&self, _account: AccountRef) -> Result<SessionKeyCredential, KeyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.credential
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KeyError::Refused("no session key".into()))
    }

    async fn create_session(&self, _account: AccountRef) -> Result<(), KeyError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let issued = self.issued_on_create.lock().unwrap().take();
        if let Some(credential) = issued {
            *self.credential.lock().unwrap() = Some(credential);
        }
        Ok(())
    }
}

pub struct FakeRegistry {
    pub addresses: ContractAddressSet,
    pub fetches: AtomicUsize,
}

impl FakeRegistry {
    pub fn new(addresses: ContractAddressSet) -> Arc<Self> {
        Arc::new(Self {
            addresses,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ContractRegistry for FakeRegistry {
    async fn fetch(&self) -> Result<ContractAddressSet, ConfigError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.addresses)
    }
}

/// Entry point and token state of a local chain.
pub struct FakeChain {
    pub balance: U256,
    pub factory_allowance: U256,
    pub paymaster_allowance: U256,
    pub owner: Address,
    pub wallet_deployed: bool,
    pub nonce: Option<U256>,
    pub legacy_nonce: Option<U256>,
    pub hashed: Mutex<Vec<UserOperation>>,
    pub reads: AtomicUsize,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            balance: ONE_TOKEN * U256::from(10),
            factory_allowance: ONE_TOKEN * U256::from(10),
            paymaster_allowance: ONE_TOKEN * U256::from(10),
            owner: TEST_WALLET,
            wallet_deployed: true,
            nonce: Some(U256::from(3)),
            legacy_nonce: Some(U256::from(9)),
            hashed: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }
}

impl FakeChain {
    pub fn hash_calls(&self) -> usize {
        self.hashed.lock().unwrap().len()
    }
}

#[async_trait]
impl EntryPointApi for FakeChain {
    async fn get_nonce(&self, _entry_point: Address, _sender: Address) -> anyhow::Result<U256> {
        self.nonce
            .ok_or_else(|| anyhow::anyhow!("execution reverted: getNonce"))
    }

    async fn get_legacy_nonce(
        &self,
        _entry_point: Address,
        _sender: Address,
    ) -> anyhow::Result<U256> {
        self.legacy_nonce
            .ok_or_else(|| anyhow::anyhow!("execution reverted: nonces"))
    }

    async fn get_user_op_hash(
        &self,
        _entry_point: Address,
        op: &UserOperation,
    ) -> anyhow::Result<B256> {
        self.hashed.lock().unwrap().push(op.clone());
        Ok(OP_HASH)
    }
}

#[async_trait]
impl ChainStateApi for FakeChain {
    async fn token_balance(&self, _token: Address, _holder: Address) -> anyhow::Result<U256> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }

    async fn token_allowance(
        &self,
        _token: Address,
        _owner: Address,
        spender: Address,
    ) -> anyhow::Result<U256> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if spender == create_test_addresses().factory {
            Ok(self.factory_allowance)
        } else {
            Ok(self.paymaster_allowance)
        }
    }

    async fn contract_owner(&self, _target: Address) -> anyhow::Result<Address> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.owner)
    }

    async fn has_code(&self, _address: Address) -> anyhow::Result<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.wallet_deployed)
    }
}

pub struct FakeBundler {
    pub acks: Mutex<VecDeque<Result<SubmissionAck, SubmitError>>>,
    pub statuses: Mutex<VecDeque<Result<RelayStatus, SubmitError>>>,
    pub submitted: Mutex<Vec<SignedUserOperation>>,
    pub polled: Mutex<Vec<B256>>,
    /// When set, `submit` waits for a notification first.
    pub gate: Option<Arc<Notify>>,
}

impl FakeBundler {
    /// Accepts, reports pending once, then success with [`TX_HASH`].
    pub fn confirming() -> Arc<Self> {
        Self::with_statuses(vec![
            Ok(RelayStatus::Pending {
                status: "pending".into(),
            }),
            Ok(RelayStatus::Success {
                transaction_hash: Some(TX_HASH.into()),
            }),
        ])
    }

    pub fn with_statuses(statuses: Vec<Result<RelayStatus, SubmitError>>) -> Arc<Self> {
        Arc::new(Self::new(statuses, None))
    }

    pub fn new(
        statuses: Vec<Result<RelayStatus, SubmitError>>,
        gate: Option<Arc<Notify>>,
    ) -> Self {
        Self {
            acks: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(statuses.into()),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl BundlerApi for FakeBundler {
    async fn submit(&self, signed: &SignedUserOperation) -> Result<SubmissionAck, SubmitError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.submitted.lock().unwrap().push(signed.clone());
        self.acks.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SubmissionAck {
                transaction_hash: None,
                user_op_hash: None,
                backend_hash: Some(RELAY_HASH),
            })
        })
    }

    async fn check_status(&self, user_op_hash: B256) -> Result<RelayStatus, SubmitError> {
        self.polled.lock().unwrap().push(user_op_hash);
        self.statuses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(RelayStatus::Pending {
                status: "pending".into(),
            })
        })
    }
}

#[derive(Default)]
pub struct FakeRecords {
    pub fail: AtomicBool,
    pub written: Mutex<Vec<SessionRecord>>,
}

#[async_trait]
impl RecordApi for FakeRecords {
    async fn write_session(&self, record: &SessionRecord) -> Result<(), ApiError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Endpoint {
                path: "election-sessions".into(),
                source: url::ParseError::EmptyHost,
            });
        }
        self.written.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Every collaborator of one test deployer, kept for assertions.
pub struct Harness {
    pub keys: Arc<FakeSessionKeys>,
    pub registry: Arc<FakeRegistry>,
    pub chain: Arc<FakeChain>,
    pub bundler: Arc<FakeBundler>,
    pub records: Arc<FakeRecords>,
}

impl Harness {
    pub fn new(chain: FakeChain, bundler: Arc<FakeBundler>) -> Self {
        Self {
            keys: FakeSessionKeys::with_valid_key(),
            registry: FakeRegistry::new(create_test_addresses()),
            chain: Arc::new(chain),
            bundler,
            records: Arc::new(FakeRecords::default()),
        }
    }

    pub fn happy() -> Self {
        Self::new(FakeChain::default(), FakeBundler::confirming())
    }

    pub fn services(&self) -> DeployServices {
        DeployServices {
            session_keys: self.keys.clone(),
            registry: self.registry.clone(),
            entry_point: self.chain.clone(),
            chain: self.chain.clone(),
            bundler: self.bundler.clone(),
            records: Some(self.records.clone()),
        }
    }

    pub fn deployer(&self) -> Deployer {
        Deployer::with_clock(
            self.services(),
            DeployConfig::default(),
            Arc::new(FixedClock(NOW_MS)),
        )
    }
}
