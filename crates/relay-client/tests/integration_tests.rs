use alloy_primitives::{B256, Bytes, U256, b256, bytes};
use ballot_core::test_utils::{TEST_WALLET, create_test_account};
use ballot_core::{ConfigError, KeyError, SubmitCause, SubmitError, UserOperation};
use ballot_relay_client::{
    ApiClient, BundlerApi, ContractRegistry, HttpBundler, HttpContractRegistry, HttpRecordApi,
    HttpSessionKeyService, RecordApi, RecordRetry, RelayStatus, SessionKeyService, SessionRecord,
};
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FRONTEND_HASH: B256 =
    b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
const BACKEND_HASH: B256 =
    b256!("0x2222222222222222222222222222222222222222222222222222222222222222");

fn api(server: &MockServer) -> ApiClient {
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    ApiClient::new(base, Duration::from_secs(5)).unwrap()
}

fn signed_operation() -> ballot_core::SignedUserOperation {
    UserOperation::unsigned(
        TEST_WALLET,
        U256::from(3),
        Bytes::new(),
        bytes!("0xb61d27f6"),
        U256::from(2_000_000),
        U256::from(1_500_000),
        U256::from(500_000),
        U256::from(30_000_000_000u64),
        U256::from(1_000_000_000u64),
        Bytes::new(),
    )
    .into_signed(FRONTEND_HASH, bytes!("0x01"))
}

#[tokio::test]
async fn get_session_key_posts_account_with_wire_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get-session-key"))
        .and(body_json(json!({ "TaiKhoanID": 42, "ViID": 7 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sessionKey": "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "expiresAt": 1_900_000_000u64,
            "scwAddress": TEST_WALLET.to_string()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = HttpSessionKeyService::new(api(&server));
    let credential = service
        .get_session_key(create_test_account())
        .await
        .unwrap();

    assert_eq!(credential.scw_address, TEST_WALLET);
    assert_eq!(credential.expires_at, 1_900_000_000);
}

#[tokio::test]
async fn get_session_key_not_found_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get-session-key"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "success": false, "message": "session key not found" })),
        )
        .mount(&server)
        .await;

    let err = HttpSessionKeyService::new(api(&server))
        .get_session_key(create_test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, KeyError::Refused(ref m) if m == "session key not found"));
}

#[tokio::test]
async fn create_session_reports_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create-session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "message": "wallet locked" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = HttpSessionKeyService::new(api(&server))
        .create_session(create_test_account())
        .await
        .unwrap_err();
    assert!(matches!(err, KeyError::Create(ref m) if m == "wallet locked"));
}

#[tokio::test]
async fn registry_fetches_contract_addresses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contract-addresses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "entryPointAddress": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
            "factoryAddress": "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0",
            "paymasterAddress": "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9",
            "hluTokenAddress": "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9",
            "chainId": "210"
        })))
        .mount(&server)
        .await;

    let set = HttpContractRegistry::new(api(&server)).fetch().await.unwrap();
    assert_eq!(set.chain_id, 210);
    assert_eq!(set.domain_manager, None);
}

#[tokio::test]
async fn registry_outage_is_a_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contract-addresses"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = HttpContractRegistry::new(api(&server))
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Unsuccessful(ref m) if m == "maintenance"));
}

#[tokio::test]
async fn registry_unreachable_is_a_config_error() {
    let server = MockServer::start().await;
    let client = api(&server);
    drop(server);

    let err = HttpContractRegistry::new(client).fetch().await.unwrap_err();
    assert!(matches!(err, ConfigError::Unreachable(_)));
}

#[tokio::test]
async fn submit_sends_flattened_operation_and_returns_both_hashes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_partial_json(json!({
            "nonce": "3",
            "callGasLimit": "2000000",
            "initCode": "0x",
            "signature": "0x01",
            "userOpHash": FRONTEND_HASH.to_string()
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txHash": "0xfeed",
            "userOpHash": FRONTEND_HASH.to_string(),
            "backendHash": BACKEND_HASH.to_string()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = HttpBundler::new(api(&server))
        .submit(&signed_operation())
        .await
        .unwrap();

    assert_eq!(ack.transaction_hash.as_deref(), Some("0xfeed"));
    assert_eq!(ack.user_op_hash, Some(FRONTEND_HASH));
    assert_eq!(ack.backend_hash, Some(BACKEND_HASH));
    assert_eq!(ack.relay_hash_or(FRONTEND_HASH), BACKEND_HASH);
}

#[tokio::test]
async fn submit_rejection_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": "AA33 reverted: paymaster validation failed" })),
        )
        .mount(&server)
        .await;

    let err = HttpBundler::new(api(&server))
        .submit(&signed_operation())
        .await
        .unwrap_err();
    match err {
        SubmitError::Rejected { cause, message } => {
            assert_eq!(cause, SubmitCause::Paymaster);
            assert_eq!(message, "AA33 reverted: paymaster validation failed");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn check_status_queries_by_hash() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/check-status"))
        .and(query_param("userOpHash", BACKEND_HASH.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "failed", "message": "AA23 reverted (or OOG)" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let status = HttpBundler::new(api(&server))
        .check_status(BACKEND_HASH)
        .await
        .unwrap();
    assert_eq!(
        status,
        RelayStatus::Failed {
            message: "AA23 reverted (or OOG)".to_string()
        }
    );
}

fn session_record() -> SessionRecord {
    SessionRecord {
        election_id: "1".to_string(),
        duration: "3600".to_string(),
        max_voters: "100".to_string(),
        scw_address: TEST_WALLET.to_string(),
        contract_address: "0x0165878A594ca255338adfa4d48449f69242Eb8F".to_string(),
        user_op_hash: BACKEND_HASH.to_string(),
        transaction_hash: Some("0xfeed".to_string()),
        account_id: 42,
    }
}

fn fast_retry() -> RecordRetry {
    RecordRetry {
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_times: 2,
    }
}

#[tokio::test]
async fn record_write_retries_until_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/election-sessions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/election-sessions"))
        .and(body_partial_json(json!({ "electionId": "1", "TaiKhoanID": 42 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    HttpRecordApi::new(api(&server))
        .with_retry(fast_retry())
        .write_session(&session_record())
        .await
        .unwrap();
}

#[tokio::test]
async fn record_write_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = HttpRecordApi::new(api(&server))
        .with_path("sessions")
        .with_retry(fast_retry())
        .write_session(&session_record())
        .await;
    assert!(result.is_err());
}
