//! Client of the relay that forwards signed user operations to the chain.
use crate::http::{ApiClient, ApiError};
use alloy_primitives::B256;
use async_trait::async_trait;
use ballot_core::{SignedUserOperation, SubmissionAck, SubmitError, UserOperation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Endpoint accepting signed user operations.
pub const SUBMIT_PATH: &str = "submit";
/// Endpoint reporting the status of a submitted operation.
pub const CHECK_STATUS_PATH: &str = "check-status";

/// Status the relay reports for a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    Success { transaction_hash: Option<String> },
    Failed { message: String },
    /// Any other status string, including none.
    Pending { status: String },
}

#[async_trait]
pub trait BundlerApi: Send + Sync {
    async fn submit(&self, signed: &SignedUserOperation) -> Result<SubmissionAck, SubmitError>;

    /// Status of the operation the relay knows as `user_op_hash`.
    async fn check_status(&self, user_op_hash: B256) -> Result<RelayStatus, SubmitError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    #[serde(flatten)]
    operation: &'a UserOperation,
    user_op_hash: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    user_op_hash: Option<String>,
    #[serde(default)]
    backend_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
}

fn parse_hash(field: &'static str, value: Option<String>) -> Option<B256> {
    let raw = value?;
    match B256::from_str(raw.trim()) {
        Ok(hash) => Some(hash),
        Err(_) => {
            warn!(message = "Ignoring malformed hash from relay", field, value = %raw);
            None
        }
    }
}

impl SubmitResponse {
    fn into_ack(self) -> Result<SubmissionAck, SubmitError> {
        if self.success == Some(false) {
            return Err(SubmitError::rejected(
                self.message
                    .unwrap_or_else(|| "submission refused".to_string()),
            ));
        }
        Ok(SubmissionAck {
            transaction_hash: self.tx_hash.filter(|h| !h.is_empty()),
            user_op_hash: parse_hash("userOpHash", self.user_op_hash),
            backend_hash: parse_hash("backendHash", self.backend_hash),
        })
    }
}

impl From<StatusResponse> for RelayStatus {
    fn from(response: StatusResponse) -> Self {
        let status = response.status.unwrap_or_default();
        match status.to_ascii_lowercase().as_str() {
            "success" => Self::Success {
                transaction_hash: response.tx_hash.filter(|h| !h.is_empty()),
            },
            "failed" => Self::Failed {
                message: response
                    .message
                    .unwrap_or_else(|| "operation failed".to_string()),
            },
            _ => Self::Pending { status },
        }
    }
}

/// [`BundlerApi`] backed by the relay HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBundler {
    api: ApiClient,
}

impl HttpBundler {
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BundlerApi for HttpBundler {
    async fn submit(&self, signed: &SignedUserOperation) -> Result<SubmissionAck, SubmitError> {
        let request = SubmitRequest {
            operation: signed.operation(),
            user_op_hash: signed.hash(),
        };
        let response: SubmitResponse = self
            .api
            .post_json(SUBMIT_PATH, &request)
            .await
            .map_err(|e| match e.server_message() {
                Some(message) => SubmitError::rejected(message),
                None => SubmitError::Transport(e.to_string()),
            })?;

        let ack = response.into_ack()?;
        info!(
            message = "Relay accepted user operation",
            sender = %signed.sender(),
            user_op_hash = %signed.hash(),
            tx_hash = ?ack.transaction_hash,
            backend_hash = ?ack.backend_hash
        );
        Ok(ack)
    }

    async fn check_status(&self, user_op_hash: B256) -> Result<RelayStatus, SubmitError> {
        let hash = user_op_hash.to_string();
        let response: StatusResponse = self
            .api
            .get_json(CHECK_STATUS_PATH, &[("userOpHash", hash.as_str())])
            .await
            .map_err(|e: ApiError| SubmitError::Transport(e.to_string()))?;

        let status = RelayStatus::from(response);
        debug!(message = "Relay status", user_op_hash = %user_op_hash, status = ?status);
        Ok(status)
    }
}
