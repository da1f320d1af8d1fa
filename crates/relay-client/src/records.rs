//! Off-chain persistence of confirmed election sessions.
use crate::http::{ApiClient, ApiError};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Endpoint the session record is posted to.
pub const SESSION_RECORD_PATH: &str = "election-sessions";

/// Body written after an election session was created on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub election_id: String,
    pub duration: String,
    pub max_voters: String,
    pub scw_address: String,
    pub contract_address: String,
    /// Hash the relay was polled with.
    pub user_op_hash: String,
    pub transaction_hash: Option<String>,
    #[serde(rename = "TaiKhoanID")]
    pub account_id: i64,
}

/// Persists confirmed sessions off chain.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// Write `record`, retrying transient failures.
    async fn write_session(&self, record: &SessionRecord) -> Result<(), ApiError>;
}

/// Retry policy of the record write.
#[derive(Debug, Clone, Copy)]
pub struct RecordRetry {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first attempt.
    pub max_times: usize,
}

impl Default for RecordRetry {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_times: 3,
        }
    }
}

/// [`RecordApi`] over the backend HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRecordApi {
    api: ApiClient,
    path: String,
    retry: RecordRetry,
}

impl HttpRecordApi {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            path: SESSION_RECORD_PATH.to_string(),
            retry: RecordRetry::default(),
        }
    }

    /// Post to `path` instead of [`SESSION_RECORD_PATH`].
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_retry(mut self, retry: RecordRetry) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl RecordApi for HttpRecordApi {
    async fn write_session(&self, record: &SessionRecord) -> Result<(), ApiError> {
        let write = || async { self.api.post(&self.path, record).await };

        write
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(self.retry.min_delay)
                    .with_max_delay(self.retry.max_delay)
                    .with_max_times(self.retry.max_times),
            )
            .notify(|err: &ApiError, dur: Duration| {
                warn!(message = "Retrying session record write", error = %err, after = ?dur);
            })
            .await?;

        info!(
            message = "Session record written",
            user_op_hash = %record.user_op_hash,
            path = %self.path
        );
        Ok(())
    }
}
