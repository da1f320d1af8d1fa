//! Client of the identity backend issuing session keys.
use crate::http::{ApiClient, ApiError};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use ballot_core::{AccountRef, KeyError, SessionKeyCredential, SigningMaterial};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

pub const GET_SESSION_KEY_PATH: &str = "get-session-key";
pub const CREATE_SESSION_PATH: &str = "create-session";

/// Issues and hands out session keys for console accounts.
#[async_trait]
pub trait SessionKeyService: Send + Sync {
    /// Fetch the current credential of `account`.
    async fn get_session_key(&self, account: AccountRef) -> Result<SessionKeyCredential, KeyError>;

    /// Ask the backend to issue a new credential for `account`.
    async fn create_session(&self, account: AccountRef) -> Result<(), KeyError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetSessionKeyResponse {
    success: bool,
    #[serde(default)]
    session_key: Option<String>,
    #[serde(default)]
    expires_at: Option<u64>,
    #[serde(default)]
    scw_address: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

impl GetSessionKeyResponse {
    fn into_credential(self) -> Result<SessionKeyCredential, KeyError> {
        if !self.success {
            return Err(KeyError::Refused(
                self.message
                    .unwrap_or_else(|| "no session key available".to_string()),
            ));
        }

        let secret = self
            .session_key
            .as_deref()
            .and_then(|key| B256::from_str(key.trim()).ok())
            .ok_or(KeyError::Invalid {
                field: "sessionKey",
            })?;
        let scw_address = self
            .scw_address
            .as_deref()
            .and_then(|address| Address::from_str(address.trim()).ok())
            .ok_or(KeyError::Invalid {
                field: "scwAddress",
            })?;
        let expires_at = self.expires_at.ok_or(KeyError::Invalid {
            field: "expiresAt",
        })?;

        Ok(SessionKeyCredential {
            signing_material: SigningMaterial::new(secret),
            scw_address,
            expires_at,
        })
    }
}

fn key_error(err: ApiError) -> KeyError {
    match err.server_message() {
        Some(message) => KeyError::Refused(message),
        None => KeyError::Transport(err.to_string()),
    }
}

/// [`SessionKeyService`] backed by the backend HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSessionKeyService {
    api: ApiClient,
}

impl HttpSessionKeyService {
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SessionKeyService for HttpSessionKeyService {
    async fn get_session_key(&self, account: AccountRef) -> Result<SessionKeyCredential, KeyError> {
        let response: GetSessionKeyResponse = self
            .api
            .post_json(GET_SESSION_KEY_PATH, &account)
            .await
            .map_err(key_error)?;
        let credential = response.into_credential()?;
        debug!(
            message = "Fetched session key",
            account = %account,
            scw = %credential.scw_address,
            expires_at = credential.expires_at
        );
        Ok(credential)
    }

    async fn create_session(&self, account: AccountRef) -> Result<(), KeyError> {
        let response: CreateSessionResponse = self
            .api
            .post_json(CREATE_SESSION_PATH, &account)
            .await
            .map_err(|e| KeyError::Create(e.server_message().unwrap_or_else(|| e.to_string())))?;
        if !response.success {
            return Err(KeyError::Create(
                response
                    .message
                    .unwrap_or_else(|| "session creation refused".to_string()),
            ));
        }
        info!(message = "Created session", account = %account);
        Ok(())
    }
}
