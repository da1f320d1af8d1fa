//! Bounded get-or-create of session keys with a per-account cache.
use ballot_core::{AccountRef, Clock, KeyError, SessionKeyCredential};
use ballot_relay_client::SessionKeyService;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Fetch attempts before giving up; one `create-session` runs between each.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 2;

/// Per-account slot holding the cached credential. Its lock is held for the
/// whole get-or-create of that account.
type KeySlot = Arc<Mutex<Option<SessionKeyCredential>>>;

/// Hands out valid session keys, fetching or creating them on demand.
pub struct SessionKeyProvisioner {
    service: Arc<dyn SessionKeyService>,
    clock: Arc<dyn Clock>,
    slots: StdMutex<HashMap<AccountRef, KeySlot>>,
    max_fetch_attempts: u32,
}

impl fmt::Debug for SessionKeyProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyProvisioner")
            .field("clock", &self.clock)
            .field("max_fetch_attempts", &self.max_fetch_attempts)
            .finish_non_exhaustive()
    }
}

impl SessionKeyProvisioner {
    /// Provisioner with an empty cache and [`DEFAULT_MAX_FETCH_ATTEMPTS`].
    pub fn new(service: Arc<dyn SessionKeyService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            clock,
            slots: StdMutex::new(HashMap::new()),
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
        }
    }

    /// Override the fetch budget; at least one fetch is always made.
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts.max(1);
        self
    }

    fn slot(&self, account: AccountRef) -> KeySlot {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account)
            .or_default()
            .clone()
    }

    /// Cached credential if still valid, otherwise fetch, creating a session
    /// between failed fetches. Concurrent callers for the same account wait
    /// for the one in progress; other accounts are not blocked.
    pub async fn ensure_session_key(
        &self,
        account: AccountRef,
    ) -> Result<SessionKeyCredential, KeyError> {
        let slot = self.slot(account);
        let mut cached = slot.lock().await;

        if let Some(credential) = cached.as_ref() {
            if !credential.is_expired_at(self.clock.now_ms()) {
                debug!(message = "Using cached session key", account = %account);
                return Ok(credential.clone());
            }
            info!(
                message = "Cached session key expired",
                account = %account,
                expires_at = credential.expires_at
            );
            *cached = None;
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_fetch_attempts {
            match self.service.get_session_key(account).await {
                Ok(credential) if !credential.is_expired_at(self.clock.now_ms()) => {
                    *cached = Some(credential.clone());
                    return Ok(credential);
                }
                Ok(credential) => {
                    last_error = format!("session key expired at {}", credential.expires_at);
                }
                Err(e) => last_error = e.to_string(),
            }

            warn!(
                message = "Session key fetch failed",
                account = %account,
                attempt,
                error = %last_error
            );
            if attempt == self.max_fetch_attempts {
                break;
            }
            self.service.create_session(account).await?;
        }

        Err(KeyError::Exhausted {
            attempts: self.max_fetch_attempts,
            last: last_error,
        })
    }

    /// Drop the cached credential of `account`.
    pub async fn invalidate(&self, account: AccountRef) {
        *self.slot(account).lock().await = None;
    }
}
