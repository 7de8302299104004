//! DMS access-token lifecycle.
//!
//! Tokens are fetched lazily on first use and cached until someone calls
//! [`AuthTokenProvider::invalidate`], which the uploader does after a 401.
//! The provider holds no expiry knowledge; the server's rejection is the
//! only signal a token has died.

use crate::dms::client::{DmsApi, DmsApiError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Cached access-token source for one set of credentials.
pub struct AuthTokenProvider {
    api: Arc<dyn DmsApi>,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl AuthTokenProvider {
    pub fn new(
        api: Arc<dyn DmsApi>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AuthTokenProvider {
        AuthTokenProvider {
            api,
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        }
    }

    /// Current token, authenticating first if none is cached.
    pub async fn get(&self) -> Result<String, DmsApiError> {
        let mut token = self.token.lock().await;
        if let Some(t) = token.as_ref() {
            return Ok(t.clone());
        }

        debug!("no cached DMS token, authenticating");
        let fresh = self.api.authenticate(&self.username, &self.password).await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token so the next [`get`](Self::get) re-authenticates.
    pub async fn invalidate(&self) {
        debug!("invalidating cached DMS token");
        *self.token.lock().await = None;
    }
}
