//! Session token for the vocabulary backend and the `Authorization` header
//! derived from it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tolk_proxy::ProxyChannel;
use tolk_storage::{CellOptions, PersistedCell, StorageAdapter};
use tolk_translator::{TranslateError, request};
use tolk_types::{ProxyRequestInit, ProxyRequestPayload};

const UNAUTHORIZED: u16 = 401;

/// Storage key of the session token
pub const TOKEN_KEY: &str = "token";

/// Supplies the `Authorization` header for authenticated vendors
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Header value, `None` while nobody is logged in
    async fn authorization(&self) -> Option<String>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
}

/// New account on the vocabulary backend. The phone number doubles as the
/// login name afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub phone: String,
    pub name: String,
}

/// Token-based auth backed by a persisted cell (null when logged out)
#[derive(Clone)]
pub struct TokenAuth {
    token: PersistedCell<String>,
}

impl TokenAuth {
    pub fn new(storage: Arc<dyn StorageAdapter<String>>) -> Self {
        Self {
            token: PersistedCell::new(TOKEN_KEY, storage, CellOptions::new(None::<String>)),
        }
    }

    pub fn token(&self) -> &PersistedCell<String> {
        &self.token
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.get().is_some()
    }

    /// Exchange credentials for a session token and keep it
    pub async fn login(
        &self,
        channel: &dyn ProxyChannel,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), TranslateError> {
        let body = serde_json::to_string(&LoginRequest { username, password })
            .map_err(|e| TranslateError::Decode(e.to_string()))?;
        let url = format!("{}/auth/login/", base_url.trim_end_matches('/'));
        let init = ProxyRequestInit::post(body).header("Content-Type", "application/json");
        let payload = ProxyRequestPayload::new(url).with_init(init);

        let LoginResponse { key } = request(channel, payload).await?;

        self.token.when_ready().await;
        self.token.set(key);
        tracing::info!(user = %username, "logged in");
        Ok(())
    }

    /// Create an account, then log in with its phone number
    pub async fn register(
        &self,
        channel: &dyn ProxyChannel,
        base_url: &str,
        registration: &Registration,
    ) -> Result<(), TranslateError> {
        let body = serde_json::to_string(registration)
            .map_err(|e| TranslateError::Decode(e.to_string()))?;
        let url = format!("{}/accounts/register/", base_url.trim_end_matches('/'));
        let init = ProxyRequestInit::post(body).header("Content-Type", "application/json");

        let _: Value = request(channel, ProxyRequestPayload::new(url).with_init(init)).await?;
        tracing::info!(phone = %registration.phone, "registered");

        self.login(channel, base_url, &registration.phone, &registration.password)
            .await
    }

    /// Fetch the profile of the logged-in user. A rejected token is dropped.
    pub async fn profile(
        &self,
        channel: &dyn ProxyChannel,
        base_url: &str,
    ) -> Result<Value, TranslateError> {
        let Some(authorization) = self.authorization().await else {
            return Err(TranslateError::AuthenticationError);
        };

        let url = format!("{}/accounts/profile/", base_url.trim_end_matches('/'));
        let init = ProxyRequestInit::default().header("Authorization", authorization);

        match request(channel, ProxyRequestPayload::new(url).with_init(init)).await {
            Err(e) if e.status_code() == UNAUTHORIZED => {
                tracing::warn!("[profile]: {e}");
                self.logout();
                Err(e)
            }
            result => result,
        }
    }

    pub fn logout(&self) {
        self.token.clear();
        tracing::info!("logged out");
    }
}

#[async_trait::async_trait]
impl AuthProvider for TokenAuth {
    async fn authorization(&self) -> Option<String> {
        self.token.when_ready().await;
        self.token.get().map(|key| format!("Token {key}"))
    }
}
