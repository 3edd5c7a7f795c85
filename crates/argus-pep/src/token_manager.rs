//! Bearer tokens for PDP calls.
//!
//! The PDP requires a service access token. [`ApiKeyTokenManager`] exchanges
//! the configured API key for one at the IAM token endpoint, caches it and
//! refreshes it once most of its lifetime has passed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{PepError, PepResult};
use crate::transport::{HttpDoer, HttpRequest};

/// Grant type for exchanging an API key.
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Portion of a token's lifetime after which it is refreshed.
const REFRESH_FRACTION: f64 = 0.8;

/// Source of bearer tokens for PDP calls.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    /// Return a valid access token.
    async fn token(&self) -> PepResult<String>;
}

/// A provider returning a fixed token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> PepResult<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expiration: Option<i64>,
}

impl TokenResponse {
    /// Token lifetime, from `expires_in` or else from the absolute
    /// `expiration` timestamp.
    fn lifetime(&self) -> Option<Duration> {
        let secs = self.expires_in.or_else(|| {
            self.expiration
                .map(|exp| exp - chrono::Utc::now().timestamp())
        })?;
        u64::try_from(secs).ok().filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
    expires_at: Instant,
}

/// Exchanges an API key for access tokens and caches them.
pub struct ApiKeyTokenManager {
    doer: Arc<dyn HttpDoer>,
    endpoint: String,
    api_key: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    cached: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl fmt::Debug for ApiKeyTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyTokenManager")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ApiKeyTokenManager {
    /// Create a manager using the token endpoint URL.
    pub fn new(doer: Arc<dyn HttpDoer>, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            doer,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client_id: None,
            client_secret: None,
            scope: None,
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Authenticate the token call with a client id and secret.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Request a scope for the token.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    fn current(&self, now: Instant) -> Option<String> {
        self.cached
            .read()
            .as_ref()
            .filter(|t| now < t.refresh_at)
            .map(|t| t.access_token.clone())
    }

    fn form_body(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", APIKEY_GRANT_TYPE);
        form.append_pair("apikey", &self.api_key);
        if let Some(scope) = &self.scope {
            form.append_pair("scope", scope);
        }
        form.finish()
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> PepResult<CachedToken> {
        let mut request = HttpRequest::post(&self.endpoint)
            .with_header("Content-Type", "application/x-www-form-urlencoded")?
            .with_header("Accept", "application/json")?;
        if let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) {
            let credentials = STANDARD.encode(format!("{id}:{secret}"));
            request = request.with_header("Authorization", &format!("Basic {credentials}"))?;
        }
        let request = request.with_body(self.form_body());

        let response = self
            .doer
            .execute(request)
            .await
            .map_err(|e| PepError::TokenAcquisition(e.to_string()))?;
        if !response.is_success() {
            return Err(PepError::TokenAcquisition(format!(
                "token endpoint returned {}: {}",
                response.status,
                response.body_string()
            )));
        }

        let body: TokenResponse = response
            .body_json()
            .map_err(|e| PepError::TokenAcquisition(e.to_string()))?;
        let lifetime = body.lifetime().ok_or_else(|| {
            PepError::TokenAcquisition("token response carries no usable expiry".to_string())
        })?;

        let now = Instant::now();
        info!(lifetime_secs = lifetime.as_secs(), "access token refreshed");
        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at: now + lifetime.mul_f64(REFRESH_FRACTION),
            expires_at: now + lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for ApiKeyTokenManager {
    async fn token(&self) -> PepResult<String> {
        if let Some(token) = self.current(Instant::now()) {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        // A concurrent caller may have refreshed while we waited.
        let now = Instant::now();
        if let Some(token) = self.current(now) {
            return Ok(token);
        }

        match self.fetch().await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                *self.cached.write() = Some(fresh);
                Ok(token)
            }
            Err(err) => {
                let still_valid = self
                    .cached
                    .read()
                    .as_ref()
                    .filter(|t| now < t.expires_at)
                    .map(|t| t.access_token.clone());
                match still_valid {
                    Some(token) => {
                        warn!(error = %err, "token refresh failed, using current token until it expires");
                        Ok(token)
                    }
                    None => {
                        debug!(error = %err, "token acquisition failed");
                        Err(err)
                    }
                }
            }
        }
    }
}
