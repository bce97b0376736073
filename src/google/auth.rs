//! OAuth access tokens minted from a long-lived refresh token.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;

use super::error::GoogleError;
use super::parse;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Refresh this long before the advertised expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_SLACK < self.expires_at
    }
}

/// Shared by the photo and calendar clients.
pub struct GoogleAuth {
    http: Client,
    credentials: GoogleCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("GoogleAuth")
            .field("credentials", &self.credentials)
            .field("token", &cached.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GoogleAuth {
    pub fn new(http: Client, credentials: GoogleCredentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, refreshing when the cached one is missing or stale.
    pub async fn access_token(&self) -> Result<String, GoogleError> {
        if let Some(token) = self.cached_token(Instant::now()) {
            return Ok(token);
        }
        tracing::debug!("Refreshing Google access token");
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let body: TokenResponse = parse(TOKEN_URL, response).await?;
        if let Some(error) = body.error {
            return Err(GoogleError::Auth(error));
        }
        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GoogleError::missing(TOKEN_URL, "no access token in response"))?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        self.store(value.clone(), Instant::now() + lifetime);
        Ok(value)
    }

    /// Drop the cached token so the next call refreshes.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn cached_token(&self, now: Instant) -> Option<String> {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.value.clone())
    }

    fn store(&self, value: String, expires_at: Instant) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(CachedToken { value, expires_at });
    }
}
