//! Gmail OAuth2 credential lifecycle
//!
//! A [`Credential`] is a plain owned value: [`OAuthClient::ensure_fresh`]
//! consumes it and hands back either the same value or a refreshed one.
//! [`CredentialManager`] is the one canonical holder; it implements
//! [`TokenSource`] so the HTTP client always sees the latest refresh.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::storage::CredentialFile;

/// Source of a currently valid bearer token
pub trait TokenSource: Send + Sync {
    fn current_token(&self) -> Result<String>;
}

impl<T: TokenSource + ?Sized> TokenSource for std::sync::Arc<T> {
    fn current_token(&self) -> Result<String> {
        (**self).current_token()
    }
}

/// One OAuth credential. Refresh replaces `access_token` and `expires_at`.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Provider OAuth endpoints
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthEndpoints {
    /// Required scope for Gmail access (modify allows read + label changes)
    pub const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// Token response from the provider
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Assumed when the provider omits `expires_in`
    const DEFAULT_LIFETIME_SECS: i64 = 3600;

    fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expires_in.unwrap_or(Self::DEFAULT_LIFETIME_SECS))
    }
}

/// Talks to the token endpoint: code exchange and refresh
pub struct OAuthClient {
    agent: ureq::Agent,
    endpoints: OAuthEndpoints,
    refresh_margin: chrono::Duration,
}

impl OAuthClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoints: OAuthEndpoints, refresh_margin: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            endpoints,
            refresh_margin: chrono::Duration::from_std(refresh_margin)
                .unwrap_or_else(|_| chrono::Duration::minutes(1)),
        }
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// Whether `credential` is past `expires_at - margin` at `now`
    pub fn needs_refresh(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        now >= credential.expires_at - self.refresh_margin
    }

    /// Return the credential unchanged while fresh, otherwise refresh it
    pub fn ensure_fresh(&self, credential: Credential) -> Result<Credential> {
        self.ensure_fresh_at(credential, Utc::now())
    }

    pub fn ensure_fresh_at(
        &self,
        mut credential: Credential,
        now: DateTime<Utc>,
    ) -> Result<Credential> {
        if !self.needs_refresh(&credential, now) {
            return Ok(credential);
        }

        debug!("Access token expires at {}, refreshing", credential.expires_at);
        let token = self.post_token(&[
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", credential.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])?;
        let lifetime = token.lifetime();

        credential.access_token = token
            .access_token
            .ok_or_else(|| Error::Auth("refresh response missing access_token".to_string()))?;
        if let Some(refresh_token) = token.refresh_token {
            credential.refresh_token = refresh_token;
        }
        credential.expires_at = now + lifetime;

        info!("Refreshed access token, valid until {}", credential.expires_at);
        Ok(credential)
    }

    /// Exchange an authorization code for a new credential
    pub fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential> {
        let token = self.post_token(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])?;
        let lifetime = token.lifetime();

        let access_token = token
            .access_token
            .ok_or_else(|| Error::Auth("token response missing access_token".to_string()))?;
        let refresh_token = token.refresh_token.ok_or_else(|| {
            Error::Auth(
                "token response missing refresh_token (offline access not granted)".to_string(),
            )
        })?;

        Ok(Credential {
            access_token,
            refresh_token,
            expires_at: Utc::now() + lifetime,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut response = self
            .agent
            .post(&self.endpoints.token_url)
            .send_form(form.iter().copied())
            .map_err(|e| Error::from_transport("token request failed", e))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::from_transport("failed to read token response", e))?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))
    }
}

/// Canonical holder of the run's credential
///
/// Every refresh replaces the held value (and the credential file, when
/// attached), so later callers never see a stale token.
pub struct CredentialManager {
    oauth: OAuthClient,
    credential: Mutex<Credential>,
    file: Option<CredentialFile>,
}

impl CredentialManager {
    pub fn new(oauth: OAuthClient, credential: Credential) -> Self {
        Self {
            oauth,
            credential: Mutex::new(credential),
            file: None,
        }
    }

    /// Persist every refresh to `file`
    pub fn with_file(mut self, file: CredentialFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Snapshot of the current credential
    pub fn credential(&self) -> Credential {
        self.credential.lock().unwrap().clone()
    }

    /// Refresh the held credential if it is stale
    pub fn ensure_fresh(&self) -> Result<Credential> {
        let mut held = self.credential.lock().unwrap();
        let refreshed = self.oauth.ensure_fresh(held.clone())?;

        if refreshed != *held {
            // The refresh token may have rotated, so hold it even if saving fails
            *held = refreshed;
            if let Some(file) = &self.file {
                file.save(&held)?;
            }
        }

        Ok(held.clone())
    }
}

impl TokenSource for CredentialManager {
    fn current_token(&self) -> Result<String> {
        Ok(self.ensure_fresh()?.access_token)
    }
}
