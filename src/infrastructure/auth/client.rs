use crate::domain::session::SessionTokenPair;
use crate::infrastructure::config::AuthProviderConfig;
use anyhow::{anyhow, Context, Result};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the hosted auth provider.
///
/// The provider owns token validation; this client only forwards tokens and
/// classifies failures so the session refresher can react to them.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthProviderConfig,
    http_client: HttpClient,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Auth provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(String),
}

impl AuthError {
    /// Whether this failure means the refresh token pair is dead and the
    /// client's auth cookies must be purged.
    pub fn is_invalid_refresh(&self) -> bool {
        matches!(self, AuthError::InvalidRefreshToken(_))
    }
}

/// User record returned by the provider's "get current user" operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Error body the provider returns on failures
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(alias = "msg", alias = "error_description", alias = "message")]
    error: Option<String>,
}

/// Successful refresh grant response
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Messages the provider uses for a dead refresh token
const INVALID_REFRESH_MARKERS: [&str; 2] = ["invalid refresh token", "refresh_token_not_found"];

impl AuthClient {
    pub fn new(config: AuthProviderConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(anyhow!("Auth provider base URL is required"));
        }
        if config.api_key.is_empty() {
            return Err(anyhow!("Auth provider API key is required"));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, http_client })
    }

    /// Fetch the user the access token belongs to.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/auth/v1/user", self.config.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            let user: AuthUser = response.json().await?;
            debug!(user_id = %user.id, "current user resolved");
            return Ok(user);
        }

        Err(Self::classify_failure(response).await)
    }

    /// Exchange a refresh token for a new session token pair.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<SessionTokenPair, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.config.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if response.status().is_success() {
            let body: RefreshResponse = response.json().await?;
            debug!("session refreshed");
            return Ok(SessionTokenPair::new(body.access_token, body.refresh_token));
        }

        Err(Self::classify_failure(response).await)
    }

    /// Revoke the session server-side.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.config.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(Self::classify_failure(response).await)
    }

    /// Delete a user through the provider's admin API. Requires the service
    /// role key.
    pub async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/admin/users/{user_id}", self.config.base_url);
        let response = self
            .http_client
            .delete(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.service_role_key)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(Self::classify_failure(response).await)
    }

    /// Turn a non-success provider response into an `AuthError`, pulling the
    /// dead-refresh-token family out of the generic provider errors.
    async fn classify_failure(response: reqwest::Response) -> AuthError {
        let status = response.status().as_u16();
        let message = match response.json::<ProviderErrorBody>().await {
            Ok(body) => body.error.unwrap_or_else(|| "Unknown error".to_string()),
            Err(_) => "Unknown error".to_string(),
        };

        let message_lower = message.to_lowercase();
        if INVALID_REFRESH_MARKERS.iter().any(|m| message_lower.contains(m)) {
            return AuthError::InvalidRefreshToken(message);
        }

        warn!(status, %message, "auth provider call failed");
        AuthError::Provider { status, message }
    }
}
