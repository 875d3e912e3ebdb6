//! OAuth token endpoint client.
//!
//! One job: exchange a refresh token for a fresh access token. The trait
//! exists so the refresh coordinator can be driven by a scripted endpoint
//! in tests and so providers with non-standard token endpoints can plug in
//! their own exchange.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest};
use chrono::{Duration as ChronoDuration, Utc};
use core_runtime::config::TokenEndpointConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::types::Token;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How many bytes of an error response body end up in error messages.
const ERROR_BODY_LIMIT: usize = 256;

/// Outcome taxonomy for one refresh exchange.
///
/// `InvalidGrant` is the only variant that condemns the stored refresh
/// token; everything else leaves it intact.
#[derive(Error, Debug)]
pub enum RefreshApiError {
    /// The provider revoked or expired the refresh token.
    #[error("Refresh grant rejected: {0}")]
    InvalidGrant(String),

    /// The endpoint answered with a non-success status other than
    /// `invalid_grant`.
    #[error("Token endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(#[from] BridgeError),

    /// The endpoint answered 2xx but the body was not a usable token
    /// response.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// The token passed in carried no refresh token.
    #[error("Stored token has no refresh token")]
    MissingRefreshToken,
}

/// Performs the remote half of a token refresh.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `current`'s refresh token for a new token set.
    ///
    /// Implementations must not write to storage; persisting the result
    /// is the coordinator's job.
    async fn refresh(&self, current: &Token) -> Result<Token, RefreshApiError>;
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Standard `grant_type=refresh_token` exchange against a REST token
/// endpoint (RFC 6749 section 6).
pub struct RestTokenRefresher {
    http: Arc<dyn HttpClient>,
    endpoint: TokenEndpointConfig,
    timeout: Duration,
}

impl RestTokenRefresher {
    pub fn new(http: Arc<dyn HttpClient>, endpoint: TokenEndpointConfig) -> Self {
        Self {
            http,
            endpoint,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TokenRefresher for RestTokenRefresher {
    #[instrument(skip(self, current), fields(account_id = %current.account_id))]
    async fn refresh(&self, current: &Token) -> Result<Token, RefreshApiError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(RefreshApiError::MissingRefreshToken)?;

        let grant = RefreshGrant {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.endpoint.client_id,
            client_secret: self.endpoint.client_secret.as_deref(),
        };
        let encoded = serde_urlencoded::to_string(&grant)
            .map_err(|e| RefreshApiError::MalformedResponse(format!("request encoding: {e}")))?;

        let request = HttpRequest::new(HttpMethod::Post, &self.endpoint.token_url)
            .header("Accept", "application/json")
            .form(encoded)
            .timeout(self.timeout);

        let response = self.http.execute(request).await?;

        if response.is_success() {
            let parsed: TokenResponse = response
                .json()
                .map_err(|e| RefreshApiError::MalformedResponse(e.to_string()))?;
            if parsed.access_token.is_empty() {
                return Err(RefreshApiError::MalformedResponse(
                    "empty access_token".to_string(),
                ));
            }

            debug!(
                rotated_refresh_token = parsed.refresh_token.is_some(),
                "Token endpoint accepted refresh grant"
            );

            let mut token = Token::new(current.account_id, parsed.access_token);
            // Providers that do not rotate refresh tokens omit the field;
            // the old one stays valid and must be carried forward.
            token.refresh_token = parsed.refresh_token.or_else(|| current.refresh_token.clone());
            token.expires_at = parsed
                .expires_in
                .map(|seconds| {
                    ChronoDuration::try_seconds(seconds)
                        .and_then(|delta| Utc::now().checked_add_signed(delta))
                        .ok_or_else(|| {
                            RefreshApiError::MalformedResponse(format!(
                                "expires_in out of range: {seconds}"
                            ))
                        })
                })
                .transpose()?;
            return Ok(token);
        }

        let status = response.status;
        if response.is_client_error() {
            if let Ok(body) = response.json::<OAuthErrorBody>() {
                let message = body.error_description.unwrap_or_else(|| body.error.clone());
                if body.error == "invalid_grant" {
                    return Err(RefreshApiError::InvalidGrant(message));
                }
                return Err(RefreshApiError::Endpoint { status, message });
            }
        }

        Err(RefreshApiError::Endpoint {
            status,
            message: error_body_excerpt(&response.body),
        })
    }
}

fn error_body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let mut end = ERROR_BODY_LIMIT;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
