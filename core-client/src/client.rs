//! Authenticated request execution.
//!
//! Every API call against a mail provider flows through
//! [`AuthenticatedClient`]: it attaches the account's bearer token,
//! refreshes it through the coordinator when the server says 401, and
//! retries transport failures within the configured budget. Answered
//! requests are never retried here; a 5xx is a business outcome for the
//! protocol layer to interpret.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use chrono::Duration as ChronoDuration;
use core_auth::{AccountId, RefreshCoordinator, Token, TokenStore};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, Result};
use crate::retry::{Retrier, RetryDecision};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens expiring within this window are refreshed before use.
const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 300;

/// HTTP client bound to one account's credentials.
///
/// The current token is cached in memory; the secure store is consulted
/// only on cache misses and the coordinator only when the cached token is
/// stale or the server rejects it. A 401 triggers exactly one refresh per
/// request; a second 401 with the refreshed token is reported as
/// [`ClientError::AuthenticationFailed`] instead of looping.
pub struct AuthenticatedClient {
    account_id: AccountId,
    http: Arc<dyn HttpClient>,
    token_store: TokenStore,
    coordinator: Arc<RefreshCoordinator>,
    retrier: Retrier,
    cached_token: RwLock<Option<Token>>,
    expiry_margin: ChronoDuration,
    default_timeout: Duration,
}

impl AuthenticatedClient {
    pub fn new(
        account_id: AccountId,
        http: Arc<dyn HttpClient>,
        token_store: TokenStore,
        coordinator: Arc<RefreshCoordinator>,
        retrier: Retrier,
    ) -> Self {
        Self {
            account_id,
            http,
            token_store,
            coordinator,
            retrier,
            cached_token: RwLock::new(None),
            expiry_margin: ChronoDuration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the proactive refresh window.
    pub fn with_expiry_margin(mut self, margin: ChronoDuration) -> Self {
        self.expiry_margin = margin;
        self
    }

    /// Override the timeout applied to requests that set none themselves.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Execute a request with the account's bearer token attached.
    ///
    /// Any `Authorization` header already on the request is replaced.
    #[instrument(skip(self, request), fields(account_id = %self.account_id, url = %request.url))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let retry_key = request.url.clone();
        let result = self.execute_inner(request).await;
        self.retrier.finish(&retry_key).await;
        result
    }

    /// Execute a request and decode the response body as JSON.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.execute(request).await?;
        response.json().map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn execute_inner(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut refreshed_once = false;

        loop {
            let token = self.valid_token().await?;
            let mut attempt = request.clone().bearer_token(token.access_token.as_str());
            if attempt.timeout.is_none() {
                attempt = attempt.timeout(self.default_timeout);
            }

            match self.http.execute(attempt).await {
                Ok(response) if response.is_unauthorized() => {
                    if refreshed_once {
                        warn!("Server rejected freshly refreshed token");
                        self.clear_cached_token().await;
                        return Err(ClientError::AuthenticationFailed);
                    }
                    refreshed_once = true;
                    debug!("Request unauthorized, refreshing access token");
                    let refreshed = self.coordinator.refresh(&token).await?;
                    self.cache_token(refreshed).await;
                }
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    debug!(status = response.status, "Request answered with error status");
                    return Err(ClientError::Api {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(transport) => {
                    match self.retrier.should_retry(&request.url, &transport).await {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                error = %transport,
                                delay_ms = delay.as_millis() as u64,
                                "Transport error, retrying"
                            );
                            sleep(delay).await;
                        }
                        RetryDecision::GiveUp => {
                            warn!(error = %transport, "Transport error, giving up");
                            return Err(ClientError::Transport(transport));
                        }
                    }
                }
            }
        }
    }

    /// A token usable for the next request, refreshing if needed.
    async fn valid_token(&self) -> Result<Token> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired_within(self.expiry_margin) {
                    return Ok(token.clone());
                }
            }
        }

        let stored = self.token_store.retrieve_token(self.account_id).await?;
        let Some(stored) = stored else {
            return Err(ClientError::NotAuthenticated);
        };

        if !stored.is_expired_within(self.expiry_margin) {
            self.cache_token(stored.clone()).await;
            return Ok(stored);
        }

        let refreshed = self.coordinator.refresh(&stored).await?;
        self.cache_token(refreshed.clone()).await;
        Ok(refreshed)
    }

    async fn cache_token(&self, token: Token) {
        *self.cached_token.write().await = Some(token);
    }

    /// Drop the in-memory token so the next request re-reads the store.
    pub async fn clear_cached_token(&self) {
        *self.cached_token.write().await = None;
    }
}
