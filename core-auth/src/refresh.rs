//! Single-flight token refresh.
//!
//! Many callers discover an expired token at the same time: every mailbox
//! connection, the composer, background sync. The coordinator funnels them
//! through one critical section per account so exactly one refresh grant
//! reaches the provider, and everyone else rides on its result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{KeepAlive, KeepAliveGuard};
use core_runtime::events::{AuthEvent, EventBus};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};

use crate::endpoint::{RefreshApiError, TokenRefresher};
use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{AccountId, Token};

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

/// Receives refresh outcomes.
///
/// Callbacks run inside the account's refresh critical section. They must
/// return quickly and must not call back into the coordinator for the same
/// account, or they will deadlock on the account lock.
pub trait RefreshObserver: Send + Sync {
    /// A refreshed token set has been persisted. `old` is the set the
    /// refresh was based on, `new` the one now in the store.
    fn token_updated(&self, _old: &Token, _new: &Token) {}

    /// A refresh failed in a way retrying cannot fix; the account needs
    /// interactive re-authentication.
    fn refresh_permanently_failed(&self, _account_id: AccountId, _error: &AuthError) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default)]
pub struct NoopRefreshObserver;

impl RefreshObserver for NoopRefreshObserver {}

/// Serializes token refreshes per account.
///
/// The protocol per [`refresh`](Self::refresh) call:
///
/// 1. Fail fast when the secure store is unreachable; a refresh whose
///    result cannot be persisted would desynchronize other processes.
/// 2. Enter the account's critical section.
/// 3. Re-read the store. If a concurrent caller already stored a fresher
///    token, return it without touching the network.
/// 4. Otherwise run the remote exchange on a detached task that carries
///    the account lock: it persists the result, then notifies the
///    observer and the event bus. A caller that stops waiting abandons
///    only its wait; the exchange finishes and later callers pick the
///    result out of the store.
///
/// A host wakelock is held across the exchange so a backgrounding platform
/// does not suspend the process between the remote call and the store
/// write.
pub struct RefreshCoordinator {
    shared: Arc<Inner>,
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    refresh_timeout: Duration,
}

/// Exchange half of the coordinator, shared with detached refresh tasks.
struct Inner {
    token_store: TokenStore,
    refresher: Arc<dyn TokenRefresher>,
    keep_alive: Arc<dyn KeepAlive>,
    events: EventBus,
    observer: Arc<dyn RefreshObserver>,
}

impl RefreshCoordinator {
    pub fn new(
        token_store: TokenStore,
        refresher: Arc<dyn TokenRefresher>,
        keep_alive: Arc<dyn KeepAlive>,
        events: EventBus,
        observer: Arc<dyn RefreshObserver>,
    ) -> Self {
        Self {
            shared: Arc::new(Inner {
                token_store,
                refresher,
                keep_alive,
                events,
                observer,
            }),
            locks: Mutex::new(HashMap::new()),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Override how long the remote exchange may take before it is
    /// abandoned as a transient failure.
    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Obtain a token fresher than `current`.
    ///
    /// Returns the refreshed (or concurrently refreshed) token set. On a
    /// transient error the stored token is left untouched so the caller
    /// can retry later; on a fatal error the observer is told the account
    /// needs re-authentication.
    #[instrument(skip(self, current), fields(account_id = %current.account_id))]
    pub async fn refresh(&self, current: &Token) -> Result<Token> {
        let account_id = current.account_id;

        if !self.shared.token_store.is_accessible().await {
            warn!("Secure store inaccessible, skipping refresh");
            return Err(AuthError::StorageUnavailable(
                "secure store is locked or unavailable".to_string(),
            ));
        }

        let guard = self.account_lock(account_id).await.lock_owned().await;

        // A caller that held the lock before us may have refreshed already.
        let basis = match self.shared.token_store.retrieve_token(account_id).await {
            Ok(Some(stored)) => {
                if stored.is_fresher_than(current) {
                    debug!("Reusing token refreshed by a concurrent caller");
                    return Ok(stored);
                }
                stored
            }
            Ok(None) => current.clone(),
            // The corrupt entry is already deleted; a successful refresh
            // rewrites it.
            Err(AuthError::TokenCorrupted { .. }) => current.clone(),
            Err(e) => return Err(e),
        };

        if basis.refresh_token.is_none() {
            error!("Cannot refresh: no refresh token stored");
            let failure = AuthError::NoRefreshToken { account_id };
            self.shared.report_fatal(account_id, &failure);
            return Err(failure);
        }

        // Once the grant is on the wire the provider may rotate it, so the
        // exchange must outlive this caller; it takes the account lock
        // with it and releases it only after the store write.
        let exchange = tokio::spawn(
            Arc::clone(&self.shared)
                .run_exchange(guard, basis, self.refresh_timeout)
                .instrument(Span::current()),
        );

        match exchange.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(error = %join_error, "Refresh task failed to complete");
                let failure =
                    AuthError::RefreshFailed("refresh task failed to complete".to_string());
                self.shared.report_transient(account_id, &failure);
                Err(failure)
            }
        }
    }

    async fn account_lock(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Inner {
    /// Performs the remote exchange while holding the account's refresh
    /// lock, then persists and announces the outcome.
    ///
    /// Runs on its own task: a caller that stops waiting cannot cancel a
    /// grant exchange the provider may already have acted on.
    async fn run_exchange(
        self: Arc<Self>,
        lock: OwnedMutexGuard<()>,
        basis: Token,
        refresh_timeout: Duration,
    ) -> Result<Token> {
        let _lock = lock;
        let account_id = basis.account_id;

        info!("Access token expired or expiring soon, refreshing");
        let _ = self.events.emit(AuthEvent::TokenRefreshing {
            account_id: account_id.to_string(),
        });
        let _keep_alive = KeepAliveGuard::begin(Arc::clone(&self.keep_alive), "token-refresh");

        let refreshed = match timeout(refresh_timeout, self.refresher.refresh(&basis)).await {
            Ok(Ok(token)) => token,
            Ok(Err(api_error)) => return Err(self.classify_failure(account_id, api_error)),
            Err(_) => {
                let failure = AuthError::RefreshFailed(format!(
                    "no response from token endpoint within {:?}",
                    refresh_timeout
                ));
                warn!("Token refresh timed out");
                self.report_transient(account_id, &failure);
                return Err(failure);
            }
        };

        if let Err(store_error) = self.token_store.store_token(&refreshed).await {
            warn!(error = %store_error, "Refreshed token could not be persisted");
            self.report_transient(account_id, &store_error);
            return Err(store_error);
        }

        self.observer.token_updated(&basis, &refreshed);
        let _ = self.events.emit(AuthEvent::TokenRefreshed {
            account_id: account_id.to_string(),
            expires_at: refreshed.expires_at.map(|t| t.timestamp().max(0) as u64),
        });
        info!("Token refresh complete");
        Ok(refreshed)
    }

    fn classify_failure(&self, account_id: AccountId, api_error: RefreshApiError) -> AuthError {
        match api_error {
            RefreshApiError::InvalidGrant(reason) => {
                error!(%reason, "Refresh grant rejected, account needs re-authentication");
                let failure = AuthError::RefreshRejected { account_id, reason };
                self.report_fatal(account_id, &failure);
                failure
            }
            RefreshApiError::MissingRefreshToken => {
                let failure = AuthError::NoRefreshToken { account_id };
                self.report_fatal(account_id, &failure);
                failure
            }
            other => {
                warn!(error = %other, "Token refresh failed, stored token kept for retry");
                let failure = AuthError::RefreshFailed(other.to_string());
                self.report_transient(account_id, &failure);
                failure
            }
        }
    }

    fn report_fatal(&self, account_id: AccountId, failure: &AuthError) {
        let _ = self.events.emit(AuthEvent::RefreshFailed {
            account_id: account_id.to_string(),
            message: failure.to_string(),
            recoverable: false,
        });
        self.observer.refresh_permanently_failed(account_id, failure);
    }

    fn report_transient(&self, account_id: AccountId, failure: &AuthError) {
        let _ = self.events.emit(AuthEvent::RefreshFailed {
            account_id: account_id.to_string(),
            message: failure.to_string(),
            recoverable: true,
        });
    }
}
