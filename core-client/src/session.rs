//! Account and mailbox sessions.
//!
//! An [`AccountSession`] wires one account's credential plumbing together:
//! token store, refresh coordinator, retrier and authenticated client, all
//! built from the host's [`CoreConfig`]. Mailbox sessions hang off it,
//! created lazily on first use; each owns the call queue that keeps its
//! mailbox's protocol traffic strictly ordered.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use core_auth::{
    AccountId, RefreshCoordinator, RefreshObserver, RestTokenRefresher, TokenStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::client::AuthenticatedClient;
use crate::error::Result;
use crate::retry::{Retrier, RetryPolicy};
use crate::serializer::CallSerializer;

/// Server-side mailbox (folder) identifier, unique within an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxId(String);

impl MailboxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MailboxId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MailboxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One mailbox's serialized view of the account connection.
///
/// All calls submitted through [`perform`](Self::perform) run one at a
/// time in submission order. Calls against other mailboxes proceed in
/// parallel; only same-mailbox traffic queues.
pub struct MailboxSession {
    mailbox_id: MailboxId,
    client: Arc<AuthenticatedClient>,
    serializer: CallSerializer,
}

impl MailboxSession {
    fn new(mailbox_id: MailboxId, client: Arc<AuthenticatedClient>) -> Self {
        Self {
            mailbox_id,
            client,
            serializer: CallSerializer::new(),
        }
    }

    pub fn mailbox_id(&self) -> &MailboxId {
        &self.mailbox_id
    }

    /// The account-level client, bypassing the mailbox queue.
    ///
    /// For requests without ordering requirements (marker fetches,
    /// attachment downloads) that should not wait behind mailbox traffic.
    pub fn client(&self) -> Arc<AuthenticatedClient> {
        Arc::clone(&self.client)
    }

    /// Run an operation in this mailbox's queue.
    ///
    /// The operation receives the account's authenticated client. A failed
    /// operation fails only its own caller; queued successors still run.
    pub async fn perform<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<AuthenticatedClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        self.serializer.enqueue(move || operation(client)).await?
    }
}

/// Per-account connection state: credentials plus mailbox sessions.
///
/// Hosts create one per signed-in account and share it between views.
/// Dropping the session tears down every mailbox queue.
pub struct AccountSession {
    account_id: AccountId,
    token_store: TokenStore,
    client: Arc<AuthenticatedClient>,
    events: EventBus,
    mailboxes: Mutex<HashMap<MailboxId, Arc<MailboxSession>>>,
}

impl AccountSession {
    /// Assemble the network stack for one account from the host config.
    ///
    /// `events` receives auth lifecycle events for this account; the
    /// observer gets refresh outcomes synchronously (see
    /// [`RefreshObserver`] for its re-entrancy rules).
    pub fn new(
        account_id: AccountId,
        config: &CoreConfig,
        events: EventBus,
        observer: Arc<dyn RefreshObserver>,
    ) -> Self {
        let tuning = config.tuning;
        let request_timeout = Duration::from_secs(tuning.request_timeout_secs);

        let token_store = TokenStore::new(config.secure_store.clone());
        let refresher = Arc::new(
            RestTokenRefresher::new(config.http_client.clone(), config.token_endpoint.clone())
                .with_timeout(request_timeout),
        );
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                token_store.clone(),
                refresher,
                config.keep_alive.clone(),
                events.clone(),
                observer,
            )
            .with_refresh_timeout(Duration::from_secs(tuning.refresh_timeout_secs)),
        );
        let client = Arc::new(
            AuthenticatedClient::new(
                account_id,
                config.http_client.clone(),
                token_store.clone(),
                coordinator,
                Retrier::new(RetryPolicy::from_tuning(&tuning)),
            )
            .with_expiry_margin(ChronoDuration::seconds(tuning.token_expiry_margin_secs))
            .with_default_timeout(request_timeout),
        );

        Self {
            account_id,
            token_store,
            client,
            events,
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// The account's authenticated client for unordered requests.
    pub fn client(&self) -> Arc<AuthenticatedClient> {
        Arc::clone(&self.client)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The session for a mailbox, created on first use.
    pub async fn mailbox(&self, mailbox_id: MailboxId) -> Arc<MailboxSession> {
        let mut mailboxes = self.mailboxes.lock().await;
        mailboxes
            .entry(mailbox_id.clone())
            .or_insert_with(|| {
                debug!(mailbox_id = %mailbox_id, "Opening mailbox session");
                Arc::new(MailboxSession::new(mailbox_id, Arc::clone(&self.client)))
            })
            .clone()
    }

    /// Tear down a mailbox session. Queued calls drain, then the worker
    /// stops; a later [`mailbox`](Self::mailbox) call starts a fresh queue.
    pub async fn close_mailbox(&self, mailbox_id: &MailboxId) {
        if self.mailboxes.lock().await.remove(mailbox_id).is_some() {
            debug!(mailbox_id = %mailbox_id, "Closed mailbox session");
        }
    }

    /// Sign the account out: tear down mailboxes, forget the cached token
    /// and remove the stored credentials.
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn sign_out(&self) -> Result<()> {
        self.mailboxes.lock().await.clear();
        self.client.clear_cached_token().await;
        self.token_store.delete_token(self.account_id).await?;

        let _ = self.events.emit(AuthEvent::TokensCleared {
            account_id: self.account_id.to_string(),
        });
        info!("Account signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, HttpClient, HttpRequest, HttpResponse, NoopKeepAlive, SecureStore,
    };
    use core_auth::{NoopRefreshObserver, Token};
    use core_runtime::config::TokenEndpointConfig;
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    struct OfflineHttp;

    #[async_trait]
    impl HttpClient for OfflineHttp {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> bridge_traits::error::Result<HttpResponse> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    struct MemStore {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl SecureStore for MemStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> bridge_traits::error::Result<()> {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> bridge_traits::error::Result<Option<Vec<u8>>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> bridge_traits::error::Result<()> {
            self.entries.lock().await.remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> bridge_traits::error::Result<Vec<String>> {
            Ok(self.entries.lock().await.keys().cloned().collect())
        }
    }

    fn test_config(secure_store: Arc<MemStore>) -> CoreConfig {
        CoreConfig::builder()
            .http_client(Arc::new(OfflineHttp))
            .secure_store(secure_store)
            .keep_alive(Arc::new(NoopKeepAlive::new()))
            .token_endpoint(TokenEndpointConfig::new(
                "https://login.example.com/token",
                "mail-client",
            ))
            .build()
            .unwrap()
    }

    fn session() -> (AccountSession, Arc<MemStore>, AccountId) {
        let secure_store = Arc::new(MemStore::new());
        let config = test_config(secure_store.clone());
        let account_id = AccountId::new();
        let session = AccountSession::new(
            account_id,
            &config,
            EventBus::new(16),
            Arc::new(NoopRefreshObserver),
        );
        (session, secure_store, account_id)
    }

    #[test]
    fn test_mailbox_id_forms() {
        let id = MailboxId::new("INBOX");
        assert_eq!(id.as_str(), "INBOX");
        assert_eq!(id.to_string(), "INBOX");
        assert_eq!(MailboxId::from("INBOX"), id);
        assert_eq!(MailboxId::from("Sent".to_string()).as_str(), "Sent");
    }

    #[tokio::test]
    async fn test_mailbox_sessions_are_cached() {
        let (session, _, _) = session();

        let inbox_a = session.mailbox(MailboxId::new("INBOX")).await;
        let inbox_b = session.mailbox(MailboxId::new("INBOX")).await;
        let sent = session.mailbox(MailboxId::new("Sent")).await;

        assert!(Arc::ptr_eq(&inbox_a, &inbox_b));
        assert!(!Arc::ptr_eq(&inbox_a, &sent));
    }

    #[tokio::test]
    async fn test_close_mailbox_discards_queue() {
        let (session, _, _) = session();
        let mailbox_id = MailboxId::new("INBOX");

        let before = session.mailbox(mailbox_id.clone()).await;
        session.close_mailbox(&mailbox_id).await;
        let after = session.mailbox(mailbox_id).await;

        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_same_mailbox_calls_are_ordered() {
        let (session, _, _) = session();
        let inbox = session.mailbox(MailboxId::new("INBOX")).await;
        let order = Arc::new(StdMutex::new(Vec::new()));

        let slow = {
            let order = order.clone();
            inbox.perform(move |_client| async move {
                sleep(Duration::from_millis(20)).await;
                order.lock().unwrap().push("first");
                Ok(())
            })
        };
        let quick = {
            let order = order.clone();
            inbox.perform(move |_client| async move {
                order.lock().unwrap().push("second");
                Ok(())
            })
        };

        let (slow, quick) = tokio::join!(slow, quick);
        slow.unwrap();
        quick.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_mailboxes_do_not_block_each_other() {
        let (session, _, _) = session();
        let inbox = session.mailbox(MailboxId::new("INBOX")).await;
        let sent = session.mailbox(MailboxId::new("Sent")).await;
        let order = Arc::new(StdMutex::new(Vec::new()));

        let blocked = {
            let order = order.clone();
            inbox.perform(move |_client| async move {
                sleep(Duration::from_millis(30)).await;
                order.lock().unwrap().push("inbox");
                Ok(())
            })
        };
        let independent = {
            let order = order.clone();
            sent.perform(move |_client| async move {
                order.lock().unwrap().push("sent");
                Ok(())
            })
        };

        let (blocked, independent) = tokio::join!(blocked, independent);
        blocked.unwrap();
        independent.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["sent", "inbox"]);
    }

    #[tokio::test]
    async fn test_sign_out_clears_credentials_and_notifies() {
        let (session, _, account_id) = session();
        let token = Token::new(account_id, "access")
            .with_refresh_token("refresh")
            .with_expires_in(3600);
        session.token_store.store_token(&token).await.unwrap();
        let mut rx = session.events().subscribe();

        session.mailbox(MailboxId::new("INBOX")).await;
        session.sign_out().await.unwrap();

        assert!(session
            .token_store
            .retrieve_token(account_id)
            .await
            .unwrap()
            .is_none());
        assert!(session.mailboxes.lock().await.is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            AuthEvent::TokensCleared { .. }
        ));

        // With credentials gone, requests fail before touching the wire.
        let err = session.client().execute(HttpRequest::new(
            bridge_traits::HttpMethod::Get,
            "https://mail.example.com/sync",
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }
}
