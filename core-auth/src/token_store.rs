//! Persistent token storage on top of the platform secure store.
//!
//! Tokens are serialized to JSON and written under one key per account, so
//! a write replaces the whole token set atomically. The secure store is the
//! cross-process source of truth: the mail engine, the composer window and
//! background sync all read the same entries.

use std::sync::Arc;

use bridge_traits::SecureStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::{AccountId, Token};

const STORAGE_KEY_PREFIX: &str = "oauth_token:";

/// On-disk form of a token set.
///
/// The account id is the storage key, not part of the value, so renaming
/// the serde fields here is a breaking change for existing installs.
#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn from_token(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at,
        }
    }

    fn into_token(self, account_id: AccountId) -> Token {
        Token {
            account_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
        }
    }
}

/// Token persistence for all configured accounts.
///
/// Thin typed layer over [`SecureStore`]: serialization, key naming and
/// corruption recovery live here, the actual encryption is the platform
/// bridge's job.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    fn storage_key(account_id: AccountId) -> String {
        format!("{}{}", STORAGE_KEY_PREFIX, account_id)
    }

    /// Persist the token set for its account, replacing any previous one.
    #[instrument(skip(self, token), fields(account_id = %token.account_id))]
    pub async fn store_token(&self, token: &Token) -> Result<()> {
        let stored = StoredToken::from_token(token);
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| AuthError::SerializationFailed(e.to_string()))?;

        self.secure_store
            .set_secret(&Self::storage_key(token.account_id), &bytes)
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        debug!("Stored token");
        Ok(())
    }

    /// Load the token set for an account.
    ///
    /// Returns `Ok(None)` when no token is stored. A stored entry that no
    /// longer deserializes is deleted and reported as
    /// [`AuthError::TokenCorrupted`], so the account falls back to
    /// interactive sign-in instead of failing on every start.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn retrieve_token(&self, account_id: AccountId) -> Result<Option<Token>> {
        let key = Self::storage_key(account_id);
        let bytes = self
            .secure_store
            .get_secret(&key)
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        let Some(bytes) = bytes else {
            debug!("No token stored");
            return Ok(None);
        };

        match serde_json::from_slice::<StoredToken>(&bytes) {
            Ok(stored) => Ok(Some(stored.into_token(account_id))),
            Err(e) => {
                warn!(error = %e, "Stored token is corrupted, deleting entry");
                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token entry");
                }
                Err(AuthError::TokenCorrupted {
                    account_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Remove the token set for an account. Removing a missing entry is
    /// not an error.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn delete_token(&self, account_id: AccountId) -> Result<()> {
        self.secure_store
            .delete_secret(&Self::storage_key(account_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        debug!("Deleted token");
        Ok(())
    }

    /// Whether a token set is stored for the account.
    pub async fn has_token(&self, account_id: AccountId) -> Result<bool> {
        self.secure_store
            .has_secret(&Self::storage_key(account_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))
    }

    /// Accounts that currently have a stored token set.
    ///
    /// Keys under our prefix that do not parse as account ids are skipped;
    /// they may belong to a newer install sharing the store.
    pub async fn list_accounts(&self) -> Result<Vec<AccountId>> {
        let keys = self
            .secure_store
            .list_keys()
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(STORAGE_KEY_PREFIX))
            .filter_map(|id| match AccountId::from_string(id) {
                Ok(account_id) => Some(account_id),
                Err(_) => {
                    warn!(key = %id, "Skipping unparsable token storage key");
                    None
                }
            })
            .collect())
    }

    /// Whether the underlying secure store can currently serve requests.
    ///
    /// Checked before any operation that must persist its result, so a
    /// locked keychain fails fast instead of after a network round trip.
    pub async fn is_accessible(&self) -> bool {
        self.secure_store.is_accessible().await
    }
}
