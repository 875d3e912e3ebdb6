//! Secure Storage Abstraction
//!
//! Provides a platform-agnostic trait for secure credential storage. Token
//! persistence for every account flows through this trait, so implementations
//! are the process-crossing source of truth shared with extensions and
//! background hosts.

use async_trait::async_trait;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts secure storage mechanisms:
/// - macOS/iOS: Keychain
/// - Android: Keystore (hardware-backed when available)
/// - Windows: DPAPI
/// - Linux: Secret Service / libsecret
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Encrypt data at rest
/// - Use platform-provided secure storage when available
/// - Keep writes atomic per key (readers in other processes must observe
///   either the previous or the new value, never a torn one)
/// - Never log or expose sensitive data
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("oauth_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value
    ///
    /// # Arguments
    ///
    /// * `key` - Unique identifier for the secret
    /// * `value` - Secret data to store
    ///
    /// # Security
    ///
    /// - Value is encrypted before storage
    /// - Previous value is replaced atomically if it exists
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    ///
    /// # Security
    ///
    /// - Value is decrypted only when retrieved
    /// - Returned data should be handled securely and not logged
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret
    ///
    /// Deleting a key that does not exist is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all secret keys (without values)
    ///
    /// Useful for enumerating stored accounts or for migration scenarios.
    /// Implementations on platforms that cannot enumerate entries may return
    /// an empty list.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Whether the underlying store can currently serve requests
    ///
    /// Secure storage can be unavailable independently of the network: the
    /// keychain may be locked while the device is locked, or the secret
    /// service may not be running. Callers check this before work that would
    /// otherwise fail half-way through (e.g., a token refresh that could not
    /// persist its result).
    ///
    /// The default assumes an always-available store; platforms with a lock
    /// state must override.
    async fn is_accessible(&self) -> bool {
        true
    }
}
