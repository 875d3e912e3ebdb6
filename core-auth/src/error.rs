use crate::types::AccountId;
use thiserror::Error;

/// Errors surfaced by the credential layer.
///
/// The split that matters to callers is fatal versus transient:
/// fatal errors mean the stored grant is unusable and the account needs
/// interactive re-authentication, transient errors mean the stored token
/// is still good and the operation may simply be retried later.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The stored token has no refresh token, so a new access token can
    /// never be obtained without user interaction.
    #[error("No refresh token stored for account {account_id}")]
    NoRefreshToken { account_id: AccountId },

    /// The provider rejected the refresh grant (e.g. `invalid_grant`).
    #[error("Refresh rejected for account {account_id}: {reason}")]
    RefreshRejected {
        account_id: AccountId,
        reason: String,
    },

    /// The refresh attempt failed for a reason that does not invalidate
    /// the stored credentials (network outage, endpoint 5xx, timeout).
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The secure store could not be reached (locked keychain, missing
    /// Secret Service daemon).
    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The stored token entry could not be deserialized. The corrupt
    /// entry has been deleted.
    #[error("Stored token for account {account_id} is corrupted: {reason}")]
    TokenCorrupted {
        account_id: AccountId,
        reason: String,
    },

    /// A token could not be encoded for storage.
    #[error("Token serialization failed: {0}")]
    SerializationFailed(String),
}

impl AuthError {
    /// Whether this error invalidates the stored credentials.
    ///
    /// Fatal errors require interactive re-authentication; retrying the
    /// refresh cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::NoRefreshToken { .. }
                | AuthError::RefreshRejected { .. }
                | AuthError::TokenCorrupted { .. }
        )
    }

    /// Whether the stored credentials are still usable and the operation
    /// may be retried later.
    pub fn is_transient(&self) -> bool {
        !self.is_fatal()
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let account_id = AccountId::new();

        assert!(AuthError::NoRefreshToken { account_id }.is_fatal());
        assert!(AuthError::RefreshRejected {
            account_id,
            reason: "invalid_grant".to_string()
        }
        .is_fatal());
        assert!(AuthError::TokenCorrupted {
            account_id,
            reason: "bad json".to_string()
        }
        .is_fatal());

        assert!(AuthError::RefreshFailed("connection lost".to_string()).is_transient());
        assert!(AuthError::StorageUnavailable("keychain locked".to_string()).is_transient());
    }
}
