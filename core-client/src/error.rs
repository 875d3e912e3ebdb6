use bridge_traits::BridgeError;
use bytes::Bytes;
use core_auth::AuthError;
use thiserror::Error;

/// Errors surfaced by authenticated request execution.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No credentials are stored for the account; the host must run an
    /// interactive sign-in first.
    #[error("No credentials stored for this account")]
    NotAuthenticated,

    /// The server rejected the request as unauthorized even after a
    /// successful token refresh. The credentials are not trusted by this
    /// endpoint.
    #[error("Request unauthorized after token refresh")]
    AuthenticationFailed,

    /// Token acquisition or refresh failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request kept failing at the transport level after exhausting
    /// retries, or failed in a way that is not retryable.
    #[error("Transport failure: {0}")]
    Transport(#[source] BridgeError),

    /// The server answered with a non-success status. The body is kept
    /// for protocol-specific error parsing upstream.
    #[error("API error: HTTP {status}")]
    Api { status: u16, body: Bytes },

    /// The response body could not be decoded as the expected type.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The mailbox call queue was torn down while the call waited.
    #[error("Call queue closed")]
    QueueClosed,
}

impl ClientError {
    /// Whether this failure means the account needs interactive
    /// re-authentication rather than a retry.
    pub fn requires_reauth(&self) -> bool {
        match self {
            ClientError::NotAuthenticated | ClientError::AuthenticationFailed => true,
            ClientError::Auth(auth) => auth.is_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
