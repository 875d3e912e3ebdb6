//! # Authentication Module
//!
//! Account credential management: secure token storage and coordinated
//! OAuth 2.0 refresh.
//!
//! ## Overview
//!
//! Every authenticated request in the mail engine draws its bearer token
//! from this module. Tokens live in the platform secure store
//! ([`TokenStore`]); when one expires, the [`RefreshCoordinator`] performs
//! a single-flight refresh per account so concurrent mailbox connections
//! never race each other to the token endpoint.
//!
//! Interactive sign-in (authorization code flows, consent UI) is the host
//! application's job; this module takes over once a refresh token exists.
//!
//! ## Features
//!
//! - Typed token persistence with corruption recovery
//! - Per-account single-flight refresh with freshness short-circuit
//! - Fatal/transient failure classification (`invalid_grant` versus outage)
//! - Refresh lifecycle events and observer callbacks

pub mod endpoint;
pub mod error;
pub mod refresh;
pub mod token_store;
pub mod types;

pub use endpoint::{RefreshApiError, RestTokenRefresher, TokenRefresher};
pub use error::{AuthError, Result};
pub use refresh::{NoopRefreshObserver, RefreshCoordinator, RefreshObserver};
pub use token_store::TokenStore;
pub use types::{AccountId, Token};
