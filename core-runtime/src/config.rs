//! # Core Configuration Module
//!
//! Provides configuration management for the Mail Client Core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core library.
//! It enforces fail-fast validation to ensure all required bridges are provided
//! before initialization.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Required for all network operations
//! - `SecureStore` - Required for credential persistence
//!
//! ## Optional Dependencies (with built-in defaults)
//!
//! - `KeepAlive` - Suspension assertions (default: no-op, correct for desktop)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `SecureStore` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ### Basic Configuration with Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TokenEndpointConfig};
//!
//! let config = CoreConfig::builder()
//!     .token_endpoint(TokenEndpointConfig::new(
//!         "https://login.example.com/token",
//!         "mail-client-desktop",
//!     ))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Configuration with Custom Bridges
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TokenEndpointConfig};
//! use std::sync::Arc;
//!
//! // Note: Requires implementing HttpClient, SecureStore
//! let config = CoreConfig::builder()
//!     .token_endpoint(TokenEndpointConfig::new(
//!         "https://login.example.com/token",
//!         "mail-client-ios",
//!     ))
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .keep_alive(Arc::new(MyKeepAlive))
//!     .max_retries(5)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing.

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, KeepAlive, NoopKeepAlive, SecureStore};
use std::sync::Arc;
use url::Url;

/// Core configuration for the Mail Client Core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for making API requests (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Secure credential storage (required)
    pub secure_store: Arc<dyn SecureStore>,

    /// Suspension keep-alive provider (defaults to no-op)
    pub keep_alive: Arc<dyn KeepAlive>,

    /// OAuth token endpoint used for refresh grants
    pub token_endpoint: TokenEndpointConfig,

    /// Retry and timeout tuning
    pub tuning: NetworkTuning,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("keep_alive", &"KeepAlive { ... }")
            .field("token_endpoint", &self.token_endpoint)
            .field("tuning", &self.tuning)
            .finish()
    }
}

/// Configuration for the OAuth token endpoint.
///
/// The token endpoint is the provider URL where refresh grants are exchanged
/// for fresh access tokens.
///
/// # Security Note
///
/// Client secrets should never be hardcoded in the binary. They should be:
/// - Loaded from environment variables
/// - Stored in secure configuration files
/// - Injected via the host platform's secure configuration system
///
/// # Example
///
/// ```no_run
/// use core_runtime::config::TokenEndpointConfig;
///
/// let config = TokenEndpointConfig::new(
///     "https://login.example.com/oauth2/v2.0/token",
///     "mail-client-desktop",
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TokenEndpointConfig {
    /// Token endpoint URL where refresh grants are sent
    pub token_url: String,

    /// OAuth client identifier registered with the provider
    pub client_id: String,

    /// OAuth client secret, if the provider issued a confidential client.
    /// Public clients (most native apps) leave this unset.
    pub client_secret: Option<String>,
}

impl TokenEndpointConfig {
    /// Creates a new endpoint configuration for a public client.
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    /// Sets the client secret for confidential clients.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.token_url).map_err(|e| {
            Error::Config(format!(
                "Invalid token endpoint URL '{}': {}",
                self.token_url, e
            ))
        })?;

        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(Error::Config(format!(
                "Token endpoint URL must use http(s), got '{}'",
                parsed.scheme()
            )));
        }

        if self.client_id.is_empty() {
            return Err(Error::Config("OAuth client id cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Checks if a client secret is configured.
    pub fn has_client_secret(&self) -> bool {
        self.client_secret.is_some()
    }
}

impl std::fmt::Debug for TokenEndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEndpointConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Retry and timeout tuning for the network layer.
///
/// The defaults are production values; tests shrink them to keep runs fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkTuning {
    /// Maximum number of retries after the initial attempt of a request.
    /// A value of 3 means a request is attempted at most 4 times.
    pub max_retries: u32,

    /// Delay between retry attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Default per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Upper bound on a whole token refresh operation in seconds
    pub refresh_timeout_secs: u64,

    /// Tokens expiring within this margin are refreshed proactively (seconds)
    pub token_expiry_margin_secs: i64,
}

impl Default for NetworkTuning {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            request_timeout_secs: 30,
            refresh_timeout_secs: 120,
            token_expiry_margin_secs: 300,
        }
    }
}

impl NetworkTuning {
    /// Validates the tuning values.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > 10 {
            return Err(Error::Config(
                "Max retries exceeds maximum of 10".to_string(),
            ));
        }

        if self.retry_delay_ms == 0 {
            return Err(Error::Config(
                "Retry delay must be greater than 0ms".to_string(),
            ));
        }

        if self.retry_delay_ms > 60_000 {
            return Err(Error::Config(
                "Retry delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "Request timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.refresh_timeout_secs == 0 {
            return Err(Error::Config(
                "Refresh timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.token_expiry_margin_secs < 0 {
            return Err(Error::Config(
                "Token expiry margin cannot be negative".to_string(),
            ));
        }

        if self.token_expiry_margin_secs > 86_400 {
            return Err(Error::Config(
                "Token expiry margin exceeds maximum of 1 day (86,400s)".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder();
    /// ```
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The token endpoint URL parses and uses http(s)
    /// - The OAuth client id is present
    /// - Tuning values are within sane bounds
    pub fn validate(&self) -> Result<()> {
        self.token_endpoint.validate()?;
        self.tuning.validate()?;
        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for network operations. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP stack (NSURLSession/OkHttp)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
/// The builder validates required dependencies and provides helpful error
/// messages.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    keep_alive: Option<Arc<dyn KeepAlive>>,
    token_endpoint: Option<TokenEndpointConfig>,
    tuning: NetworkTuning,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// The secure store is used for persisting sensitive credentials like
    /// OAuth tokens. It must provide platform-appropriate security
    /// (Keychain on macOS/iOS, Keystore on Android, etc.).
    ///
    /// If not provided, the desktop default (keyring-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the keep-alive provider.
    ///
    /// Mobile platforms inject an adapter over their background-assertion
    /// APIs here so token refreshes are not suspended mid-flight. If not
    /// provided, a no-op provider is used, which is correct for desktop.
    pub fn keep_alive(mut self, keep_alive: Arc<dyn KeepAlive>) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Sets the OAuth token endpoint configuration (required).
    pub fn token_endpoint(mut self, endpoint: TokenEndpointConfig) -> Self {
        self.token_endpoint = Some(endpoint);
        self
    }

    /// Sets all tuning values at once.
    pub fn tuning(mut self, tuning: NetworkTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Sets the maximum number of retries after the initial attempt.
    ///
    /// Default: 3 (so a request is attempted at most 4 times)
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.tuning.max_retries = max_retries;
        self
    }

    /// Sets the delay between retry attempts in milliseconds.
    ///
    /// Default: 500ms
    pub fn retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.tuning.retry_delay_ms = delay_ms;
        self
    }

    /// Sets the default per-request timeout in seconds.
    ///
    /// Default: 30s
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.tuning.request_timeout_secs = secs;
        self
    }

    /// Sets the upper bound on a whole token refresh operation in seconds.
    ///
    /// Default: 120s
    pub fn refresh_timeout_secs(mut self, secs: u64) -> Self {
        self.tuning.refresh_timeout_secs = secs;
        self
    }

    /// Sets the proactive refresh margin in seconds. Tokens expiring within
    /// this window are treated as already expired.
    ///
    /// Default: 300s
    pub fn token_expiry_margin_secs(mut self, secs: i64) -> Self {
        self.tuning.token_expiry_margin_secs = secs;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// This validates all required dependencies are provided and returns
    /// an error with an actionable message if anything is missing.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Required bridges are missing (HttpClient, SecureStore)
    /// - Configuration values are invalid
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use core_runtime::config::{CoreConfig, TokenEndpointConfig};
    /// let config = CoreConfig::builder()
    ///     .token_endpoint(TokenEndpointConfig::new(
    ///         "https://login.example.com/token",
    ///         "client-id",
    ///     ))
    ///     .build()?;
    /// # Ok::<(), core_runtime::Error>(())
    /// ```
    pub fn build(self) -> Result<CoreConfig> {
        // Validate required fields
        let token_endpoint = self.token_endpoint.ok_or_else(|| {
            Error::Config(
                "Token endpoint is required. Use .token_endpoint() to set it.".to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let keep_alive = self
            .keep_alive
            .unwrap_or_else(|| Arc::new(NoopKeepAlive::new()));

        // Create config with defaults
        let config = CoreConfig {
            http_client,
            secure_store,
            keep_alive,
            token_endpoint,
            tuning: self.tuning,
        };

        // Validate the configuration
        config.validate()?;

        Ok(config)
    }
}
