use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration (bad endpoint URL, zero timeout, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge capability was not injected and no default exists
    /// for this platform.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
