//! Provider-boundary error type.
//!
//! HTTP failures and non-2xx responses are converted to descriptive strings
//! here; nothing below this boundary leaks upward as a raw transport error.

use thiserror::Error;

use ledgerlink_core::errors::Error as CoreError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Unsupported(&'static str),
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        CoreError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}
