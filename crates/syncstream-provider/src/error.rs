use syncstream_store::StoreError;
use thiserror::Error;

/// Errors from provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token refresh failed, or a 401 persisted through one refresh
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Any other non-success response
    #[error("{method} {endpoint} failed with status {status}: {body}")]
    Transport {
        method: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Rate limiting outlasted the retry budget
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Token cache error: {0}")]
    Store(#[from] StoreError),

    #[error("Missing provider credentials: {0}")]
    MissingCredentials(String),

    /// Scripted failure from the mock provider
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl ProviderError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Decode(e.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
