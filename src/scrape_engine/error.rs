//! Terminal outcomes of a failed scrape

use std::time::Duration;

use crate::fetcher::{EmptyProduct, FetchError, NetworkErrorKind};

/// Why a scrape did not produce a product record
///
/// The `Display` form is what gets stored as a failed job's error detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    /// The URL carries no `id` query parameter; nothing was sent
    #[error("MALFORMED_URL: no 'id' query parameter in {0}")]
    MalformedUrl(String),

    /// Cookies could not be obtained from the browser
    #[error("SESSION_ERROR: {0}")]
    Session(String),

    /// Transport failure, not retried here
    #[error("{kind}: {detail}")]
    Network {
        kind: NetworkErrorKind,
        detail: String,
    },

    /// The body was not JSON
    #[error("INVALID_RESPONSE: {0}")]
    InvalidResponse(String),

    /// The attempt did not finish within the per-attempt deadline
    #[error("REQUEST_TIMEOUT: no response within {0:?}")]
    RequestTimeout(Duration),

    /// The gateway kept rejecting the session after every refresh
    #[error("TOKEN_RETRY_EXHAUSTED after {attempts} attempts: {signal}")]
    TokenRetryExhausted { attempts: u32, signal: String },

    /// The gateway refused the item; carries its raw signal
    #[error("{signal}")]
    PermanentApiError { signal: String },

    /// Successful call without a product block
    #[error("EMPTY_PRODUCT")]
    EmptyProduct,
}

impl ScrapeError {
    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::MalformedUrl(_) => "MALFORMED_URL",
            Self::Session(_) => "SESSION_ERROR",
            Self::Network { kind, .. } => kind.code(),
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::RequestTimeout(_) => "REQUEST_TIMEOUT",
            Self::TokenRetryExhausted { .. } => "TOKEN_RETRY_EXHAUSTED",
            Self::PermanentApiError { signal } => signal,
            Self::EmptyProduct => "EMPTY_PRODUCT",
        }
    }

    pub(crate) fn session(err: &anyhow::Error) -> Self {
        Self::Session(format!("{err:#}"))
    }
}

impl From<FetchError> for ScrapeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::MalformedUrl(url) => Self::MalformedUrl(url),
            FetchError::Network { kind, detail } => Self::Network { kind, detail },
            FetchError::InvalidBody(detail) => Self::InvalidResponse(detail),
        }
    }
}

impl From<EmptyProduct> for ScrapeError {
    fn from(_: EmptyProduct) -> Self {
        Self::EmptyProduct
    }
}
