//! Remote detail fetcher
//!
//! Builds the signed request, sends it, and hands back the gateway's JSON
//! body as a [`RawResponse`]. Transport failures come back as structured
//! [`FetchError`] values so the orchestrator can branch on them directly.

pub mod client;
pub mod product;
pub mod response;

use async_trait::async_trait;
use std::fmt;

use crate::session::CookieSet;

pub use client::HttpDetailFetcher;
pub use product::{EmptyProduct, ProductRecord, parse_product};
pub use response::{RawResponse, RetSignal};

/// Which phase of the HTTP exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Connect phase exceeded its timeout
    Connect,
    /// Reading the response exceeded its timeout
    Read,
    /// Any other transport failure (refused, reset, TLS, DNS)
    Generic,
}

impl NetworkErrorKind {
    /// Stable error code recorded with failed jobs
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT_TIMEOUT",
            Self::Read => "READ_TIMEOUT",
            Self::Generic => "REQUEST_ERROR",
        }
    }

    /// Classify a reqwest error
    #[must_use]
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            if err.is_connect() {
                Self::Connect
            } else {
                Self::Read
            }
        } else {
            Self::Generic
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure of a single fetch, returned rather than raised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The URL has no `id` query parameter
    #[error("URL has no 'id' query parameter: {0}")]
    MalformedUrl(String),

    /// Transport failure
    #[error("{kind}::{detail}")]
    Network {
        kind: NetworkErrorKind,
        detail: String,
    },

    /// The gateway answered with something that is not JSON
    #[error("Response body is not valid JSON: {0}")]
    InvalidBody(String),
}

impl FetchError {
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        Self::Network {
            kind: NetworkErrorKind::classify(err),
            detail: err.to_string(),
        }
    }
}

/// Capability that performs one detail lookup with a given session
#[async_trait]
pub trait DetailFetch: Send + Sync {
    async fn fetch(&self, url: &str, cookies: &CookieSet) -> Result<RawResponse, FetchError>;
}
