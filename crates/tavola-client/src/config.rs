//! Connection settings for [`crate::ApiClient`].

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::unauthorized::UnauthorizedPolicy;

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";
/// Transport timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while building an API client.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL could not be parsed or is not an http(s) base.
    #[error("invalid base url")]
    InvalidBaseUrl {
        /// Offending value.
        value: String,
    },
    /// The API key cannot be carried in a header.
    #[error("api key contains characters not allowed in headers")]
    InvalidApiKey,
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client")]
    HttpClient {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// Settings shared by every request the client issues.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend origin; endpoint paths are appended to it.
    pub base_url: Url,
    /// Value sent as `X-Key` on every request.
    pub api_key: Option<String>,
    /// Transport timeout.
    pub timeout: Duration,
    /// Reaction to HTTP 401 responses.
    pub unauthorized: UnauthorizedPolicy,
}

impl ClientConfig {
    /// Parse and validate a base URL, using defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the value is not an
    /// absolute http or https URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            unauthorized: UnauthorizedPolicy::default(),
        })
    }

    /// Set the `X-Key` value.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Set the transport timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the 401 policy.
    #[must_use]
    pub const fn with_unauthorized(mut self, policy: UnauthorizedPolicy) -> Self {
        self.unauthorized = policy;
        self
    }
}

/// Validate a user-supplied base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unparsable values, non-http
/// schemes, and URLs that cannot carry path segments.
pub fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidBaseUrl {
        value: value.to_string(),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(url)
}
