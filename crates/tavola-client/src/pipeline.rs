//! Request interceptors applied to every outgoing call.

use std::fmt::Debug;
use std::sync::Arc;

use reqwest::Request;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use tavola_session::CredentialStore;
use tavola_session::token::strip_bearer;

use crate::config::ConfigError;

/// Header carrying the backend API key.
pub const API_KEY_HEADER: &str = "x-key";

const JSON: &str = "application/json";

/// A stage that inspects or rewrites a request before it is sent.
pub trait RequestInterceptor: Send + Sync + Debug {
    /// Mutate the request in place.
    fn intercept(&self, request: &mut Request);
}

/// Sets the JSON content headers and the API key.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    api_key: Option<HeaderValue>,
}

impl HeaderInterceptor {
    /// Build the interceptor, validating the API key as a header value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiKey`] when the key contains bytes not
    /// allowed in an HTTP header.
    pub fn new(api_key: Option<&str>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|key| {
                let mut value =
                    HeaderValue::from_str(key).map_err(|_| ConfigError::InvalidApiKey)?;
                value.set_sensitive(true);
                Ok::<_, ConfigError>(value)
            })
            .transpose()?;
        Ok(Self { api_key })
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn intercept(&self, request: &mut Request) {
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        if let Some(key) = &self.api_key {
            headers.insert(HeaderName::from_static(API_KEY_HEADER), key.clone());
        }
    }
}

/// Attaches `Authorization: Bearer <token>` when a credential is stored.
#[derive(Clone, Debug)]
pub struct AuthInterceptor {
    credentials: CredentialStore,
}

impl AuthInterceptor {
    /// Read tokens from the given store.
    #[must_use]
    pub const fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn intercept(&self, request: &mut Request) {
        let Some(token) = self.credentials.read() else {
            return;
        };
        let token = strip_bearer(&token);
        if token.is_empty() {
            return;
        }
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("stored token is not a valid header value; sending unauthenticated");
            }
        }
    }
}

/// Ordered list of interceptors.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn RequestInterceptor>>,
}

impl Pipeline {
    /// Append a stage; stages run in registration order.
    pub fn push(&mut self, stage: Arc<dyn RequestInterceptor>) {
        self.stages.push(stage);
    }

    /// Run every stage over the request.
    pub fn apply(&self, request: &mut Request) {
        for stage in &self.stages {
            stage.intercept(request);
        }
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
