//! HTTP client that runs every call through the interceptor pipeline and the
//! configured 401 strategy.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tavola_api_models::ErrorBody;
use tavola_session::token::strip_bearer;
use tavola_session::{CredentialStore, SessionManager};
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::error::{ApiError, Failure, normalize};
use crate::pipeline::{AuthInterceptor, HeaderInterceptor, Pipeline, RequestInterceptor};
use crate::unauthorized::{
    SessionListener, UnauthorizedContext, UnauthorizedHandler, UnauthorizedOutcome,
};

/// Authenticated REST client for the admin backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    pipeline: Pipeline,
    credentials: CredentialStore,
    listener: Arc<dyn SessionListener>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
}

/// Builder for [`ApiClient`].
#[derive(Debug)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    credentials: CredentialStore,
    listener: Arc<dyn SessionListener>,
    extra: Vec<Arc<dyn RequestInterceptor>>,
    unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
}

impl ApiClientBuilder {
    /// Register an interceptor that runs after the header and auth stages.
    #[must_use]
    pub fn interceptor(mut self, stage: Arc<dyn RequestInterceptor>) -> Self {
        self.extra.push(stage);
        self
    }

    /// Replace the policy-derived 401 handler.
    #[must_use]
    pub fn unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.unauthorized = Some(handler);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the API key is not a valid header value
    /// or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ApiClient, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|source| ConfigError::HttpClient { source })?;

        let mut pipeline = Pipeline::default();
        pipeline.push(Arc::new(HeaderInterceptor::new(
            self.config.api_key.as_deref(),
        )?));
        pipeline.push(Arc::new(AuthInterceptor::new(self.credentials.clone())));
        for stage in self.extra {
            pipeline.push(stage);
        }

        Ok(ApiClient {
            http,
            base_url: self.config.base_url,
            pipeline,
            credentials: self.credentials,
            listener: self.listener,
            unauthorized: self
                .unauthorized
                .unwrap_or_else(|| self.config.unauthorized.handler()),
        })
    }
}

impl ApiClient {
    /// Start building a client over explicit collaborators.
    #[must_use]
    pub fn builder(
        config: ClientConfig,
        credentials: CredentialStore,
        listener: Arc<dyn SessionListener>,
    ) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            credentials,
            listener,
            extra: Vec::new(),
            unauthorized: None,
        }
    }

    /// Builder wired to a session manager's credential store and listener.
    #[must_use]
    pub fn for_session(config: ClientConfig, session: &Arc<SessionManager>) -> ApiClientBuilder {
        let listener: Arc<dyn SessionListener> = session.clone();
        Self::builder(config, session.credentials().clone(), listener)
    }

    /// Credential store the auth stage reads from.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Listener notified when a credential is rejected.
    #[must_use]
    pub fn listener(&self) -> &dyn SessionListener {
        self.listener.as_ref()
    }

    /// Tell the listener the session is over, unless `rejected_token` was
    /// already replaced or cleared. Returns whether the listener ran.
    pub fn expire_if_current(&self, rejected_token: &str) -> bool {
        let stored = self.credentials.read();
        if stored.as_deref().map(strip_bearer) != Some(rejected_token) {
            tracing::debug!("ignoring 401 for a credential that is no longer stored");
            return false;
        }
        self.listener.session_unauthorized();
        true
    }

    /// Backend origin.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve path segments against the base URL.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the base URL cannot carry a path.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                normalize(&Failure::Other {
                    message: Some("base url cannot carry a path".to_string()),
                })
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET` with query parameters.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        self.execute(Method::GET, url, None).await
    }

    /// `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(Method::POST, url, Some(encode(body)?)).await
    }

    /// `POST` without a body.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn post_empty<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(Method::POST, url, None).await
    }

    /// `PATCH` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(Method::PATCH, url, Some(encode(body)?)).await
    }

    /// Send a request without consulting the 401 strategy.
    pub(crate) async fn execute_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let (request, _) = self.prepare(method, url, body.as_ref())?;
        let response = self.dispatch(request).await?;
        read(response).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let (request, bearer) = self.prepare(method.clone(), url.clone(), body.as_ref())?;
        let response = self.dispatch(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read(response).await;
        }

        let rejected = read::<Value>(response).await.err();
        let Some(rejected_token) = bearer else {
            // Anonymous requests have no session to act on.
            return Err(rejected.unwrap_or_else(unauthorized));
        };
        let outcome = self
            .unauthorized
            .handle(UnauthorizedContext {
                client: self,
                rejected_token: &rejected_token,
            })
            .await;
        match outcome {
            UnauthorizedOutcome::Propagate => Err(rejected.unwrap_or_else(unauthorized)),
            UnauthorizedOutcome::Retry => {
                let (retry, retry_bearer) = self.prepare(method, url, body.as_ref())?;
                let response = self.dispatch(retry).await?;
                if response.status() == StatusCode::UNAUTHORIZED
                    && let Some(token) = retry_bearer.as_deref()
                {
                    tracing::info!("retried request rejected again");
                    self.expire_if_current(token);
                }
                read(response).await
            }
        }
    }

    fn prepare(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(Request, Option<String>), ApiError> {
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let mut request = builder.build().map_err(|err| normalize(&Failure::from(&err)))?;
        self.pipeline.apply(&mut request);
        let bearer = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        Ok((request, bearer))
    }

    async fn dispatch(&self, request: Request) -> Result<Response, ApiError> {
        let method = request.method().clone();
        let path = request.url().path().to_string();
        match self.http.execute(request).await {
            Ok(response) => {
                tracing::debug!(%method, %path, status = response.status().as_u16(), "api call");
                Ok(response)
            }
            Err(err) => {
                let error = normalize(&Failure::from(&err));
                tracing::debug!(%method, %path, category = %error.category, "api call failed");
                Err(error)
            }
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| {
        normalize(&Failure::Other {
            message: Some(format!("failed to encode request body: {err}")),
        })
    })
}

fn unauthorized() -> ApiError {
    normalize(&Failure::Status {
        status: StatusCode::UNAUTHORIZED.as_u16(),
        detail: None,
    })
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| normalize(&Failure::from(&err)))?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.detail().map(str::to_string));
        return Err(normalize(&Failure::Status {
            status: status.as_u16(),
            detail,
        }));
    }

    let payload: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &bytes
    };
    serde_json::from_slice(payload).map_err(|err| {
        normalize(&Failure::Other {
            message: Some(format!("failed to decode response: {err}")),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::unauthorized::UnauthorizedPolicy;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, policy: UnauthorizedPolicy) -> (ApiClient, Arc<SessionManager>) {
        let session = Arc::new(SessionManager::with_system_clock(CredentialStore::in_memory()));
        let config = ClientConfig::new(&server.base_url())
            .expect("mock url")
            .with_unauthorized(policy);
        let client = ApiClient::for_session(config, &session)
            .build()
            .expect("client builds");
        (client, session)
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let session = Arc::new(SessionManager::with_system_clock(CredentialStore::in_memory()));
        let config = ClientConfig::new("https://api.example.com/prefix/").expect("url");
        let client = ApiClient::for_session(config, &session)
            .build()
            .expect("client");
        let url = client
            .endpoint(&["api", "v1", "admin", "customers", "a b"])
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://api.example.com/prefix/api/v1/admin/customers/a%20b"
        );
    }

    #[tokio::test]
    async fn empty_success_body_decodes_as_null() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/admin/customers/c1/block");
            then.status(204);
        });
        let (client, _) = client(&server, UnauthorizedPolicy::SilentLogout);
        let body: Option<Value> = client
            .post_empty(&["api", "v1", "admin", "customers", "c1", "block"])
            .await
            .expect("empty body accepted");
        assert!(body.is_none());
        mock.assert();
    }

    #[tokio::test]
    async fn error_body_detail_is_kept_without_changing_category() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/admin/stores");
            then.status(422)
                .header("content-type", "application/json")
                .json_body(json!({"message": "limit too large"}));
        });
        let (client, _) = client(&server, UnauthorizedPolicy::SilentLogout);
        let err = client
            .get::<Value>(&["api", "v1", "admin", "stores"], &[])
            .await
            .expect_err("422 should fail");
        assert_eq!(err.category, ErrorCategory::ClientError(422));
        assert_eq!(err.detail.as_deref(), Some("limit too large"));
    }

    #[tokio::test]
    async fn anonymous_401_leaves_session_alone() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/admin/login");
            then.status(401)
                .header("content-type", "application/json")
                .json_body(json!({"error": "bad credentials"}));
        });
        let (client, session) = client(&server, UnauthorizedPolicy::SilentLogout);
        let err = client
            .post::<_, Value>(&["api", "v1", "auth", "admin", "login"], &json!({}))
            .await
            .expect_err("401");
        assert_eq!(err.category, ErrorCategory::Unauthorized);
        assert_eq!(err.detail.as_deref(), Some("bad credentials"));
        assert_eq!(session.state(), tavola_session::SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_no_connection() {
        let session = Arc::new(SessionManager::with_system_clock(CredentialStore::in_memory()));
        let config = ClientConfig::new("http://127.0.0.1:9").expect("url");
        let client = ApiClient::for_session(config, &session)
            .build()
            .expect("client");
        let err = client
            .get::<Value>(&["api", "v1", "admin", "stores"], &[])
            .await
            .expect_err("nothing listens on the discard port");
        assert_eq!(err.category, ErrorCategory::NoConnection);
    }
}
