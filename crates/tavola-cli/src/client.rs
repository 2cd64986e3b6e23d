//! Shared client wiring and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::Request;
use reqwest::header::{HeaderName, HeaderValue};
use tavola_client::{
    ApiClient, ApiError, ClientConfig, ErrorCategory, LoginError, MutationError,
    RequestInterceptor,
};
use tavola_session::{CredentialStore, FileStore, KeyValueStore, SessionManager, SnapshotCache};

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
const STATE_DIR_NAME: &str = ".tavola";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Map a normalized API error onto the CLI error taxonomy.
pub(crate) fn classify_api_error(error: ApiError) -> CliError {
    let message = match (&error.category, error.detail.as_deref()) {
        (ErrorCategory::Unauthorized, _) => {
            format!("{} (run `tavola login`)", error.message)
        }
        (_, Some(detail)) => format!("{} ({detail})", error.message.trim_end_matches('.')),
        (_, None) => error.message.clone(),
    };
    CliError::failure(anyhow!(message))
}

pub(crate) fn classify_login_error(error: LoginError) -> CliError {
    match error {
        LoginError::InvalidEmail | LoginError::MissingPassword => {
            CliError::validation(error.to_string())
        }
        LoginError::InvalidCredentials { detail } => CliError::failure(match detail {
            Some(detail) => anyhow!("invalid email or password: {detail}"),
            None => anyhow!("invalid email or password"),
        }),
        LoginError::Api(error) => classify_api_error(error),
    }
}

pub(crate) fn classify_mutation_error(error: MutationError) -> CliError {
    match error {
        MutationError::UnknownRecord { id } => {
            CliError::validation(format!("record '{id}' is not loaded"))
        }
        MutationError::Rejected(error) => classify_api_error(error),
    }
}

/// Tags every request with the command's trace identifier.
#[derive(Debug)]
pub(crate) struct RequestIdInterceptor {
    value: HeaderValue,
}

impl RequestIdInterceptor {
    pub(crate) fn new(trace_id: &str) -> CliResult<Self> {
        let value = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        Ok(Self { value })
    }
}

impl RequestInterceptor for RequestIdInterceptor {
    fn intercept(&self, request: &mut Request) {
        request
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_REQUEST_ID), self.value.clone());
    }
}

/// Application context passed to command handlers.
#[derive(Clone, Debug)]
pub(crate) struct AppContext {
    pub(crate) api: ApiClient,
    pub(crate) session: Arc<SessionManager>,
    pub(crate) snapshots: SnapshotCache,
}

impl AppContext {
    /// Open the state directory and build an authenticated client.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&state_dir).map_err(|err| {
            CliError::failure(anyhow::Error::new(err).context(format!(
                "failed to open state directory '{}'",
                state_dir.display()
            )))
        })?);

        let config = ClientConfig::new(&cli.api_url)
            .map_err(|_| CliError::validation(format!("invalid API URL '{}'", cli.api_url)))?
            .with_timeout(Duration::from_secs(cli.timeout))
            .with_unauthorized(cli.on_unauthorized);
        let config = match cli.api_key.as_deref() {
            Some(key) => config.with_api_key(key.trim()),
            None => config,
        };

        Self::build(config, store, Some(trace_id))
    }

    pub(crate) fn build(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        trace_id: Option<&str>,
    ) -> CliResult<Self> {
        let session = Arc::new(SessionManager::with_system_clock(CredentialStore::new(
            store.clone(),
        )));
        let mut builder = ApiClient::for_session(config, &session);
        if let Some(trace_id) = trace_id {
            builder = builder.interceptor(Arc::new(RequestIdInterceptor::new(trace_id)?));
        }
        let api = builder
            .build()
            .map_err(|err| CliError::failure(anyhow::Error::new(err).context("failed to build API client")))?;

        Ok(Self {
            api,
            session,
            snapshots: SnapshotCache::new(store),
        })
    }
}

fn default_state_dir() -> PathBuf {
    std::env::var_os("HOME").map_or_else(
        || PathBuf::from(STATE_DIR_NAME),
        |home| Path::new(&home).join(STATE_DIR_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tavola_session::MemoryStore;

    #[test]
    fn cli_error_exit_codes() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::validation("bad").to_string(), "bad");
    }

    #[test]
    fn unauthorized_errors_point_at_login() {
        let err = classify_api_error(ApiError::from_category(ErrorCategory::Unauthorized));
        assert!(err.display_message().contains("tavola login"));
    }

    #[test]
    fn api_error_detail_is_appended() {
        let err = classify_api_error(ApiError {
            category: ErrorCategory::ClientError(422),
            message: "Request failed with status 422.".to_string(),
            detail: Some("limit too large".to_string()),
        });
        assert_eq!(
            err.display_message(),
            "Request failed with status 422 (limit too large)"
        );
    }

    #[test]
    fn local_login_failures_are_validation_errors() {
        assert_eq!(classify_login_error(LoginError::InvalidEmail).exit_code(), 2);
        assert_eq!(
            classify_login_error(LoginError::InvalidCredentials { detail: None }).exit_code(),
            3
        );
        assert_eq!(
            classify_mutation_error(MutationError::UnknownRecord { id: "x".into() }).exit_code(),
            2
        );
    }

    #[test]
    fn request_id_interceptor_rejects_invalid_values() {
        assert!(RequestIdInterceptor::new("abc-123").is_ok());
        assert!(RequestIdInterceptor::new("bad\nid").is_err());
    }

    #[test]
    fn context_builds_against_memory_store() -> anyhow::Result<()> {
        let config = ClientConfig::new("http://127.0.0.1:3000")?;
        let ctx = AppContext::build(config, Arc::new(MemoryStore::new()), None)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(ctx.api.base_url().as_str(), "http://127.0.0.1:3000/");
        Ok(())
    }
}
