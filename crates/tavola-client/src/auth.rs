//! Login, logout, and token refresh.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use tavola_api_models::{LoginRequest, LoginResponse, RefreshTokenRequest, TokenPair};
use tavola_session::SessionManager;
use thiserror::Error;

use crate::client::ApiClient;
use crate::error::{ApiError, ErrorCategory};

const LOGIN_PATH: &[&str] = &["api", "v1", "auth", "admin", "login"];
const REFRESH_PATH: &[&str] = &["api", "v1", "auth", "refresh-token"];

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Failures surfaced by [`login`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    /// The email address is malformed.
    #[error("please enter a valid email address")]
    InvalidEmail,
    /// The password is empty.
    #[error("please enter your password")]
    MissingPassword,
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials {
        /// Backend-provided diagnostic.
        detail: Option<String>,
    },
    /// Any other request failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl LoginError {
    /// Whether the error was raised before any network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::InvalidEmail | Self::MissingPassword)
    }
}

/// Failures surfaced by [`refresh`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token is stored.
    #[error("no refresh token stored")]
    MissingRefreshToken,
    /// The refresh call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Check email and password without touching the network.
///
/// # Errors
///
/// Returns [`LoginError::InvalidEmail`] or [`LoginError::MissingPassword`].
pub fn validate_credentials(email: &str, password: &str) -> Result<(), LoginError> {
    let valid_email = EMAIL
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email.trim()));
    if !valid_email {
        return Err(LoginError::InvalidEmail);
    }
    if password.is_empty() {
        return Err(LoginError::MissingPassword);
    }
    Ok(())
}

/// Authenticate and start a session.
///
/// # Errors
///
/// Local validation failures return before any request is sent; backend
/// rejections map to [`LoginError::InvalidCredentials`].
pub async fn login(
    client: &ApiClient,
    session: &SessionManager,
    email: &str,
    password: &str,
) -> Result<LoginResponse, LoginError> {
    validate_credentials(email, password)?;
    let request = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let response: LoginResponse = client
        .post(LOGIN_PATH, &request)
        .await
        .map_err(|error| match error.category {
            ErrorCategory::Unauthorized => LoginError::InvalidCredentials {
                detail: error.detail,
            },
            _ => LoginError::Api(error),
        })?;
    session.start_session(&response.token, response.refresh_token.as_deref());
    tracing::info!(email = %request.email, "admin logged in");
    Ok(response)
}

/// End the session locally.
pub fn logout(session: &SessionManager) {
    session.end_session();
    tracing::info!("admin logged out");
}

/// Exchange the stored refresh token for a new pair and keep the session.
///
/// # Errors
///
/// Returns [`RefreshError::MissingRefreshToken`] when nothing is stored, or
/// the normalized API error of the refresh call.
pub async fn refresh(client: &ApiClient, session: &SessionManager) -> Result<TokenPair, RefreshError> {
    let refresh_token = session
        .credentials()
        .read_refresh()
        .ok_or(RefreshError::MissingRefreshToken)?;
    let pair = client.exchange_refresh_token(&refresh_token).await?;
    let rotated = pair.refresh_token.as_deref().unwrap_or(&refresh_token);
    session.start_session(&pair.token, Some(rotated));
    Ok(pair)
}

impl ApiClient {
    /// Call the refresh endpoint without running the 401 strategy.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let url = self.endpoint(REFRESH_PATH)?;
        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        })
        .map_err(|err| ApiError {
            category: ErrorCategory::Unknown,
            message: format!("failed to encode refresh request: {err}"),
            detail: None,
        })?;
        self.execute_once(Method::POST, url, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        for email in ["not-an-email", "a@b", "@x.io", "a b@c.io", ""] {
            assert_eq!(
                validate_credentials(email, "whatever"),
                Err(LoginError::InvalidEmail),
                "{email}"
            );
        }
        assert!(validate_credentials(" ops@tavola.io ", "pw").is_ok());
    }

    #[test]
    fn empty_password_is_rejected_after_email() {
        assert_eq!(
            validate_credentials("ops@tavola.io", ""),
            Err(LoginError::MissingPassword)
        );
        assert!(LoginError::MissingPassword.is_local());
        assert!(!LoginError::InvalidCredentials { detail: None }.is_local());
    }

    #[test]
    fn invalid_email_message_names_the_field() {
        assert!(LoginError::InvalidEmail.to_string().contains("email"));
    }
}
