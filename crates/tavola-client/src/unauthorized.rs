//! Reactions to HTTP 401 responses.
//!
//! # Design
//! - The client owns one [`UnauthorizedHandler`], chosen by
//!   [`UnauthorizedPolicy`] or injected through the builder.
//! - The handler talks to the session only through [`SessionListener`], so
//!   the pipeline never depends on the concrete session type.
//! - Refresh is single-flight: concurrent 401s queue on one async mutex and
//!   reuse a token another caller already obtained.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tavola_session::SessionManager;
use tavola_session::token::strip_bearer;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::ApiClient;

/// Receives the "credential rejected" notification.
pub trait SessionListener: Send + Sync + Debug {
    /// The backend rejected the current credential.
    fn session_unauthorized(&self);
}

impl SessionListener for SessionManager {
    fn session_unauthorized(&self) {
        self.mark_expired();
    }
}

/// What the client should do after the handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnauthorizedOutcome {
    /// Surface the 401 to the caller.
    Propagate,
    /// Re-issue the original request once.
    Retry,
}

/// Data available to a handler when a request was rejected.
#[derive(Clone, Copy, Debug)]
pub struct UnauthorizedContext<'a> {
    /// Client that issued the request.
    pub client: &'a ApiClient,
    /// Bearer token the rejected request carried.
    pub rejected_token: &'a str,
}

/// Strategy invoked once per 401 response.
#[async_trait]
pub trait UnauthorizedHandler: Send + Sync + Debug {
    /// Decide how to proceed after a rejected request.
    async fn handle(&self, context: UnauthorizedContext<'_>) -> UnauthorizedOutcome;
}

/// Leave the session untouched and surface the 401.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl UnauthorizedHandler for Passthrough {
    async fn handle(&self, _context: UnauthorizedContext<'_>) -> UnauthorizedOutcome {
        UnauthorizedOutcome::Propagate
    }
}

/// Notify the session listener and surface the 401.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentLogout;

#[async_trait]
impl UnauthorizedHandler for SilentLogout {
    async fn handle(&self, context: UnauthorizedContext<'_>) -> UnauthorizedOutcome {
        context.client.expire_if_current(context.rejected_token);
        UnauthorizedOutcome::Propagate
    }
}

/// Exchange the refresh token once and retry; degrade to [`SilentLogout`].
#[derive(Debug, Default)]
pub struct RefreshOnce {
    gate: Mutex<()>,
}

#[async_trait]
impl UnauthorizedHandler for RefreshOnce {
    async fn handle(&self, context: UnauthorizedContext<'_>) -> UnauthorizedOutcome {
        let _flight = self.gate.lock().await;
        let credentials = context.client.credentials();

        match credentials.read() {
            Some(current) if strip_bearer(&current) != context.rejected_token => {
                tracing::debug!("credential rotated while waiting; retrying with the new token");
                return UnauthorizedOutcome::Retry;
            }
            None => {
                tracing::debug!("credential cleared while waiting; nothing to refresh");
                return UnauthorizedOutcome::Propagate;
            }
            Some(_) => {}
        }

        let Some(refresh_token) = credentials.read_refresh() else {
            tracing::info!("no refresh token stored; ending session");
            return SilentLogout.handle(context).await;
        };

        match context.client.exchange_refresh_token(&refresh_token).await {
            Ok(pair) => {
                credentials.save(&pair.token);
                if let Some(rotated) = pair.refresh_token.as_deref() {
                    credentials.save_refresh(rotated);
                }
                tracing::info!("access token refreshed");
                UnauthorizedOutcome::Retry
            }
            Err(error) => {
                tracing::warn!(
                    category = %error.category,
                    detail = error.detail.as_deref().unwrap_or_default(),
                    "token refresh failed; ending session"
                );
                SilentLogout.handle(context).await
            }
        }
    }
}

/// Built-in 401 strategies selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnauthorizedPolicy {
    /// Surface the 401 without touching the session.
    Passthrough,
    /// Expire the session and surface the 401.
    #[default]
    SilentLogout,
    /// Refresh the access token once, then retry the request.
    RefreshOnce,
}

impl UnauthorizedPolicy {
    /// Instantiate the handler for this policy.
    #[must_use]
    pub fn handler(self) -> Arc<dyn UnauthorizedHandler> {
        match self {
            Self::Passthrough => Arc::new(Passthrough),
            Self::SilentLogout => Arc::new(SilentLogout),
            Self::RefreshOnce => Arc::new(RefreshOnce::default()),
        }
    }

    /// Stable label accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::SilentLogout => "logout",
            Self::RefreshOnce => "refresh",
        }
    }
}

impl Display for UnauthorizedPolicy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Unrecognised policy name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown unauthorized policy '{value}' (expected passthrough, logout, or refresh)")]
pub struct UnknownPolicy {
    /// Rejected input.
    pub value: String,
}

impl FromStr for UnauthorizedPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "passthrough" | "none" => Ok(Self::Passthrough),
            "logout" | "silent-logout" => Ok(Self::SilentLogout),
            "refresh" | "refresh-once" => Ok(Self::RefreshOnce),
            _ => Err(UnknownPolicy {
                value: value.to_string(),
            }),
        }
    }
}
