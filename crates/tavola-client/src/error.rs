//! Failure classification for every API call.
//!
//! # Design
//! - Transport and HTTP failures are first captured as a [`Failure`], then
//!   mapped through a static table into a closed [`ErrorCategory`].
//! - The mapping is total: every failure lands in exactly one category, and
//!   the same failure always lands in the same one.
//! - `reqwest::Error` never crosses the crate boundary.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// User-facing error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// DNS, connect, or socket timeout failures.
    NoConnection,
    /// Other transport-level I/O failures.
    Timeout,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 500, 502, 503, 504.
    ServerError,
    /// Any other non-success HTTP status.
    ClientError(u16),
    /// Anything not covered above.
    Unknown,
}

impl ErrorCategory {
    /// Default message shown for the category.
    #[must_use]
    pub fn default_message(self) -> String {
        match self {
            Self::NoConnection => {
                "No internet connection. Check your network and try again.".to_string()
            }
            Self::Timeout => "The connection failed or timed out. Please try again.".to_string(),
            Self::Unauthorized => "Session expired, please log in again.".to_string(),
            Self::Forbidden => "You do not have permission to perform this action.".to_string(),
            Self::NotFound => "The requested resource was not found.".to_string(),
            Self::ServerError => {
                "The server encountered an error. Please try again later.".to_string()
            }
            Self::ClientError(code) => format!("Request failed with status {code}."),
            Self::Unknown => "An unexpected error occurred.".to_string(),
        }
    }

    /// Stable label for logs and machine-readable output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoConnection => "no_connection",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::ClientError(_) => "client_error",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientError(code) => write!(formatter, "client_error({code})"),
            other => formatter.write_str(other.as_str()),
        }
    }
}

/// HTTP statuses with a dedicated category; everything else non-2xx is a
/// [`ErrorCategory::ClientError`].
const STATUS_TABLE: &[(u16, ErrorCategory)] = &[
    (401, ErrorCategory::Unauthorized),
    (403, ErrorCategory::Forbidden),
    (404, ErrorCategory::NotFound),
    (500, ErrorCategory::ServerError),
    (502, ErrorCategory::ServerError),
    (503, ErrorCategory::ServerError),
    (504, ErrorCategory::ServerError),
];

/// Raw failure taxonomy observed at the transport boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// Host name resolution failed.
    Dns {
        /// Transport diagnostic.
        message: String,
    },
    /// TCP/TLS connection could not be established.
    Connect {
        /// Transport diagnostic.
        message: String,
    },
    /// The socket timed out.
    SocketTimeout,
    /// Any other I/O failure while sending or receiving.
    Io {
        /// Transport diagnostic.
        message: String,
    },
    /// The backend answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Diagnostic extracted from the error body, if any.
        detail: Option<String>,
    },
    /// Anything else (decode failures, builder errors, ...).
    Other {
        /// Diagnostic, if one is available.
        message: Option<String>,
    },
}

impl From<&reqwest::Error> for Failure {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::SocketTimeout;
        }
        if err.is_connect() {
            let message = error_chain(err);
            return if looks_like_dns(&message) {
                Self::Dns { message }
            } else {
                Self::Connect { message }
            };
        }
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                detail: None,
            };
        }
        if err.is_request() || err.is_body() {
            return Self::Io {
                message: error_chain(err),
            };
        }
        Self::Other {
            message: Some(error_chain(err)),
        }
    }
}

/// Normalized error surfaced to callers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// Closed category.
    pub category: ErrorCategory,
    /// Human-readable message.
    pub message: String,
    /// Backend-provided diagnostic, kept for logs.
    pub detail: Option<String>,
}

impl ApiError {
    /// Error of the given category with its default message.
    #[must_use]
    pub fn from_category(category: ErrorCategory) -> Self {
        Self {
            category,
            message: category.default_message(),
            detail: None,
        }
    }

    /// Whether the error means the session credential was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.category == ErrorCategory::Unauthorized
    }
}

/// Map a failure into its category and message.
#[must_use]
pub fn normalize(failure: &Failure) -> ApiError {
    match failure {
        Failure::Dns { message } | Failure::Connect { message } => ApiError {
            category: ErrorCategory::NoConnection,
            message: ErrorCategory::NoConnection.default_message(),
            detail: Some(message.clone()),
        },
        Failure::SocketTimeout => ApiError::from_category(ErrorCategory::NoConnection),
        Failure::Io { message } => ApiError {
            category: ErrorCategory::Timeout,
            message: ErrorCategory::Timeout.default_message(),
            detail: Some(message.clone()),
        },
        Failure::Status { status, detail } => ApiError {
            category: category_for_status(*status),
            message: category_for_status(*status).default_message(),
            detail: detail.clone(),
        },
        Failure::Other { message } => ApiError {
            category: ErrorCategory::Unknown,
            message: message
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map_or_else(|| ErrorCategory::Unknown.default_message(), str::to_string),
            detail: None,
        },
    }
}

/// Category for a non-success HTTP status.
#[must_use]
pub fn category_for_status(status: u16) -> ErrorCategory {
    STATUS_TABLE
        .iter()
        .find(|(code, _)| *code == status)
        .map_or(ErrorCategory::ClientError(status), |(_, category)| *category)
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn looks_like_dns(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("dns")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
}
