#![forbid(unsafe_code)]
#![warn(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
//! Authenticated REST access for Tavola administrative clients.
//!
//! Layout:
//! - `pipeline.rs`: request interceptors (JSON headers, API key, bearer token)
//! - `client.rs`: the `ApiClient` and its 401 handling
//! - `unauthorized.rs`: pluggable 401 strategies and the session listener seam
//! - `error.rs`: failure taxonomy and category normalization
//! - `auth.rs` / `resources.rs`: typed endpoints
//! - `list.rs` / `optimistic.rs`: paginated list state and optimistic mutations

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod list;
pub mod optimistic;
pub mod pipeline;
pub mod resources;
pub mod unauthorized;

pub use auth::{LoginError, RefreshError, login, logout, refresh, validate_credentials};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::{ClientConfig, ConfigError, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
pub use error::{ApiError, ErrorCategory, Failure, normalize};
pub use list::{ListController, ListItem, ListState, LoadOutcome, PendingMutation, Row};
pub use optimistic::{
    MutationError, RecordLocks, change_withdrawal_status, set_menu_availability,
    toggle_customer_block,
};
pub use pipeline::{AuthInterceptor, HeaderInterceptor, Pipeline, RequestInterceptor};
pub use unauthorized::{
    SessionListener, UnauthorizedContext, UnauthorizedHandler, UnauthorizedOutcome,
    UnauthorizedPolicy,
};
