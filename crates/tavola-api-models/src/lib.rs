#![forbid(unsafe_code)]
#![warn(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the Tavola administrative API.
//!
//! The backend speaks a mix of camelCase and snake_case; field aliases keep the
//! client tolerant of both so the mapping lives in one place. Mutation
//! endpoints answer with partial records (`*Update`) whose present fields are
//! authoritative over anything the client guessed locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body accepted by `POST /api/v1/auth/admin/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Administrator email address.
    pub email: String,
    /// Plain-text password; only ever sent over the wire.
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Access token used as the bearer credential.
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    /// Refresh token paired with the access token.
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
    /// Authenticated administrator profile, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AdminUser>,
}

/// Administrator profile returned alongside a login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminUser {
    /// Backend identifier.
    pub id: String,
    /// Login email.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Display name.
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Role label such as `admin` or `franchise_owner`.
    pub role: Option<String>,
}

/// Body accepted by `POST /api/v1/auth/refresh-token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRequest {
    /// Refresh token issued at login.
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Token pair returned by the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    /// Fresh access token.
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    /// Rotated refresh token, when the backend rotates them.
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pagination {
    /// Total number of records across all pages.
    #[serde(default)]
    pub total: u64,
    /// Current page number (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size used by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Whether another page follows.
    #[serde(default, alias = "hasNext")]
    pub has_next: bool,
    /// Whether a previous page exists.
    #[serde(default, alias = "hasPrev")]
    pub has_prev: bool,
}

/// Paginated list envelope. The backend names the row array either `data`
/// or `items` depending on the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    /// Rows on this page.
    #[serde(alias = "items", default = "Vec::new")]
    pub data: Vec<T>,
    /// Pagination metadata, absent on unpaginated endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    /// Whether the backend reported a following page.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.pagination.is_some_and(|pagination| pagination.has_next)
    }
}

/// Query parameters shared by every paginated list endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (1-based).
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl PageRequest {
    /// Default page size used by admin list screens.
    pub const DEFAULT_LIMIT: u32 = 20;

    /// First page with the default size.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// The page after this one with the same size.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// Error body the backend attaches to failed responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Human-readable message.
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Alternate field some endpoints use instead of `message`.
    pub error: Option<String>,
}

impl ErrorBody {
    /// First non-empty diagnostic carried by the body.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Customer account as listed on the user-management screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Backend identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Whether the account is blocked.
    #[serde(default, alias = "isBlocked", alias = "is_blocked")]
    pub blocked: bool,
    /// Account status label (`active`, `blocked`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Partial customer record returned by block/unblock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    /// Authoritative blocked flag.
    #[serde(default, alias = "isBlocked", alias = "is_blocked")]
    pub blocked: Option<bool>,
    /// Authoritative status label.
    #[serde(default)]
    pub status: Option<String>,
}

impl CustomerUpdate {
    /// Overwrite the fields the server returned.
    pub fn apply_to(self, customer: &mut Customer) {
        if let Some(blocked) = self.blocked {
            customer.blocked = blocked;
        }
        if let Some(status) = self.status {
            customer.status = Some(status);
        }
    }
}

/// Moderation state of a referral withdrawal.
///
/// Labels this client does not know decode as [`WithdrawalStatus::Other`]
/// and are written back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum WithdrawalStatus {
    /// Awaiting moderation.
    Pending,
    /// Approved, waiting for payout.
    Approved,
    /// Rejected by an administrator.
    Rejected,
    /// Paid out.
    Paid,
    /// Label introduced by the backend after this client was built.
    Other(String),
}

impl WithdrawalStatus {
    /// Wire label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
            Self::Other(label) => label,
        }
    }

    /// Parse one of the known wire labels.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl From<String> for WithdrawalStatus {
    fn from(label: String) -> Self {
        Self::parse(&label).unwrap_or(Self::Other(label))
    }
}

impl From<WithdrawalStatus> for String {
    fn from(status: WithdrawalStatus) -> Self {
        match status {
            WithdrawalStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// Referral withdrawal request awaiting or past moderation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Backend identifier.
    pub id: String,
    /// Requesting user.
    #[serde(default, alias = "user_id")]
    pub user_id: String,
    /// Requested amount in the store currency.
    #[serde(default)]
    pub amount: f64,
    /// Moderation status.
    pub status: WithdrawalStatus,
    /// Moderator note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Last modification time.
    #[serde(
        default,
        alias = "updated_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body accepted by the withdrawal status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalStatusRequest {
    /// Target status.
    pub status: WithdrawalStatus,
    /// Optional moderator note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Partial withdrawal record returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalUpdate {
    /// Authoritative status.
    #[serde(default)]
    pub status: Option<WithdrawalStatus>,
    /// Authoritative note.
    #[serde(default)]
    pub note: Option<String>,
    /// Server-side modification time.
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WithdrawalUpdate {
    /// Overwrite the fields the server returned.
    pub fn apply_to(self, withdrawal: &mut Withdrawal) {
        if let Some(status) = self.status {
            withdrawal.status = status;
        }
        if let Some(note) = self.note {
            withdrawal.note = Some(note);
        }
        if let Some(updated_at) = self.updated_at {
            withdrawal.updated_at = Some(updated_at);
        }
    }
}

/// Menu item with its availability flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Backend identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Unit price.
    #[serde(default)]
    pub price: f64,
    /// Menu category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Whether the item can currently be ordered.
    #[serde(default, alias = "is_available")]
    pub is_available: bool,
}

/// Body accepted by the menu availability endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MenuAvailabilityRequest {
    /// Target availability.
    pub is_available: bool,
}

/// Partial menu item returned by the availability endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemUpdate {
    /// Authoritative availability.
    #[serde(default, alias = "is_available")]
    pub is_available: Option<bool>,
    /// Authoritative price, when the backend recomputed it.
    #[serde(default)]
    pub price: Option<f64>,
}

impl MenuItemUpdate {
    /// Overwrite the fields the server returned.
    pub fn apply_to(self, item: &mut MenuItem) {
        if let Some(is_available) = self.is_available {
            item.is_available = is_available;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
    }
}

/// Franchise store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    /// Backend identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Whether the store accepts orders.
    #[serde(default, alias = "is_active")]
    pub is_active: bool,
}

/// Marketing campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    /// Backend identifier.
    pub id: String,
    /// Campaign title.
    #[serde(default, alias = "name")]
    pub title: String,
    /// Lifecycle label (`draft`, `active`, `ended`, ...).
    #[serde(default)]
    pub status: String,
    /// Discount applied by the campaign, in percent.
    #[serde(
        default,
        alias = "discount_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_percent: Option<f64>,
    /// Start time.
    #[serde(default, alias = "starts_at", skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    /// End time.
    #[serde(default, alias = "ends_at", skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}
