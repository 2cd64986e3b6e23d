//! Session lifecycle derived from the stored bearer token.
//!
//! # Design
//! - One [`SessionManager`] per process, shared behind an `Arc` and injected
//!   where needed; there is no ambient global session.
//! - State is published through `tokio::sync::watch` so UI layers can observe
//!   "logged in" and "session expired" independently.
//! - Validity checks are synchronous and may transition to `Expired`, clearing
//!   the stored credential as a side effect.

use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::store::CredentialStore;
use crate::token;

/// Coarse session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No credential stored.
    LoggedOut,
    /// A credential is stored and not known to be expired.
    LoggedIn,
    /// The credential expired or was rejected; the user must log in again.
    Expired,
}

impl SessionState {
    /// Fold the two observable signals into one state. Expiry wins so the UI
    /// can tell "your session expired" apart from a plain logged-out state.
    #[must_use]
    pub const fn from_signals(logged_in: bool, expired: bool) -> Self {
        if expired {
            Self::Expired
        } else if logged_in {
            Self::LoggedIn
        } else {
            Self::LoggedOut
        }
    }

    /// User-facing notice for states that need one.
    #[must_use]
    pub const fn notice(self) -> Option<&'static str> {
        match self {
            Self::Expired => Some("Your session has expired. Please log in again."),
            Self::LoggedIn | Self::LoggedOut => None,
        }
    }

    /// Stable label for logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::LoggedIn => "logged_in",
            Self::Expired => "expired",
        }
    }
}

/// Owner of the session state machine.
#[derive(Debug)]
pub struct SessionManager {
    credentials: CredentialStore,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
    logged_in: watch::Sender<bool>,
    expired: watch::Sender<bool>,
}

impl SessionManager {
    /// Build the manager and compute the initial state from the stored token.
    #[must_use]
    pub fn new(credentials: CredentialStore, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SessionState::LoggedOut);
        let (logged_in, _) = watch::channel(false);
        let (expired, _) = watch::channel(false);
        let manager = Self {
            credentials,
            clock,
            state,
            logged_in,
            expired,
        };
        manager.is_session_valid();
        manager
    }

    /// Build the manager against the system clock.
    #[must_use]
    pub fn with_system_clock(credentials: CredentialStore) -> Self {
        Self::new(credentials, Arc::new(SystemClock))
    }

    /// Re-derive the state from the stored token.
    ///
    /// Finding an expired or unreadable token moves to `Expired` and clears
    /// the stored credential.
    pub fn is_session_valid(&self) -> bool {
        let Some(stored) = self.credentials.read() else {
            self.transition(SessionState::LoggedOut);
            return false;
        };
        if token::is_expired(&stored, self.clock.now_ms()) {
            tracing::info!("stored token expired; clearing credential");
            self.credentials.clear();
            self.transition(SessionState::Expired);
            return false;
        }
        self.transition(SessionState::LoggedIn);
        true
    }

    /// Persist a freshly issued token pair and enter `LoggedIn`.
    pub fn start_session(&self, access_token: &str, refresh_token: Option<&str>) {
        self.credentials.save(access_token);
        match refresh_token {
            Some(refresh) => self.credentials.save_refresh(refresh),
            None => self.credentials.clear_refresh(),
        }
        self.transition(SessionState::LoggedIn);
    }

    /// Log out: clear the credential and enter `LoggedOut`.
    pub fn end_session(&self) {
        self.credentials.clear();
        self.transition(SessionState::LoggedOut);
    }

    /// Record that the backend rejected the credential.
    pub fn mark_expired(&self) {
        self.credentials.clear();
        self.transition(SessionState::Expired);
    }

    /// Acknowledge an expiry notice: `Expired` becomes `LoggedOut`.
    pub fn reset_session_expired_flag(&self) {
        if self.state() == SessionState::Expired {
            self.transition(SessionState::LoggedOut);
        }
    }

    /// Current state without re-checking the token.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// State folded from the two published signals.
    #[must_use]
    pub fn status(&self) -> SessionState {
        SessionState::from_signals(*self.logged_in.borrow(), *self.expired.borrow())
    }

    /// Subject of the stored token, if readable.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.credentials
            .read()
            .and_then(|stored| token::decode(&stored))
            .and_then(|claims| claims.subject)
    }

    /// Milliseconds left on the stored token.
    #[must_use]
    pub fn remaining_millis(&self) -> u64 {
        self.credentials
            .read()
            .map_or(0, |stored| token::remaining_millis(&stored, self.clock.now_ms()))
    }

    /// Credential store backing this session.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Observe the combined state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Observe the "is logged in" signal.
    #[must_use]
    pub fn subscribe_logged_in(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    /// Observe the "session just expired" signal.
    #[must_use]
    pub fn subscribe_expired(&self) -> watch::Receiver<bool> {
        self.expired.subscribe()
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state();
        self.state.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
        publish(&self.logged_in, next == SessionState::LoggedIn);
        publish(&self.expired, next == SessionState::Expired);
        if previous != next {
            tracing::info!(
                from = previous.as_str(),
                to = next.as_str(),
                "session state changed"
            );
        }
    }
}

fn publish(sender: &watch::Sender<bool>, value: bool) {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
