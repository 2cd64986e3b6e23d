//! Optimistic record mutations with rollback.
//!
//! # Design
//! - A mutation runs capture, apply, remote call, then reconcile or rollback.
//!   The tentative change is visible before the remote call is awaited.
//! - Mutations on the same record id are serialized through [`RecordLocks`];
//!   different ids proceed concurrently.
//! - Rollback restores the captured record verbatim. Reconcile lets server
//!   fields win over the tentative ones.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tavola_api_models::{
    Customer, CustomerUpdate, MenuItem, MenuItemUpdate, Withdrawal, WithdrawalStatus,
    WithdrawalUpdate,
};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::client::ApiClient;
use crate::error::{ApiError, ErrorCategory};
use crate::list::{ListController, ListItem};

/// One async lock per record id.
#[derive(Debug, Default)]
pub struct RecordLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while a mutation on one record is in flight.
#[derive(Debug)]
pub struct RecordGuard {
    _guard: OwnedMutexGuard<()>,
}

impl RecordLocks {
    /// Wait until no other mutation holds `id`.
    pub async fn acquire(&self, id: &str) -> RecordGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        RecordGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Ids currently tracked (held or awaited).
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}

/// Failure of an optimistic mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    /// No row with the id is loaded.
    #[error("record not found in list")]
    UnknownRecord {
        /// Requested id.
        id: String,
    },
    /// The remote call failed; the row was rolled back.
    #[error(transparent)]
    Rejected(#[from] ApiError),
}

impl MutationError {
    /// Error category for display.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRecord { .. } => ErrorCategory::NotFound,
            Self::Rejected(error) => error.category,
        }
    }
}

impl<T: ListItem> ListController<T> {
    /// Apply a change optimistically and confirm it remotely.
    ///
    /// `apply` edits the tentative copy, `remote` receives that copy, and
    /// `reconcile` merges the server response into it. On failure the row
    /// returns to the captured value, unless a reload replaced the row in the
    /// meantime. After [`ListController::close`] the result is returned but
    /// no longer written to the list.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::UnknownRecord`] when the id is not loaded, or
    /// [`MutationError::Rejected`] with the remote failure.
    pub async fn mutate<S, A, R, Fut, C>(
        &self,
        id: &str,
        label: &'static str,
        apply: A,
        remote: R,
        reconcile: C,
    ) -> Result<T, MutationError>
    where
        A: FnOnce(&mut T),
        R: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<S, ApiError>>,
        C: FnOnce(&mut T, S),
    {
        let _record = self.locks().acquire(id).await;

        let (captured, mut tentative) = {
            let mut state = self.lock();
            let captured = state.record(id).ok_or_else(|| MutationError::UnknownRecord {
                id: id.to_string(),
            })?;
            let mut tentative = captured.clone();
            apply(&mut tentative);
            state.replace(tentative.clone());
            state.mark_pending(id, label);
            (captured, tentative)
        };

        let result = remote(tentative.clone()).await;
        let closed = self.is_closed();

        match result {
            Ok(server) => {
                reconcile(&mut tentative, server);
                if !closed {
                    let mut state = self.lock();
                    state.replace(tentative.clone());
                    state.clear_pending(id);
                }
                tracing::debug!(id, label, "optimistic change confirmed");
                Ok(tentative)
            }
            Err(error) => {
                if !closed {
                    let mut state = self.lock();
                    if state.record(id).as_ref() == Some(&tentative) {
                        state.replace(captured);
                    } else {
                        tracing::debug!(id, label, "row reloaded while in flight; keeping loaded value");
                    }
                    state.clear_pending(id);
                }
                tracing::debug!(id, label, category = %error.category, "optimistic change rolled back");
                Err(MutationError::Rejected(error))
            }
        }
    }
}

/// Flip a customer's blocked flag.
///
/// # Errors
///
/// See [`ListController::mutate`].
pub async fn toggle_customer_block(
    client: &ApiClient,
    list: &ListController<Customer>,
    id: &str,
) -> Result<Customer, MutationError> {
    let label = match list.record(id) {
        Some(customer) if customer.blocked => "unblock",
        _ => "block",
    };
    list.mutate(
        id,
        label,
        |customer| {
            customer.blocked = !customer.blocked;
            customer.status = Some(if customer.blocked { "blocked" } else { "active" }.to_string());
        },
        |customer| async move {
            if customer.blocked {
                client.block_customer(&customer.id).await
            } else {
                client.unblock_customer(&customer.id).await
            }
        },
        |customer, server: Option<CustomerUpdate>| {
            if let Some(update) = server {
                update.apply_to(customer);
            }
        },
    )
    .await
}

/// Move a withdrawal to `status`.
///
/// # Errors
///
/// See [`ListController::mutate`].
pub async fn change_withdrawal_status(
    client: &ApiClient,
    list: &ListController<Withdrawal>,
    id: &str,
    status: WithdrawalStatus,
    note: Option<String>,
) -> Result<Withdrawal, MutationError> {
    let tentative_status = status.clone();
    let tentative_note = note.clone();
    list.mutate(
        id,
        "status",
        move |withdrawal| {
            withdrawal.status = tentative_status;
            if tentative_note.is_some() {
                withdrawal.note = tentative_note;
            }
        },
        |withdrawal| async move {
            client
                .update_withdrawal_status(&withdrawal.id, status, note)
                .await
        },
        |withdrawal, server: Option<WithdrawalUpdate>| {
            if let Some(update) = server {
                update.apply_to(withdrawal);
            }
        },
    )
    .await
}

/// Set whether a menu item can be ordered.
///
/// # Errors
///
/// See [`ListController::mutate`].
pub async fn set_menu_availability(
    client: &ApiClient,
    list: &ListController<MenuItem>,
    id: &str,
    is_available: bool,
) -> Result<MenuItem, MutationError> {
    list.mutate(
        id,
        "availability",
        |item| item.is_available = is_available,
        |item| async move { client.set_menu_availability(&item.id, is_available).await },
        |item, server: Option<MenuItemUpdate>| {
            if let Some(update) = server {
                update.apply_to(item);
            }
        },
    )
    .await
}
