//! Typed admin endpoints.

use tavola_api_models::{
    Campaign, Customer, CustomerUpdate, MenuAvailabilityRequest, MenuItem, MenuItemUpdate, Page,
    PageRequest, Store, Withdrawal, WithdrawalStatus, WithdrawalStatusRequest, WithdrawalUpdate,
};

use crate::client::ApiClient;
use crate::error::ApiError;

const ADMIN: [&str; 3] = ["api", "v1", "admin"];

fn admin_path<'a>(rest: &[&'a str]) -> Vec<&'a str> {
    ADMIN.iter().copied().chain(rest.iter().copied()).collect()
}

fn page_query(page: PageRequest) -> [(&'static str, String); 2] {
    [("page", page.page.to_string()), ("limit", page.limit.to_string())]
}

impl ApiClient {
    /// One page of customers.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn customers(&self, page: PageRequest) -> Result<Page<Customer>, ApiError> {
        self.get(&admin_path(&["customers"]), &page_query(page)).await
    }

    /// Block a customer; the backend may answer with the changed fields.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn block_customer(&self, id: &str) -> Result<Option<CustomerUpdate>, ApiError> {
        self.post_empty(&admin_path(&["customers", id, "block"])).await
    }

    /// Unblock a customer.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn unblock_customer(&self, id: &str) -> Result<Option<CustomerUpdate>, ApiError> {
        self.post_empty(&admin_path(&["customers", id, "unblock"])).await
    }

    /// One page of withdrawal requests.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn withdrawals(&self, page: PageRequest) -> Result<Page<Withdrawal>, ApiError> {
        self.get(&admin_path(&["withdrawals"]), &page_query(page)).await
    }

    /// Move a withdrawal to a new status.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn update_withdrawal_status(
        &self,
        id: &str,
        status: WithdrawalStatus,
        note: Option<String>,
    ) -> Result<Option<WithdrawalUpdate>, ApiError> {
        self.patch(
            &admin_path(&["withdrawals", id, "status"]),
            &WithdrawalStatusRequest { status, note },
        )
        .await
    }

    /// One page of menu items.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn menu_items(&self, page: PageRequest) -> Result<Page<MenuItem>, ApiError> {
        self.get(&admin_path(&["menu-items"]), &page_query(page)).await
    }

    /// Toggle whether a menu item can be ordered.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn set_menu_availability(
        &self,
        id: &str,
        is_available: bool,
    ) -> Result<Option<MenuItemUpdate>, ApiError> {
        self.patch(
            &admin_path(&["menu-items", id, "availability"]),
            &MenuAvailabilityRequest { is_available },
        )
        .await
    }

    /// One page of franchise stores.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn stores(&self, page: PageRequest) -> Result<Page<Store>, ApiError> {
        self.get(&admin_path(&["stores"]), &page_query(page)).await
    }

    /// One page of marketing campaigns.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] for any failure.
    pub async fn campaigns(&self, page: PageRequest) -> Result<Page<Campaign>, ApiError> {
        self.get(&admin_path(&["campaigns"]), &page_query(page)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_paths_are_prefixed() {
        assert_eq!(
            admin_path(&["customers", "c1", "block"]),
            vec!["api", "v1", "admin", "customers", "c1", "block"]
        );
    }

    #[test]
    fn page_query_carries_page_and_limit() {
        let query = page_query(PageRequest::first().next());
        assert_eq!(query[0], ("page", "2".to_string()));
        assert_eq!(query[1], ("limit", PageRequest::DEFAULT_LIMIT.to_string()));
    }
}
