//! Command handlers grouped by resource.

pub(crate) mod auth;
pub(crate) mod catalog;
pub(crate) mod customers;
pub(crate) mod menu;
pub(crate) mod withdrawals;

use std::future::Future;

use tavola_api_models::{Page, PageRequest};
use tavola_client::{ApiError, ListController, ListItem, LoadOutcome};

use crate::client::{CliError, CliResult, classify_api_error};

/// Load pages into `list` until `id` shows up or `scan_pages` pages were read.
pub(crate) async fn locate<T, F, Fut>(
    list: &ListController<T>,
    id: &str,
    scan_pages: u32,
    fetch: F,
) -> CliResult<()>
where
    T: ListItem,
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    list.reload(&fetch).await.map_err(classify_api_error)?;
    let mut scanned = 1;
    while list.record(id).is_none() && scanned < scan_pages.max(1) {
        match list.load_next(&fetch).await.map_err(classify_api_error)? {
            LoadOutcome::Applied { .. } => scanned += 1,
            LoadOutcome::Cached { .. } | LoadOutcome::Exhausted | LoadOutcome::Abandoned => break,
        }
    }
    if list.record(id).is_none() {
        return Err(CliError::validation(format!(
            "no record with id '{id}' in the first {scanned} page(s); raise --scan-pages to look further"
        )));
    }
    Ok(())
}
