//! Store and campaign listings, served from the local snapshot when the
//! backend cannot be reached.

use std::future::Future;

use tavola_api_models::{Campaign, Page, PageRequest, Store};
use tavola_client::{ApiError, ListController, ListItem, LoadOutcome};
use tavola_session::SnapshotKey;

use crate::cli::{OutputFormat, PageArgs, require_page};
use crate::client::{AppContext, CliResult, classify_api_error};
use crate::output::{TableRow, render_list};

pub(crate) async fn handle_stores_list(
    ctx: &AppContext,
    args: PageArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let api = &ctx.api;
    list_with_snapshot::<Store, _, _>(ctx, SnapshotKey::Stores, args, output, move |page| {
        api.stores(page)
    })
    .await
}

pub(crate) async fn handle_campaigns_list(
    ctx: &AppContext,
    args: PageArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let api = &ctx.api;
    list_with_snapshot::<Campaign, _, _>(ctx, SnapshotKey::Campaigns, args, output, move |page| {
        api.campaigns(page)
    })
    .await
}

async fn list_with_snapshot<T, F, Fut>(
    ctx: &AppContext,
    key: SnapshotKey,
    args: PageArgs,
    output: OutputFormat,
    fetch: F,
) -> CliResult<()>
where
    T: ListItem + TableRow,
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let request = require_page(args)?;
    if request.page > 1 {
        // Only the first page is snapshotted.
        let page = fetch(request).await.map_err(classify_api_error)?;
        return render_list(&page.data, page.pagination, output);
    }

    let list = ListController::<T>::with_snapshot(ctx.snapshots.clone(), key)
        .with_page_size(request.limit);
    let outcome = list.reload(&fetch).await.map_err(classify_api_error)?;
    let state = list.snapshot();
    match outcome {
        LoadOutcome::Cached { rows } => {
            eprintln!("warning: backend unreachable; showing {rows} cached row(s)");
            render_list(&state.records(), None, output)
        }
        _ => render_list(&state.records(), state.pagination(), output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::commands::testing::{context_for, page};
    use httpmock::prelude::*;
    use serde_json::json;
    use tavola_client::ClientConfig;
    use tavola_session::{FileStore, KeyValueStore, SnapshotCache};

    #[tokio::test]
    async fn first_page_is_saved_as_snapshot() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/admin/stores")
                .query_param("limit", "10");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page(&json!([{"id": "s1", "name": "Centro", "isActive": true}]), false));
        });

        let ctx = context_for(&server)?;
        handle_stores_list(&ctx, PageArgs { page: 1, limit: 10 }, OutputFormat::Json)
            .await
            .map_err(|e| anyhow::anyhow!(e.display_message()))?;
        let cached: Option<Vec<Store>> = ctx.snapshots.load(SnapshotKey::Stores);
        assert_eq!(cached.map(|rows| rows.len()), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_falls_back_to_snapshot() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path())?);
        SnapshotCache::new(store.clone()).save(
            SnapshotKey::Campaigns,
            &[Campaign {
                id: "c1".into(),
                title: "Summer".into(),
                status: "active".into(),
                discount_percent: Some(15.0),
                starts_at: None,
                ends_at: None,
            }],
        );

        let config = ClientConfig::new("http://127.0.0.1:9")?;
        let ctx = AppContext::build(config, store, None)
            .map_err(|e| anyhow::anyhow!(e.display_message()))?;
        handle_campaigns_list(&ctx, PageArgs::default(), OutputFormat::Table)
            .await
            .map_err(|e| anyhow::anyhow!(e.display_message()))?;
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_without_snapshot_fails() -> anyhow::Result<()> {
        let ctx = AppContext::build(
            ClientConfig::new("http://127.0.0.1:9")?,
            Arc::new(tavola_session::MemoryStore::new()),
            None,
        )
        .map_err(|e| anyhow::anyhow!(e.display_message()))?;
        let err = handle_stores_list(&ctx, PageArgs::default(), OutputFormat::Table)
            .await
            .expect_err("offline without cache");
        assert!(err.display_message().contains("No internet connection"));
        Ok(())
    }
}
