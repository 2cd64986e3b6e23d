use tavola_api_models::MenuItem;
use tavola_client::{ListController, set_menu_availability};

use crate::cli::{MenuAvailabilityArgs, OutputFormat, PageArgs, require_page};
use crate::client::{AppContext, CliResult, classify_api_error, classify_mutation_error};
use crate::commands::locate;
use crate::output::{render_list, render_record};

pub(crate) async fn handle_menu_list(
    ctx: &AppContext,
    args: PageArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let request = require_page(args)?;
    let page = ctx
        .api
        .menu_items(request)
        .await
        .map_err(classify_api_error)?;
    render_list(&page.data, page.pagination, output)
}

pub(crate) async fn handle_menu_availability(
    ctx: &AppContext,
    args: MenuAvailabilityArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let api = &ctx.api;
    let list = ListController::<MenuItem>::new();
    locate(&list, &args.id, args.scan_pages, move |page| api.menu_items(page)).await?;

    let updated = set_menu_availability(api, &list, &args.id, args.available)
        .await
        .map_err(classify_mutation_error)?;
    render_record(&updated, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context_for, page, token};
    use httpmock::prelude::*;
    use serde_json::json;
    use tavola_session::SessionState;

    #[tokio::test]
    async fn availability_patch_carries_flag() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/admin/menu-items");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page(
                    &json!([{"id": "m1", "name": "Margherita", "price": 9.5, "isAvailable": true}]),
                    false,
                ));
        });
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/api/v1/admin/menu-items/m1/availability")
                .json_body(json!({"isAvailable": false}));
            then.status(204);
        });

        let ctx = context_for(&server)?;
        let args = MenuAvailabilityArgs {
            id: "m1".into(),
            available: false,
            scan_pages: 1,
        };
        handle_menu_availability(&ctx, args, OutputFormat::Json)
            .await
            .map_err(|e| anyhow::anyhow!(e.display_message()))?;
        patch.assert();
        Ok(())
    }

    #[tokio::test]
    async fn listing_with_revoked_token_expires_session() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/admin/menu-items");
            then.status(401);
        });

        let ctx = context_for(&server)?;
        ctx.session.start_session(&token("ops"), None);
        let err = handle_menu_list(&ctx, PageArgs::default(), OutputFormat::Table)
            .await
            .expect_err("unauthorized");
        assert!(err.display_message().contains("tavola login"));
        assert_eq!(ctx.session.state(), SessionState::Expired);
        Ok(())
    }
}
