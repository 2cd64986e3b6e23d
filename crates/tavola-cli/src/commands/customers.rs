use tavola_api_models::Customer;
use tavola_client::{ListController, toggle_customer_block};

use crate::cli::{OutputFormat, PageArgs, RecordArgs, require_page};
use crate::client::{AppContext, CliResult, classify_api_error, classify_mutation_error};
use crate::commands::locate;
use crate::output::{render_list, render_record};

pub(crate) async fn handle_customers_list(
    ctx: &AppContext,
    args: PageArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let request = require_page(args)?;
    let page = ctx
        .api
        .customers(request)
        .await
        .map_err(classify_api_error)?;
    render_list(&page.data, page.pagination, output)
}

/// Block (`block == true`) or unblock a customer.
pub(crate) async fn handle_customer_block(
    ctx: &AppContext,
    args: RecordArgs,
    block: bool,
    output: OutputFormat,
) -> CliResult<()> {
    let api = &ctx.api;
    let list = ListController::<Customer>::new();
    locate(&list, &args.id, args.scan_pages, move |page| api.customers(page)).await?;

    if let Some(current) = list.record(&args.id)
        && current.blocked == block
    {
        eprintln!(
            "customer '{}' is already {}",
            args.id,
            if block { "blocked" } else { "unblocked" }
        );
        return render_record(&current, output);
    }

    let updated = toggle_customer_block(api, &list, &args.id)
        .await
        .map_err(classify_mutation_error)?;
    render_record(&updated, output)
}
