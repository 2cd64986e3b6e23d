use tavola_api_models::Withdrawal;
use tavola_client::{ListController, change_withdrawal_status};

use crate::cli::{OutputFormat, PageArgs, WithdrawalStatusArgs, require_page};
use crate::client::{
    AppContext, CliError, CliResult, classify_api_error, classify_mutation_error,
};
use crate::commands::locate;
use crate::output::{render_list, render_record};

pub(crate) async fn handle_withdrawals_list(
    ctx: &AppContext,
    args: PageArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let request = require_page(args)?;
    let page = ctx
        .api
        .withdrawals(request)
        .await
        .map_err(classify_api_error)?;
    render_list(&page.data, page.pagination, output)
}

pub(crate) async fn handle_withdrawal_status(
    ctx: &AppContext,
    args: WithdrawalStatusArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let note = match args.note.as_deref().map(str::trim) {
        Some("") => return Err(CliError::validation("note cannot be empty")),
        Some(note) => Some(note.to_string()),
        None => None,
    };

    let api = &ctx.api;
    let list = ListController::<Withdrawal>::new();
    locate(&list, &args.id, args.scan_pages, move |page| {
        api.withdrawals(page)
    })
    .await?;

    let updated = change_withdrawal_status(api, &list, &args.id, args.status, note)
        .await
        .map_err(classify_mutation_error)?;
    render_record(&updated, output)
}
