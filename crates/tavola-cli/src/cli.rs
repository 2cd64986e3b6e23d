//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tavola_api_models::WithdrawalStatus;
use tavola_client::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, UnauthorizedPolicy};
use tavola_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::auth::{handle_login, handle_logout, handle_refresh, handle_session};
use crate::commands::catalog::{handle_campaigns_list, handle_stores_list};
use crate::commands::customers::{handle_customer_block, handle_customers_list};
use crate::commands::menu::{handle_menu_availability, handle_menu_list};
use crate::commands::withdrawals::{handle_withdrawal_status, handle_withdrawals_list};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("command", command = command_name, trace_id = %trace_id);

    let result = async move {
        let ctx = AppContext::from_cli(&cli, &trace_id)?;
        dispatch(cli, &ctx).await
    }
    .instrument(span)
    .await;

    match result {
        Ok(()) => 0,
        Err(err) => {
            let exit_code = err.exit_code();
            tracing::debug!(command = command_name, exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

pub(crate) async fn dispatch(cli: Cli, ctx: &AppContext) -> CliResult<()> {
    let output = cli.output;
    match cli.command {
        Command::Login(args) => handle_login(ctx, args).await,
        Command::Logout => {
            handle_logout(ctx);
            Ok(())
        }
        Command::Refresh => handle_refresh(ctx).await,
        Command::Session => handle_session(ctx, output),
        Command::Customers(command) => match command {
            CustomerCommand::Ls(args) => handle_customers_list(ctx, args, output).await,
            CustomerCommand::Block(args) => handle_customer_block(ctx, args, true, output).await,
            CustomerCommand::Unblock(args) => {
                handle_customer_block(ctx, args, false, output).await
            }
        },
        Command::Withdrawals(command) => match command {
            WithdrawalCommand::Ls(args) => handle_withdrawals_list(ctx, args, output).await,
            WithdrawalCommand::SetStatus(args) => {
                handle_withdrawal_status(ctx, args, output).await
            }
        },
        Command::Menu(command) => match command {
            MenuCommand::Ls(args) => handle_menu_list(ctx, args, output).await,
            MenuCommand::Availability(args) => handle_menu_availability(ctx, args, output).await,
        },
        Command::Stores(StoresCommand::Ls(args)) => handle_stores_list(ctx, args, output).await,
        Command::Campaigns(CampaignsCommand::Ls(args)) => {
            handle_campaigns_list(ctx, args, output).await
        }
    }
}

#[derive(Parser)]
#[command(name = "tavola", about = "Administrative CLI for the Tavola platform")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "TAVOLA_API_URL", default_value = DEFAULT_API_URL)]
    pub(crate) api_url: String,
    #[arg(long, global = true, env = "TAVOLA_API_KEY")]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TAVOLA_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "TAVOLA_STATE_DIR",
        help = "Directory holding the stored session and cached lists"
    )]
    pub(crate) state_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "TAVOLA_ON_UNAUTHORIZED",
        value_parser = parse_policy,
        default_value = "logout",
        help = "Reaction to HTTP 401: passthrough, logout, or refresh"
    )]
    pub(crate) on_unauthorized: UnauthorizedPolicy,
    #[arg(long, global = true, env = "TAVOLA_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "TAVOLA_LOG_FORMAT", value_parser = parse_log_format)]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Authenticate and store the session token.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Exchange the stored refresh token for a new session token.
    Refresh,
    /// Show the current session state.
    Session,
    #[command(subcommand)]
    Customers(CustomerCommand),
    #[command(subcommand)]
    Withdrawals(WithdrawalCommand),
    #[command(subcommand)]
    Menu(MenuCommand),
    #[command(subcommand)]
    Stores(StoresCommand),
    #[command(subcommand)]
    Campaigns(CampaignsCommand),
}

#[derive(Subcommand)]
pub(crate) enum CustomerCommand {
    Ls(PageArgs),
    Block(RecordArgs),
    Unblock(RecordArgs),
}

#[derive(Subcommand)]
pub(crate) enum WithdrawalCommand {
    Ls(PageArgs),
    SetStatus(WithdrawalStatusArgs),
}

#[derive(Subcommand)]
pub(crate) enum MenuCommand {
    Ls(PageArgs),
    Availability(MenuAvailabilityArgs),
}

#[derive(Subcommand)]
pub(crate) enum StoresCommand {
    Ls(PageArgs),
}

#[derive(Subcommand)]
pub(crate) enum CampaignsCommand {
    Ls(PageArgs),
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long, env = "TAVOLA_EMAIL")]
    pub(crate) email: String,
    #[arg(long, env = "TAVOLA_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args, Clone, Copy)]
pub(crate) struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
    #[arg(long, default_value_t = tavola_api_models::PageRequest::DEFAULT_LIMIT)]
    pub(crate) limit: u32,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            page: 1,
            limit: tavola_api_models::PageRequest::DEFAULT_LIMIT,
        }
    }
}

#[derive(Args)]
pub(crate) struct RecordArgs {
    #[arg(help = "Record identifier")]
    pub(crate) id: String,
    #[arg(
        long,
        default_value_t = 5,
        help = "Pages to scan when looking the record up"
    )]
    pub(crate) scan_pages: u32,
}

#[derive(Args)]
pub(crate) struct WithdrawalStatusArgs {
    #[arg(help = "Withdrawal identifier")]
    pub(crate) id: String,
    #[arg(value_parser = parse_withdrawal_status)]
    pub(crate) status: WithdrawalStatus,
    #[arg(long, help = "Moderator note stored with the change")]
    pub(crate) note: Option<String>,
    #[arg(long, default_value_t = 5)]
    pub(crate) scan_pages: u32,
}

#[derive(Args)]
pub(crate) struct MenuAvailabilityArgs {
    #[arg(help = "Menu item identifier")]
    pub(crate) id: String,
    #[arg(action = clap::ArgAction::Set, help = "true to offer the item, false to hide it")]
    pub(crate) available: bool,
    #[arg(long, default_value_t = 5)]
    pub(crate) scan_pages: u32,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Refresh => "refresh",
        Command::Session => "session",
        Command::Customers(CustomerCommand::Ls(_)) => "customers_ls",
        Command::Customers(CustomerCommand::Block(_)) => "customers_block",
        Command::Customers(CustomerCommand::Unblock(_)) => "customers_unblock",
        Command::Withdrawals(WithdrawalCommand::Ls(_)) => "withdrawals_ls",
        Command::Withdrawals(WithdrawalCommand::SetStatus(_)) => "withdrawals_set_status",
        Command::Menu(MenuCommand::Ls(_)) => "menu_ls",
        Command::Menu(MenuCommand::Availability(_)) => "menu_availability",
        Command::Stores(_) => "stores_ls",
        Command::Campaigns(_) => "campaigns_ls",
    }
}

fn parse_policy(input: &str) -> Result<UnauthorizedPolicy, String> {
    input.parse().map_err(|err| format!("{err}"))
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse()
}

fn parse_withdrawal_status(input: &str) -> Result<WithdrawalStatus, String> {
    WithdrawalStatus::parse(input).ok_or_else(|| {
        format!("unknown status '{input}' (expected pending, approved, rejected, or paid)")
    })
}

pub(crate) fn require_page(args: PageArgs) -> CliResult<tavola_api_models::PageRequest> {
    if args.page == 0 {
        return Err(CliError::validation("page numbers start at 1"));
    }
    if args.limit == 0 || args.limit > 100 {
        return Err(CliError::validation("limit must be between 1 and 100"));
    }
    Ok(tavola_api_models::PageRequest {
        page: args.page,
        limit: args.limit,
    })
}
