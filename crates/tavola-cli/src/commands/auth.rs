use std::io::{self, IsTerminal};

use anyhow::anyhow;
use tavola_client::{RefreshError, login, logout, refresh};
use tavola_session::SessionState;

use crate::cli::{LoginArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult, classify_api_error, classify_login_error};
use crate::output::{SessionReport, render_session};

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let password = resolve_password(args.password.as_deref())?;
    let response = login(&ctx.api, &ctx.session, &args.email, &password)
        .await
        .map_err(classify_login_error)?;

    let who = response
        .user
        .map(|user| user.name.unwrap_or(user.email))
        .unwrap_or_else(|| args.email.trim().to_string());
    println!("Logged in as {who}");
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) {
    let was_logged_in = ctx.session.state() == SessionState::LoggedIn;
    logout(&ctx.session);
    if was_logged_in {
        println!("Logged out");
    } else {
        println!("No active session");
    }
}

pub(crate) async fn handle_refresh(ctx: &AppContext) -> CliResult<()> {
    match refresh(&ctx.api, &ctx.session).await {
        Ok(_) => {
            println!("Session refreshed");
            Ok(())
        }
        Err(RefreshError::MissingRefreshToken) => Err(CliError::validation(
            "no refresh token stored; run `tavola login`",
        )),
        Err(RefreshError::Api(error)) => Err(classify_api_error(error)),
    }
}

pub(crate) fn handle_session(ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    let state = ctx.session.status();
    let report = SessionReport::new(state, ctx.session.subject(), ctx.session.remaining_millis());
    render_session(&report, output)?;
    if state == SessionState::Expired {
        ctx.session.reset_session_expired_flag();
    }
    Ok(())
}

fn resolve_password(supplied: Option<&str>) -> CliResult<String> {
    if let Some(value) = supplied {
        if value.is_empty() {
            return Err(CliError::validation("password cannot be empty"));
        }
        return Ok(value.to_string());
    }

    if io::stdin().is_terminal() {
        let pass = rpassword::prompt_password("Password: ").map_err(|err| {
            CliError::failure(anyhow!("failed to read password from stdin: {err}"))
        })?;
        if pass.is_empty() {
            return Err(CliError::validation("password cannot be empty"));
        }
        Ok(pass)
    } else {
        Err(CliError::validation(
            "password required; supply via --password or TAVOLA_PASSWORD when running non-interactively",
        ))
    }
}
