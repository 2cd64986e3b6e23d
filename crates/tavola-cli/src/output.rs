//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use serde::Serialize;
use tavola_api_models::{Campaign, Customer, MenuItem, Pagination, Store, Withdrawal};
use tavola_session::SessionState;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Types that know how to print themselves as a table.
pub(crate) trait TableRow {
    fn header() -> String;
    fn row(&self) -> String;
}

impl TableRow for Customer {
    fn header() -> String {
        format!("{:<24} {:<8} {:<10} {:<28} NAME", "ID", "BLOCKED", "STATUS", "EMAIL")
    }

    fn row(&self) -> String {
        format!(
            "{:<24} {:<8} {:<10} {:<28} {}",
            self.id,
            yes_no(self.blocked),
            self.status.as_deref().unwrap_or("-"),
            self.email,
            self.name
        )
    }
}

impl TableRow for Withdrawal {
    fn header() -> String {
        format!("{:<24} {:<10} {:>12} {:<24} NOTE", "ID", "STATUS", "AMOUNT", "USER")
    }

    fn row(&self) -> String {
        format!(
            "{:<24} {:<10} {:>12.2} {:<24} {}",
            self.id,
            self.status.as_str(),
            self.amount,
            self.user_id,
            self.note.as_deref().unwrap_or("")
        )
    }
}

impl TableRow for MenuItem {
    fn header() -> String {
        format!("{:<24} {:<9} {:>10} {:<16} NAME", "ID", "AVAILABLE", "PRICE", "CATEGORY")
    }

    fn row(&self) -> String {
        format!(
            "{:<24} {:<9} {:>10.2} {:<16} {}",
            self.id,
            yes_no(self.is_available),
            self.price,
            self.category.as_deref().unwrap_or("-"),
            self.name
        )
    }
}

impl TableRow for Store {
    fn header() -> String {
        format!("{:<24} {:<6} {:<32} ADDRESS", "ID", "ACTIVE", "NAME")
    }

    fn row(&self) -> String {
        format!(
            "{:<24} {:<6} {:<32} {}",
            self.id,
            yes_no(self.is_active),
            self.name,
            self.address.as_deref().unwrap_or("")
        )
    }
}

impl TableRow for Campaign {
    fn header() -> String {
        format!("{:<24} {:<10} {:>8} {:<12} TITLE", "ID", "STATUS", "DISCOUNT", "ENDS")
    }

    fn row(&self) -> String {
        let discount = self
            .discount_percent
            .map_or_else(|| "-".to_string(), |percent| format!("{percent:.0}%"));
        let ends = self
            .ends_at
            .map_or_else(|| "-".to_string(), |ends| ends.format("%Y-%m-%d").to_string());
        format!(
            "{:<24} {:<10} {:>8} {:<12} {}",
            self.id, self.status, discount, ends, self.title
        )
    }
}

pub(crate) fn format_table<T: TableRow>(rows: &[T], pagination: Option<Pagination>) -> String {
    let mut out = T::header();
    for row in rows {
        out.push('\n');
        out.push_str(&row.row());
    }
    if let Some(pagination) = pagination {
        let _ = write!(
            out,
            "\npage {} of {} total rows{}",
            pagination.page.unwrap_or(1),
            pagination.total,
            if pagination.has_next { " (more available)" } else { "" }
        );
    }
    out
}

pub(crate) fn render_list<T: TableRow + Serialize>(
    rows: &[T],
    pagination: Option<Pagination>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => println!("{}", format_table(rows, pagination)),
    }
    Ok(())
}

pub(crate) fn render_record<T: TableRow + Serialize>(
    record: &T,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(record)?,
        OutputFormat::Table => println!("{}", format_table(std::slice::from_ref(record), None)),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionReport {
    pub(crate) state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) subject: Option<String>,
    pub(crate) remaining_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notice: Option<&'static str>,
}

impl SessionReport {
    pub(crate) fn new(state: SessionState, subject: Option<String>, remaining_ms: u64) -> Self {
        Self {
            state: state.as_str(),
            subject,
            remaining_secs: remaining_ms / 1_000,
            notice: state.notice(),
        }
    }
}

pub(crate) fn render_session(report: &SessionReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("state: {}", report.state);
            if let Some(subject) = &report.subject {
                println!("subject: {subject}");
            }
            if report.remaining_secs > 0 {
                println!("expires in: {}", format_duration(report.remaining_secs));
            }
            if let Some(notice) = report.notice {
                println!("{notice}");
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub(crate) fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
