//! Output formatting: shell tables, JSON, YAML.
//!
//! Object rows render through the core formatter in `table` mode and
//! through serde otherwise. Listings the core formatter doesn't own
//! (user data, formats, completions) use `tabled`.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use sdnsh_core::Completions;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Print advisory messages collected by the session to stderr.
pub fn print_warnings(warnings: &[String], mode: ColorMode) {
    let color = should_color(mode);
    let mut stderr = io::stderr().lock();
    for warning in warnings {
        if color {
            let _ = writeln!(stderr, "{} {warning}", "warning:".yellow().bold());
        } else {
            let _ = writeln!(stderr, "warning: {warning}");
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render serializable data, using `table_fn` for the table format.
pub fn render<T>(
    format: OutputFormat,
    data: &T,
    table_fn: impl FnOnce(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(table_fn(data)),
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(serialize_err),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(serialize_err),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(serialize_err),
    }
}

/// Render a list through its `Tabled` rows in table mode.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    render(format, data, |items| {
        if items.is_empty() {
            return "None.".into();
        }
        let rows: Vec<R> = items.iter().map(to_row).collect();
        Table::new(rows).with(Style::rounded()).to_string()
    })
}

/// Two columns of candidate and reason, sorted, without a header.
pub fn render_completions(completions: &Completions) -> String {
    if completions.is_empty() {
        return String::new();
    }
    let mut builder = Builder::default();
    for (text, reason) in completions.sorted() {
        builder.push_record([text, reason]);
    }
    builder.build().with(Style::blank()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn serialize_err(e: impl std::fmt::Display) -> CliError {
    CliError::Internal(format!("failed to serialize output: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn structured_formats_bypass_the_table() {
        let data = json!([{"dpid": "00:00:00:00:00:00:00:01"}]);
        let out = render(OutputFormat::JsonCompact, &data, |_| unreachable!()).unwrap();
        assert_eq!(out, r#"[{"dpid":"00:00:00:00:00:00:00:01"}]"#);

        let out = render(OutputFormat::Yaml, &data, |_| unreachable!()).unwrap();
        assert!(out.contains("dpid: 00:00:00:00:00:00:00:01"));
    }

    #[test]
    fn completions_render_sorted_with_reasons() {
        let mut completions = Completions::new();
        completions.insert("switch ", "Switch selection");
        completions.insert("host ", "Host selection");
        let out = render_completions(&completions);
        let host = out.find("host").unwrap();
        let switch = out.find("switch").unwrap();
        assert!(host < switch);
        assert!(out.contains("Switch selection"));
    }
}
