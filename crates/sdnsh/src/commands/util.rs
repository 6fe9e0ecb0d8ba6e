//! Shared helpers for command handlers.

use serde_json::Value;

use sdnsh_core::Row;

use crate::error::CliError;

/// Parse `field=value` words into a query row. A trailing `*` on the
/// value turns the term into a prefix match.
pub fn parse_filters(words: &[String]) -> Result<Row, CliError> {
    let mut row = Row::new();
    for word in words {
        let Some((field, value)) = word.split_once('=') else {
            return Err(CliError::Usage(format!(
                "filter '{word}' is not of the form field=value"
            )));
        };
        if field.is_empty() {
            return Err(CliError::Usage(format!("filter '{word}' names no field")));
        }
        match value.strip_suffix('*') {
            Some(prefix) => row.insert(format!("{field}__startswith"), Value::String(prefix.to_owned())),
            None => row.insert(field.to_owned(), Value::String(value.to_owned())),
        };
    }
    Ok(row)
}
