//! `show`: rows of an object type through the pretty-print formatter.

use sdnsh_core::Session;

use crate::cli::{GlobalOpts, OutputFormat, ShowArgs};
use crate::error::CliError;
use crate::output;

use super::util::parse_filters;

pub async fn handle(session: &Session, args: ShowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !session.registry().obj_type_exists(&args.obj_type) {
        return Err(CliError::Usage(format!("unknown object type: {}", args.obj_type)));
    }
    let filters = parse_filters(&args.filters)?;
    let rows = session.rest_query(&args.obj_type, &filters).await?;
    tracing::debug!(obj_type = %args.obj_type, rows = rows.len(), "show");

    let format = args.format.as_deref().unwrap_or(&args.obj_type);
    let table = if matches!(global.output, OutputFormat::Table) {
        if args.detail {
            let mut blocks = Vec::with_capacity(rows.len());
            for row in &rows {
                blocks.push(session.format_entry(row, format, &args.view).await);
            }
            if blocks.is_empty() { "None.".to_owned() } else { blocks.join("\n\n") }
        } else {
            session.format_table(&rows, format, &args.view).await
        }
    } else {
        String::new()
    };

    let rendered = output::render(global.output, &rows, |_| table)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
