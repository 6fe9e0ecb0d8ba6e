//! `user-data`: versioned text files kept in the controller's data store.

use std::path::Path;

use serde::Serialize;
use tabled::Tabled;
use tokio::io::AsyncReadExt;

use sdnsh_api::{UserDataEntry, VersionSelector};
use sdnsh_core::Session;

use crate::cli::{GlobalOpts, UserDataArgs, UserDataCommand};
use crate::error::CliError;
use crate::output;

#[derive(Clone, Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Length")]
    length: usize,
    #[tabled(skip)]
    full_name: String,
}

impl From<&UserDataEntry> for EntryRow {
    fn from(entry: &UserDataEntry) -> Self {
        Self {
            name: entry.id.name.clone(),
            version: entry.id.version,
            timestamp: entry.id.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            length: entry.id.length,
            full_name: entry.full_name.clone(),
        }
    }
}

pub async fn handle(session: &Session, args: UserDataArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = session.store();
    match args.command {
        UserDataCommand::List { name, version } => {
            let selector: VersionSelector = version.parse().map_err(CliError::Usage)?;
            let entries = store
                .get_user_data_table(name.as_deref(), selector)
                .await
                .map_err(sdnsh_core::CoreError::from)?;
            let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
            let rendered = output::render_list(global.output, &rows, Clone::clone)?;
            output::print_output(&rendered, global.quiet);
        }
        UserDataCommand::Get { name } => {
            let text = store
                .get_user_data_file(&name)
                .await
                .map_err(sdnsh_core::CoreError::from)?;
            output::print_output(text.trim_end_matches('\n'), global.quiet);
        }
        UserDataCommand::Set { name, file } => {
            let text = read_source(&file).await?;
            let id = store
                .set_user_data_file(&name, &text)
                .await
                .map_err(sdnsh_core::CoreError::from)?;
            tracing::info!(%id, "stored user data");
            output::print_output(&id.to_string(), global.quiet);
        }
        UserDataCommand::Delete { name } => {
            store
                .delete_user_data_file(&name)
                .await
                .map_err(sdnsh_core::CoreError::from)?;
        }
    }
    Ok(())
}

/// File contents, or stdin for `-`.
async fn read_source(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }
    Ok(tokio::fs::read_to_string(path).await?)
}
