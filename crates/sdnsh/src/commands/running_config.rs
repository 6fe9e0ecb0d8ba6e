//! `running-config`: replayable configuration text.

use sdnsh_core::Session;

use crate::cli::{GlobalOpts, RunningConfigArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    session: &Session,
    args: RunningConfigArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let words: Vec<&str> = args.words.iter().map(String::as_str).collect();
    let version = format!("sdnsh {}", env!("CARGO_PKG_VERSION"));
    let config = session.show_running_config(&words, &version).await?;

    let rendered = output::render(global.output, &config, Clone::clone)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
