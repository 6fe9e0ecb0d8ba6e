//! `formats`: the display formats registered with the formatter.

use sdnsh_core::Session;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let details = session.formats().format_details();
    let table = session
        .formats()
        .format_table(&details, None, "default", session.aliases());
    let rendered = output::render(global.output, &details, |_| table)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
