//! Command dispatch: bridges CLI args -> session operations -> output.

pub mod complete;
pub mod config_cmd;
pub mod formats;
pub mod running_config;
pub mod show;
pub mod user_data;
pub mod util;
pub mod validate;

use sdnsh_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Dispatch a session-bound command to the appropriate handler, then
/// surface any warnings the session collected along the way.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let result = match cmd {
        Command::Show(args) => show::handle(session, args, global).await,
        Command::RunningConfig(args) => running_config::handle(session, args, global).await,
        Command::Complete(args) => complete::handle(session, args, global).await,
        Command::Validate(args) => validate::handle(session, args, global).await,
        Command::UserData(args) => user_data::handle(session, args, global).await,
        Command::Formats => formats::handle(session, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => {
            Err(CliError::Internal("command does not run in a session".into()))
        }
    };
    output::print_warnings(&session.take_warnings(), global.color);
    result
}
