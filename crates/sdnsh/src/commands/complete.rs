//! `complete`: tab-completion candidates for one partial word.

use serde::Serialize;
use serde_json::Value;

use sdnsh_core::complete::complete_staticflow_actions;
use sdnsh_core::{CompletionRequest, Completions, OtherSpec, Row, Session};

use crate::cli::{CompleteArgs, CompleteCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::parse_filters;

#[derive(Serialize)]
struct Candidate<'a> {
    text: &'a str,
    reason: &'a str,
}

pub async fn handle(session: &Session, args: CompleteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut completions = Completions::new();

    match args.command {
        CompleteCommand::Field {
            obj_type,
            field,
            text,
            filters,
        } => {
            let req = CompletionRequest::new(&obj_type, &field, &text).with_data(parse_filters(&filters)?);
            session.complete_object_field(&req, &mut completions).await?;
        }
        CompleteCommand::From {
            obj_type,
            field,
            other,
            text,
        } => {
            let other: OtherSpec = other.parse()?;
            let req = CompletionRequest::new(&obj_type, &field, &text).with_other(other);
            session.complete_from_another(&req, &mut completions).await?;
        }
        CompleteCommand::RunningConfig { text } => {
            session.complete_running_config(&text, &mut completions).await;
        }
        CompleteCommand::Interfaces { switch, text } => {
            let dpid = session.convert_alias_to_object_key("switch-config", &switch).await;
            let data = Row::from_iter([("switch".to_owned(), Value::String(dpid))]);
            session.complete_interface_list(&text, &data, &mut completions).await?;
        }
        CompleteCommand::Config { text } => {
            session.complete_config(&text, &Row::new(), true, &mut completions).await?;
        }
        CompleteCommand::Logs { text } => {
            session.complete_log_names(&text, &Row::new(), &mut completions).await?;
        }
        CompleteCommand::FlowActions { text } => {
            complete_staticflow_actions(&text, &mut completions);
        }
    }

    let candidates: Vec<Candidate<'_>> = completions
        .sorted()
        .into_iter()
        .map(|(text, reason)| Candidate { text, reason })
        .collect();
    let rendered = output::render(global.output, &candidates, |_| output::render_completions(&completions))?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
