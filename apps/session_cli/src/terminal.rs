//! Terminal rendering of UI port calls and parsing of typed intents.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use session_client::UiPortEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    ChangeNick(String),
    VotingAction(Value),
    Quit,
    Empty,
}

/// `/nick NAME` renames, `/quit` exits, anything else must be a JSON voting action.
pub fn parse_input(line: &str) -> Result<InputCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(InputCommand::Empty);
    }
    if line == "/quit" {
        return Ok(InputCommand::Quit);
    }
    if let Some(rest) = line.strip_prefix("/nick") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            bail!("unknown command: {line}");
        }
        let nick = rest.trim();
        if nick.is_empty() {
            bail!("usage: /nick NAME");
        }
        return Ok(InputCommand::ChangeNick(nick.to_string()));
    }
    if line.starts_with('/') {
        bail!("unknown command: {line}");
    }

    let payload = serde_json::from_str(line).context("voting action must be JSON")?;
    Ok(InputCommand::VotingAction(payload))
}

pub fn render_event(event: &UiPortEvent) -> String {
    json!({
        "port": event.port_name(),
        "payload": event.payload(),
    })
    .to_string()
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
