// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commands typed on stdin.

use crate::view::SharedRows;
use jestview_runner::coordinator::CoordinatorCommand;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

pub(crate) const HELP: &str = "commands: r (restart), o <row>... (open rows), q (quit)";

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum InputCommand {
    Restart,
    Open(Vec<usize>),
    Quit,
    Help,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub(crate) enum InputParseError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("invalid row `{0}`: expected a number")]
    InvalidRow(String),

    #[error("`o` needs at least one row number")]
    NoRows,
}

/// Parses one line of input. Blank lines parse to `None`.
pub(crate) fn parse_input(line: &str) -> Result<Option<InputCommand>, InputParseError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let command = match command {
        "r" | "restart" => InputCommand::Restart,
        "q" | "quit" => InputCommand::Quit,
        "h" | "help" | "?" => InputCommand::Help,
        "o" | "open" => {
            let rows = words
                .map(|word| {
                    word.parse::<usize>()
                        .ok()
                        .filter(|&row| row > 0)
                        .ok_or_else(|| InputParseError::InvalidRow(word.to_owned()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if rows.is_empty() {
                return Err(InputParseError::NoRows);
            }
            InputCommand::Open(rows)
        }
        other => return Err(InputParseError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(command))
}

/// Turns a parsed command into a coordinator command, resolving rows against the last rendered
/// tree.
pub(crate) fn to_coordinator_command(
    command: InputCommand,
    rows: &SharedRows,
) -> Option<CoordinatorCommand> {
    match command {
        InputCommand::Restart => Some(CoordinatorCommand::Restart),
        InputCommand::Quit => Some(CoordinatorCommand::Shutdown),
        InputCommand::Help => {
            info!("{HELP}");
            None
        }
        InputCommand::Open(numbers) => {
            let rows = rows.lock().unwrap_or_else(|err| err.into_inner());
            let selection: Vec<_> = numbers
                .into_iter()
                .filter_map(|number| {
                    let node = rows.get(number - 1).cloned();
                    if node.is_none() {
                        warn!("no row {number} in the current tree");
                    }
                    node
                })
                .collect();
            (!selection.is_empty()).then_some(CoordinatorCommand::OpenSelection(selection))
        }
    }
}

/// Reads commands from stdin until EOF or `q`. EOF shuts the coordinator down.
pub(crate) async fn read_commands(
    rows: SharedRows,
    sender: mpsc::UnboundedSender<CoordinatorCommand>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("error reading stdin: {err}");
                break;
            }
        };

        let command = match parse_input(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                warn!("{err} ({HELP})");
                continue;
            }
        };
        if let Some(command) = to_coordinator_command(command, &rows) {
            let is_shutdown = command == CoordinatorCommand::Shutdown;
            if sender.send(command).is_err() || is_shutdown {
                return;
            }
        }
    }
    _ = sender.send(CoordinatorCommand::Shutdown);
}
