//! Server command shell.

use std::fmt;

use peril_client::GameServer;
use peril_pubsub::PubSubError;

const HELP: &str = "\
commands:
  pause     pause the game for every player
  resume    resume the game
  help      show this text
  quit      stop the server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Pause,
    Resume,
}

#[derive(Debug)]
pub enum ShellError {
    Usage(String),
    Server(PubSubError),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Usage(usage) => write!(f, "usage: {usage}"),
            ShellError::Server(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ShellError {}

impl From<PubSubError> for ShellError {
    fn from(e: PubSubError) -> Self {
        ShellError::Server(e)
    }
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ShellError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&first, rest)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (first.to_ascii_lowercase().as_str(), rest) {
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("pause", []) => Command::Pause,
        ("resume", []) => Command::Resume,
        (other, _) => {
            return Err(ShellError::Usage(format!(
                "unknown command '{other}', type 'help' for a list"
            )));
        }
    };
    Ok(Some(command))
}

pub enum Flow {
    Continue(String),
    Quit,
}

pub async fn execute(server: &GameServer, command: Command) -> Result<Flow, ShellError> {
    let output = match command {
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Flow::Quit),
        Command::Pause => {
            server.pause().await?;
            "game paused".to_string()
        }
        Command::Resume => {
            server.resume().await?;
            "game resumed".to_string()
        }
    };
    Ok(Flow::Continue(output))
}

pub async fn run_line(server: &GameServer, line: &str) -> Result<Flow, ShellError> {
    match parse(line)? {
        Some(command) => execute(server, command).await,
        None => Ok(Flow::Continue(String::new())),
    }
}
