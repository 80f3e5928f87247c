//! Player command shell.

use std::fmt;

use peril_client::{Session, SessionError};
use peril_shared::{GameView, Territory, UnitRank};

const HELP: &str = "\
commands:
  spawn <territory> <rank>           place a unit on a territory you hold or that is free
  move <from> <to> <rank> [<rank>...]
                                     move units to an adjacent territory
  status                             show your territories and what you know of others
  spam <count>                       flood the game log with random lines
  help                               show this text
  quit                               leave the game";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Spawn {
        territory: String,
        rank: String,
    },
    Move {
        from: String,
        to: String,
        units: Vec<String>,
    },
    Status,
    Spam(usize),
}

#[derive(Debug)]
pub enum ReplError {
    Usage(String),
    Session(SessionError),
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplError::Usage(usage) => write!(f, "usage: {usage}"),
            ReplError::Session(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReplError {}

impl From<SessionError> for ReplError {
    fn from(e: SessionError) -> Self {
        ReplError::Session(e)
    }
}

fn usage(text: &str) -> ReplError {
    ReplError::Usage(text.to_string())
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ReplError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (verb.to_ascii_lowercase().as_str(), args) {
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("spawn", [territory, rank]) => Command::Spawn {
            territory: territory.to_ascii_lowercase(),
            rank: rank.to_string(),
        },
        ("spawn", _) => return Err(usage("spawn <territory> <rank>")),
        ("move", [from, to, units @ ..]) if !units.is_empty() => Command::Move {
            from: from.to_ascii_lowercase(),
            to: to.to_ascii_lowercase(),
            units: units.iter().map(|unit| unit.to_string()).collect(),
        },
        ("move", _) => return Err(usage("move <from> <to> <rank> [<rank>...]")),
        ("status", []) => Command::Status,
        ("status", _) => return Err(usage("status")),
        ("spam", [count]) => match count.parse::<usize>() {
            Ok(count) => Command::Spam(count),
            Err(_) => return Err(usage("spam <count>")),
        },
        ("spam", _) => return Err(usage("spam <count>")),
        (other, _) => {
            return Err(ReplError::Usage(format!(
                "unknown command '{other}', type 'help' for a list"
            )));
        }
    };
    Ok(Some(command))
}

fn describe_units(units: &[UnitRank]) -> String {
    let names: Vec<&str> = units.iter().map(|unit| unit.as_str()).collect();
    names.join(", ")
}

fn describe_territory(territory: &Territory) -> String {
    format!("{}: {}", territory.name, describe_units(&territory.units))
}

pub fn format_status(view: &GameView) -> String {
    let mut out = format!(
        "{} ({})",
        view.player.username,
        if view.paused { "paused" } else { "running" }
    );
    if view.player.locations.is_empty() {
        out.push_str("\n  no territories");
    }
    for territory in &view.player.locations {
        out.push_str(&format!("\n  {}", describe_territory(territory)));
    }
    for other in &view.others {
        let held: Vec<&str> = other.locations.iter().map(|t| t.name.as_str()).collect();
        out.push_str(&format!("\n  last seen {}: {}", other.username, held.join(", ")));
    }
    out
}

pub enum Flow {
    Continue(String),
    Quit,
}

pub async fn execute(session: &Session, command: Command) -> Result<Flow, ReplError> {
    let output = match command {
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Flow::Quit),
        Command::Spawn { territory, rank } => {
            session.spawn(&territory, &rank).await?;
            format!("spawned {rank} in {territory}")
        }
        Command::Move { from, to, units } => {
            let army_move = session.move_units(&from, &to, units.as_slice()).await?;
            format!(
                "moved {} to {to}",
                describe_units(&army_move.territory.units)
            )
        }
        Command::Status => format_status(&session.status().await),
        Command::Spam(count) => format!("sent {} log lines", session.spam(count)),
    };
    Ok(Flow::Continue(output))
}

pub async fn run_line(session: &Session, line: &str) -> Result<Flow, ReplError> {
    match parse(line)? {
        Some(command) => execute(session, command).await,
        None => Ok(Flow::Continue(String::new())),
    }
}
