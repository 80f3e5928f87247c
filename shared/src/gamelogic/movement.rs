use crate::gamelogic::{GameError, GameState, map};
use crate::model::{ArmyMove, Territory, UnitRank};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The destination is not ours; the mover's snapshot was recorded.
    Safe,
    /// The destination is ours. The caller must publish a `RecognitionOfWar`.
    MakeWar,
    /// Our own move echoed back on the shared topic.
    SamePlayer,
}

/// Parses rank names, failing on the first unrecognized one.
pub fn parse_units<S: AsRef<str>>(names: &[S]) -> Result<Vec<UnitRank>, GameError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            UnitRank::from_name(name)
                .ok_or_else(|| GameError::InvalidMove(format!("unknown unit rank '{name}'")))
        })
        .collect()
}

/// Moves `units` from `from` to the adjacent territory `to`.
///
/// Returns the event to publish: the player snapshot taken after the move and
/// the stack that moved.
pub fn apply_move_command(
    state: &mut GameState,
    from: &str,
    to: &str,
    units: &[UnitRank],
) -> Result<ArmyMove, GameError> {
    if !map::is_territory(to) {
        return Err(GameError::InvalidMove(format!("unknown territory '{to}'")));
    }
    if units.is_empty() {
        return Err(GameError::InvalidMove("no units given".to_string()));
    }
    let Some(source) = state.player.territory(from) else {
        return Err(GameError::InvalidMove(format!("you do not hold {from}")));
    };
    if !map::are_adjacent(from, to) {
        return Err(GameError::InvalidMove(format!(
            "{to} is not adjacent to {from}"
        )));
    }
    if !source.contains_all(units) {
        return Err(GameError::InvalidMove(format!(
            "{from} does not have enough units for that move"
        )));
    }

    if let Some(source) = state.player.territory_mut(from) {
        source.remove_units(units);
        if source.is_empty() {
            state.player.remove_territory(from);
        }
    }
    state.player.reinforce(to, units);

    Ok(ArmyMove {
        player: state.snapshot(),
        territory: Territory::new(to, units.iter().copied()),
    })
}

/// Classifies a move published by another player.
pub fn handle_move(state: &mut GameState, army_move: &ArmyMove) -> MoveOutcome {
    if army_move.player.username == state.username() {
        return MoveOutcome::SamePlayer;
    }
    let destination = army_move.territory.name.as_str();
    if state.player.owns(destination) {
        return MoveOutcome::MakeWar;
    }

    let mut mover = army_move.player.clone();
    if !mover.owns(destination) {
        mover.reinforce(destination, &army_move.territory.units);
    }
    state.remember(mover);
    MoveOutcome::Safe
}
