use crate::gamelogic::{GameError, GameState, map};
use crate::model::UnitRank;

/// Places one unit of `rank` on `territory`, claiming it when unowned.
pub fn apply_spawn(state: &mut GameState, territory: &str, rank: &str) -> Result<(), GameError> {
    if !map::is_territory(territory) {
        return Err(GameError::InvalidSpawn(format!(
            "unknown territory '{territory}'"
        )));
    }
    let Some(rank) = UnitRank::from_name(rank) else {
        return Err(GameError::InvalidSpawn(format!("unknown unit rank '{rank}'")));
    };
    if let Some(owner) = state.owner_of(territory)
        && owner != state.username()
    {
        return Err(GameError::InvalidSpawn(format!(
            "{territory} is held by {owner}"
        )));
    }

    state.player.reinforce(territory, &[rank]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::apply_spawn;
    use crate::gamelogic::{GameError, GameState, handle_move};
    use crate::model::{ArmyMove, Player, Territory, UnitRank};

    #[test]
    fn spawn_adds_unit_to_owned_territory() {
        let mut state = GameState::new("alice");
        apply_spawn(&mut state, "europe", "infantry").expect("first spawn");
        apply_spawn(&mut state, "europe", "infantry").expect("second spawn");

        apply_spawn(&mut state, "europe", "cavalry").expect("cavalry spawn");

        let europe = state.player().territory("europe").expect("europe is held");
        assert_eq!(
            europe.units,
            vec![UnitRank::Cavalry, UnitRank::Infantry, UnitRank::Infantry]
        );
    }

    #[test]
    fn spawn_rejects_unknown_rank_and_territory() {
        let mut state = GameState::new("alice");

        assert!(matches!(
            apply_spawn(&mut state, "europe", "dragon"),
            Err(GameError::InvalidSpawn(_))
        ));
        assert!(matches!(
            apply_spawn(&mut state, "atlantis", "infantry"),
            Err(GameError::InvalidSpawn(_))
        ));
        assert!(state.player().locations.is_empty());
    }

    #[test]
    fn spawn_rejects_territory_held_by_someone_else() {
        let mut state = GameState::new("alice");
        let mut bob = Player::new("bob");
        bob.reinforce("asia", &[UnitRank::Infantry]);
        handle_move(
            &mut state,
            &ArmyMove {
                player: bob,
                territory: Territory::new("asia", [UnitRank::Infantry]),
            },
        );

        let err = apply_spawn(&mut state, "asia", "artillery").expect_err("asia belongs to bob");
        assert_eq!(err, GameError::InvalidSpawn("asia is held by bob".to_string()));
        assert!(!state.player().owns("asia"));
    }
}
