use std::cmp::Ordering;

use crate::gamelogic::GameState;
use crate::model::{Player, RecognitionOfWar, UnitRank};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarOutcome {
    /// Neither side is the local player; someone else must resolve it.
    NotInvolved,
    /// There is no contested stack to fight over.
    NoUnits,
    OpponentWon { winner: String, loser: String },
    YouWon { winner: String, loser: String },
    Draw { attacker: String, defender: String },
}

/// Result of pitting two stacks against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Battle {
    attacker_wins: usize,
    defender_wins: usize,
    attacker_survivors: Vec<UnitRank>,
    defender_survivors: Vec<UnitRank>,
}

/// Pairs units strongest-first up to the shorter stack. The stronger unit of
/// each pair survives, equal units destroy each other, unpaired units survive.
fn fight(attacker: &[UnitRank], defender: &[UnitRank]) -> Battle {
    let mut attacker = attacker.to_vec();
    let mut defender = defender.to_vec();
    attacker.sort_unstable_by(|a, b| b.cmp(a));
    defender.sort_unstable_by(|a, b| b.cmp(a));

    let mut battle = Battle {
        attacker_wins: 0,
        defender_wins: 0,
        attacker_survivors: Vec::new(),
        defender_survivors: Vec::new(),
    };
    for (a, d) in attacker.iter().zip(defender.iter()) {
        match a.cmp(d) {
            Ordering::Greater => {
                battle.attacker_wins += 1;
                battle.attacker_survivors.push(*a);
            }
            Ordering::Less => {
                battle.defender_wins += 1;
                battle.defender_survivors.push(*d);
            }
            Ordering::Equal => {}
        }
    }
    let paired = attacker.len().min(defender.len());
    battle
        .attacker_survivors
        .extend_from_slice(&attacker[paired..]);
    battle
        .defender_survivors
        .extend_from_slice(&defender[paired..]);
    battle
}

/// Resolves a declared war from the snapshots it carries and applies the
/// result to the local view.
pub fn handle_war(state: &mut GameState, war: &RecognitionOfWar) -> WarOutcome {
    let local = state.username();
    if war.attacker.username != local && war.defender.username != local {
        return WarOutcome::NotInvolved;
    }
    if war.attacker.username == war.defender.username {
        return WarOutcome::NoUnits;
    }

    let contested = war.territory.as_str();
    let stack = |player: &Player| {
        player
            .territory(contested)
            .map(|territory| territory.units.clone())
            .unwrap_or_default()
    };
    let attacking = stack(&war.attacker);
    let defending = stack(&war.defender);
    if attacking.is_empty() || defending.is_empty() {
        return WarOutcome::NoUnits;
    }

    let battle = fight(&attacking, &defending);
    let (winner, survivors, loser) = match battle.attacker_wins.cmp(&battle.defender_wins) {
        Ordering::Equal => {
            return WarOutcome::Draw {
                attacker: war.attacker.username.clone(),
                defender: war.defender.username.clone(),
            };
        }
        Ordering::Greater => (&war.attacker, battle.attacker_survivors, &war.defender),
        Ordering::Less => (&war.defender, battle.defender_survivors, &war.attacker),
    };

    let territory = contested;
    if winner.username == state.username() {
        state.player.set_units(territory, survivors);
        let mut defeated = loser.clone();
        defeated.remove_territory(territory);
        state.remember(defeated);
        WarOutcome::YouWon {
            winner: winner.username.clone(),
            loser: loser.username.clone(),
        }
    } else {
        state.player.remove_territory(territory);
        let mut victor = winner.clone();
        victor.set_units(territory, survivors);
        state.remember(victor);
        WarOutcome::OpponentWon {
            winner: winner.username.clone(),
            loser: loser.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{WarOutcome, fight, handle_war};
    use crate::gamelogic::{GameState, apply_move_command, apply_spawn};
    use crate::model::{Player, RecognitionOfWar, UnitRank};

    fn player(username: &str, territory: &str, units: &[UnitRank]) -> Player {
        let mut player = Player::new(username);
        player.reinforce(territory, units);
        player
    }

    fn state_with(username: &str, territory: &str, ranks: &[&str]) -> GameState {
        let mut state = GameState::new(username);
        for rank in ranks {
            apply_spawn(&mut state, territory, rank).expect("spawn should succeed");
        }
        state
    }

    #[test]
    fn stronger_pairs_win_and_unpaired_units_survive() {
        let battle = fight(
            &[UnitRank::Cavalry, UnitRank::Cavalry],
            &[UnitRank::Infantry],
        );
        assert_eq!(battle.attacker_wins, 1);
        assert_eq!(battle.defender_wins, 0);
        assert_eq!(
            battle.attacker_survivors,
            vec![UnitRank::Cavalry, UnitRank::Cavalry]
        );
        assert!(battle.defender_survivors.is_empty());
    }

    #[test]
    fn equal_pairs_destroy_each_other() {
        let battle = fight(
            &[UnitRank::Infantry, UnitRank::Artillery],
            &[UnitRank::Artillery, UnitRank::Cavalry, UnitRank::Infantry],
        );
        // Artillery/Artillery trade, Infantry loses to Cavalry, Infantry is unpaired.
        assert_eq!(battle.attacker_wins, 0);
        assert_eq!(battle.defender_wins, 1);
        assert!(battle.attacker_survivors.is_empty());
        assert_eq!(
            battle.defender_survivors,
            vec![UnitRank::Cavalry, UnitRank::Infantry]
        );
    }

    #[test]
    fn attacker_victory_transfers_territory_on_both_sides() {
        let mut alice = state_with("alice", "asia", &["cavalry", "cavalry"]);
        let mut bob = state_with("bob", "asia", &["infantry"]);
        let war = RecognitionOfWar {
            attacker: alice.snapshot(),
            defender: bob.snapshot(),
            territory: "asia".to_string(),
        };

        let alice_outcome = handle_war(&mut alice, &war);
        let bob_outcome = handle_war(&mut bob, &war);

        let expected_names = ("alice".to_string(), "bob".to_string());
        assert_eq!(
            alice_outcome,
            WarOutcome::YouWon {
                winner: expected_names.0.clone(),
                loser: expected_names.1.clone(),
            }
        );
        assert_eq!(
            bob_outcome,
            WarOutcome::OpponentWon {
                winner: expected_names.0,
                loser: expected_names.1,
            }
        );

        assert_eq!(
            alice.player().territory("asia").map(|t| t.units.clone()),
            Some(vec![UnitRank::Cavalry, UnitRank::Cavalry])
        );
        assert!(!bob.player().owns("asia"));
        assert_eq!(bob.owner_of("asia"), Some("alice"));
        assert!(
            !alice
                .known_player("bob")
                .expect("bob should be recorded")
                .owns("asia")
        );
    }

    #[test]
    fn defender_victory_removes_attacking_stack() {
        let mut alice = state_with("alice", "asia", &["infantry"]);
        let war = RecognitionOfWar {
            attacker: alice.snapshot(),
            defender: player("bob", "asia", &[UnitRank::Artillery]),
            territory: "asia".to_string(),
        };

        let outcome = handle_war(&mut alice, &war);

        assert_eq!(
            outcome,
            WarOutcome::OpponentWon {
                winner: "bob".to_string(),
                loser: "alice".to_string(),
            }
        );
        assert!(!alice.player().owns("asia"));
        assert_eq!(alice.owner_of("asia"), Some("bob"));
    }

    #[test]
    fn draw_is_stable_under_redelivery() {
        let mut alice = state_with("alice", "asia", &["cavalry"]);
        let war = RecognitionOfWar {
            attacker: alice.snapshot(),
            defender: player("bob", "asia", &[UnitRank::Cavalry]),
            territory: "asia".to_string(),
        };
        let before = alice.view();

        for _ in 0..3 {
            assert_eq!(
                handle_war(&mut alice, &war),
                WarOutcome::Draw {
                    attacker: "alice".to_string(),
                    defender: "bob".to_string(),
                }
            );
            assert_eq!(alice.view(), before);
        }
    }

    #[test]
    fn bystanders_are_never_involved() {
        let mut carol = state_with("carol", "asia", &["artillery"]);
        let before = carol.view();
        let wars = [
            RecognitionOfWar {
                attacker: player("alice", "asia", &[UnitRank::Cavalry]),
                defender: player("bob", "asia", &[UnitRank::Infantry]),
                territory: "asia".to_string(),
            },
            RecognitionOfWar {
                attacker: player("alice", "europe", &[UnitRank::Cavalry]),
                defender: player("bob", "asia", &[UnitRank::Infantry]),
                territory: "asia".to_string(),
            },
            RecognitionOfWar {
                attacker: Player::new("alice"),
                defender: Player::new("bob"),
                territory: "asia".to_string(),
            },
        ];

        for war in &wars {
            assert_eq!(handle_war(&mut carol, war), WarOutcome::NotInvolved);
        }
        assert_eq!(carol.view(), before);
    }

    #[test]
    fn war_without_shared_territory_has_no_units() {
        let mut bob = state_with("bob", "asia", &["infantry"]);
        let war = RecognitionOfWar {
            attacker: player("alice", "europe", &[UnitRank::Cavalry]),
            defender: bob.snapshot(),
            territory: "asia".to_string(),
        };

        assert_eq!(handle_war(&mut bob, &war), WarOutcome::NoUnits);
        assert!(bob.player().owns("asia"));
    }

    #[test]
    fn battle_is_fought_on_the_invaded_territory_only() {
        let mut alice = GameState::new("alice");
        apply_spawn(&mut alice, "europe", "infantry").expect("spawn");
        apply_spawn(&mut alice, "americas", "artillery").expect("spawn");
        apply_spawn(&mut alice, "americas", "artillery").expect("spawn");
        let mut bob = GameState::new("bob");
        apply_spawn(&mut bob, "europe", "artillery").expect("spawn");
        apply_spawn(&mut bob, "asia", "infantry").expect("spawn");

        let army_move = apply_move_command(
            &mut alice,
            "americas",
            "asia",
            &[UnitRank::Artillery, UnitRank::Artillery],
        )
        .expect("move");
        let war = RecognitionOfWar {
            attacker: army_move.player,
            defender: bob.snapshot(),
            territory: army_move.territory.name,
        };

        assert_eq!(
            handle_war(&mut alice, &war),
            WarOutcome::YouWon {
                winner: "alice".to_string(),
                loser: "bob".to_string(),
            }
        );
        assert_eq!(
            alice.player().territory("asia").map(|t| t.units.clone()),
            Some(vec![UnitRank::Artillery, UnitRank::Artillery])
        );
        assert_eq!(
            alice.player().territory("europe").map(|t| t.units.clone()),
            Some(vec![UnitRank::Infantry])
        );

        assert_eq!(
            handle_war(&mut bob, &war),
            WarOutcome::OpponentWon {
                winner: "alice".to_string(),
                loser: "bob".to_string(),
            }
        );
        assert!(!bob.player().owns("asia"));
        assert!(bob.player().owns("europe"));
        assert_eq!(bob.owner_of("asia"), Some("alice"));
    }
}
