use crate::gamelogic::GameState;
use crate::model::PlayingState;

pub fn apply_pause(state: &mut GameState, signal: PlayingState) {
    state.paused = signal.is_paused;
}
