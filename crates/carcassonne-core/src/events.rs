//! Events produced by board mutations.
//!
//! Every successful state change on a `Board` reports what happened as a
//! `GameEvent`, so callers can relay outcomes without diffing snapshots.

use crate::grid::Position;
use crate::player::PlayerId;
use crate::tile::Rotation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Something that happened in a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// The game left setup; `first_player` takes the first turn
    GameStarted { first_player: PlayerId },

    /// A tile was drawn from the pile into the current player's hand
    TileDrawn { tile_id: u32, tiles_left: usize },

    /// The current tile was committed to the board
    TilePlaced {
        player: PlayerId,
        tile_id: u32,
        position: Position,
        rotation: Rotation,
    },

    /// A marker claimed a feature on the tile just placed
    MarkerPlaced {
        player: PlayerId,
        position: Position,
        feature_index: usize,
    },

    /// The player chose not to place a marker this turn
    MarkerSkipped { player: PlayerId },

    /// The tile in hand had no legal placement and was set aside
    TileDiscarded { player: PlayerId, tile_id: u32 },

    /// Turn passed to the next player
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    /// The draw pile ran out
    GameEnded { final_scores: BTreeMap<PlayerId, u32> },
}

impl GameEvent {
    /// Whether this event finishes the game
    pub fn is_game_end(&self) -> bool {
        matches!(self, GameEvent::GameEnded { .. })
    }
}
