//! Fixtures shared by the server's unit tests.

use carcassonne_core::{
    starting_tile, Board, Direction, EdgeKind, Feature, Player, PlayerColor, TileDefinition,
};
use std::sync::Arc;

/// A straight east-west road, playable beside any road end
pub fn straight_road(id: u32) -> Arc<TileDefinition> {
    Arc::new(TileDefinition::new(
        id,
        [EdgeKind::Field, EdgeKind::Road, EdgeKind::Field, EdgeKind::Road],
        vec![
            Feature::road(&[Direction::East, Direction::West]),
            Feature::field(&[Direction::North]),
            Feature::field(&[Direction::South]),
        ],
    ))
}

/// Unshuffled board whose every draw is a straight road
pub fn road_board() -> Board {
    Board::from_tiles(starting_tile(), (1..=30).map(straight_road))
}

/// Unshuffled board with a short pile, for games that must end quickly
pub fn short_road_board() -> Board {
    Board::from_tiles(starting_tile(), (1..=2).map(straight_road))
}

pub fn human(id: &str, color: PlayerColor) -> Player {
    Player::human(id, id.to_uppercase(), color)
}
