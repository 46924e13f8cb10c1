//! Carcassonne - a tile-placement game engine
//!
//! This crate provides the core game logic, including:
//! - A square grid with directions and positions
//! - Tile definitions, rotations and the standard tile set
//! - Edge-matching placement validation
//! - Player state and markers
//! - The board state machine, from setup through pile exhaustion
//! - AI bots at three difficulty levels
//!
//! The engine has no I/O and no logging. The server crate wraps a `Board` in
//! a lock and drives it from network requests.
//!
//! # Modules
//!
//! - [`grid`]: Directions and grid positions
//! - [`tile`]: Edge kinds, features, rotations and the tile set
//! - [`placement`]: Placed tiles and the placement validator
//! - [`player`]: Players, colors and markers
//! - [`board`]: Game state machine
//! - [`events`]: Events reported by board mutations
//! - [`bot`]: Bot strategies

pub mod board;
pub mod bot;
pub mod events;
pub mod grid;
pub mod placement;
pub mod player;
pub mod tile;

// Re-export commonly used types
pub use board::{Board, BoardPhase, GameError, GameSnapshot, MAX_PLAYERS, MIN_PLAYERS};
pub use bot::{Bot, BotDifficulty, BotMove, BotStrategy, EasyStrategy, HardStrategy, MediumStrategy};
pub use events::GameEvent;
pub use grid::{Direction, Position};
pub use placement::{
    can_place, candidate_positions, check_placement, enumerate_legal_placements, PlacedTile,
    Placement, PlacementError, TileMap,
};
pub use player::{Marker, Player, PlayerColor, PlayerId, MARKERS_PER_PLAYER};
pub use tile::{
    standard_tile_set, starting_tile, EdgeKind, Feature, FeatureKind, Rotation, TileDefinition,
};
