//! Player state and markers.
//!
//! This module contains:
//! - `PlayerColor`, the fixed palette colors are drawn from
//! - `Player`, a human or bot participant with its marker supply and score
//! - `Marker`, a token a player has placed on a tile feature

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Player identifier, self-declared by humans and generated for bots
pub type PlayerId = String;

/// Markers each player starts the game with
pub const MARKERS_PER_PLAYER: u8 = 7;

/// Player color, unique within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Black,
}

/// A color name outside the palette.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color '{0}'")]
pub struct UnknownColor(pub String);

impl PlayerColor {
    /// The palette in the order bots are assigned from
    pub const PALETTE: [PlayerColor; 5] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Yellow,
        PlayerColor::Black,
    ];

    /// First palette color not present in `used`
    pub fn first_unused<'a, I>(used: I) -> Option<PlayerColor>
    where
        I: IntoIterator<Item = &'a PlayerColor>,
    {
        let used: Vec<PlayerColor> = used.into_iter().copied().collect();
        Self::PALETTE.into_iter().find(|c| !used.contains(c))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerColor::Red => "red",
            PlayerColor::Blue => "blue",
            PlayerColor::Green => "green",
            PlayerColor::Yellow => "yellow",
            PlayerColor::Black => "black",
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PALETTE
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

/// A participant in a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name
    pub name: String,
    pub color: PlayerColor,
    /// Markers still in the player's supply
    pub markers_remaining: u8,
    /// Cumulative score
    pub score: u32,
    pub is_bot: bool,
}

impl Player {
    /// Create a human player with a full marker supply
    pub fn human(id: impl Into<PlayerId>, name: impl Into<String>, color: PlayerColor) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
            markers_remaining: MARKERS_PER_PLAYER,
            score: 0,
            is_bot: false,
        }
    }

    /// Create a bot player with a full marker supply
    pub fn bot(id: impl Into<PlayerId>, name: impl Into<String>, color: PlayerColor) -> Self {
        Self {
            is_bot: true,
            ..Self::human(id, name, color)
        }
    }

    pub fn has_markers(&self) -> bool {
        self.markers_remaining > 0
    }

    /// Reset per-game counters, used when the player is seated on a board
    pub fn reset_for_game(&mut self) {
        self.markers_remaining = MARKERS_PER_PLAYER;
        self.score = 0;
    }
}

/// A placed marker claiming one feature of one tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub player_id: PlayerId,
    /// Index into the tile definition's features
    pub feature_index: usize,
    pub color: PlayerColor,
}
