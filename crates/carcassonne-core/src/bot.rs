//! AI bot players.
//!
//! Each difficulty tier is its own `BotStrategy`:
//! - Easy: uniformly random placement, coin-flip marker
//! - Medium: favors well-connected cells and monasteries
//! - Hard: also weighs monastery surrounds and open road/city frontier
//!
//! A bot never errors. When the tile in hand fits nowhere it reports no move
//! and the caller discards the tile.

use crate::board::Board;
use crate::grid::Position;
use crate::placement::{Placement, TileMap};
use crate::player::PlayerId;
use crate::tile::{EdgeKind, FeatureKind, TileDefinition};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bot difficulty '{0}'")]
pub struct UnknownDifficulty(pub String);

impl BotDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotDifficulty::Easy => "easy",
            BotDifficulty::Medium => "medium",
            BotDifficulty::Hard => "hard",
        }
    }

    /// The strategy that plays at this difficulty
    pub fn strategy(&self) -> Box<dyn BotStrategy> {
        match self {
            BotDifficulty::Easy => Box::new(EasyStrategy),
            BotDifficulty::Medium => Box::new(MediumStrategy),
            BotDifficulty::Hard => Box::new(HardStrategy),
        }
    }
}

impl fmt::Display for BotDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotDifficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(BotDifficulty::Easy),
            "medium" => Ok(BotDifficulty::Medium),
            "hard" => Ok(BotDifficulty::Hard),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

/// How a bot picks its placement and marker
pub trait BotStrategy: Send + Sync {
    /// Pick one of `candidates`, all of which are legal for `tile`
    fn choose_placement(
        &self,
        tiles: &TileMap,
        tile: &TileDefinition,
        candidates: &[Placement],
        rng: &mut dyn RngCore,
    ) -> Option<Placement>;

    /// Pick a feature of the freshly placed `tile` to claim, or none
    fn choose_marker(&self, tile: &TileDefinition, rng: &mut dyn RngCore) -> Option<usize>;
}

/// Random valid moves
#[derive(Debug, Clone, Copy, Default)]
pub struct EasyStrategy;

impl BotStrategy for EasyStrategy {
    fn choose_placement(
        &self,
        _tiles: &TileMap,
        _tile: &TileDefinition,
        candidates: &[Placement],
        rng: &mut dyn RngCore,
    ) -> Option<Placement> {
        candidates.choose(rng).copied()
    }

    fn choose_marker(&self, tile: &TileDefinition, rng: &mut dyn RngCore) -> Option<usize> {
        if rng.gen_bool(0.5) {
            random_feature(tile, rng)
        } else {
            None
        }
    }
}

/// Basic heuristics
#[derive(Debug, Clone, Copy, Default)]
pub struct MediumStrategy;

impl MediumStrategy {
    fn score(tiles: &TileMap, tile: &TileDefinition, placement: &Placement) -> i32 {
        let pos = placement.position;
        let mut score = 2 * occupied_neighbors(tiles, pos) as i32;
        score += 3 * adjacent_monasteries(tiles, pos) as i32;
        if tile.has_monastery {
            score += occupied_surrounding(tiles, pos) as i32;
        }
        score
    }
}

impl BotStrategy for MediumStrategy {
    fn choose_placement(
        &self,
        tiles: &TileMap,
        tile: &TileDefinition,
        candidates: &[Placement],
        rng: &mut dyn RngCore,
    ) -> Option<Placement> {
        best_by(candidates, rng, |p| Self::score(tiles, tile, p))
    }

    fn choose_marker(&self, tile: &TileDefinition, rng: &mut dyn RngCore) -> Option<usize> {
        if let Some(idx) = tile.monastery_feature() {
            return Some(idx);
        }
        if rng.gen_bool(0.3) {
            random_feature(tile, rng)
        } else {
            None
        }
    }
}

/// Strategic placement with frontier awareness
#[derive(Debug, Clone, Copy, Default)]
pub struct HardStrategy;

impl HardStrategy {
    fn score(tiles: &TileMap, tile: &TileDefinition, placement: &Placement) -> i32 {
        let mut score = MediumStrategy::score(tiles, tile, placement);
        let pos = placement.position;

        // A monastery wants to be boxed in quickly
        if tile.has_monastery {
            score += 2 * occupied_surrounding(tiles, pos) as i32;
        }

        // Roads and cities that face open cells can keep growing
        for (direction, neighbor) in pos.neighbors() {
            let edge = tile.edge_rotated(direction, placement.rotation);
            if edge == EdgeKind::Field {
                continue;
            }
            if tiles.contains_key(&neighbor) {
                score += 1;
            } else if edge == EdgeKind::City {
                score += 2;
            } else {
                score += 1;
            }
        }
        score
    }
}

impl BotStrategy for HardStrategy {
    fn choose_placement(
        &self,
        tiles: &TileMap,
        tile: &TileDefinition,
        candidates: &[Placement],
        rng: &mut dyn RngCore,
    ) -> Option<Placement> {
        best_by(candidates, rng, |p| Self::score(tiles, tile, p))
    }

    fn choose_marker(&self, tile: &TileDefinition, rng: &mut dyn RngCore) -> Option<usize> {
        if let Some(idx) = tile.monastery_feature() {
            return Some(idx);
        }
        if let Some(idx) = tile.feature_index(FeatureKind::City) {
            return Some(idx);
        }
        if rng.gen_bool(0.4) {
            random_feature(tile, rng)
        } else {
            None
        }
    }
}

/// What a bot wants to do with the tile in hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMove {
    pub placement: Placement,
    /// Feature index to claim after placing, if any
    pub marker: Option<usize>,
}

/// A bot player that can decide on moves
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    strategy: Box<dyn BotStrategy>,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            strategy: difficulty.strategy(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            strategy: difficulty.strategy(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Decide a move for the tile currently in hand.
    ///
    /// Returns `None` when there is no tile in hand or it has no legal
    /// placement. No marker is chosen once the bot's supply is empty.
    pub fn decide(&mut self, board: &Board) -> Option<BotMove> {
        let tile = board.current_tile()?;
        let candidates = board.valid_placements();
        if candidates.is_empty() {
            return None;
        }

        let placement =
            self.strategy
                .choose_placement(board.tiles(), tile, &candidates, &mut self.rng)?;

        let has_markers = board
            .player(&self.player_id)
            .map_or(false, |p| p.has_markers());
        let marker = if has_markers {
            self.strategy.choose_marker(tile, &mut self.rng)
        } else {
            None
        };

        Some(BotMove { placement, marker })
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("player_id", &self.player_id)
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}

// ==================== Heuristics ====================

fn random_feature(tile: &TileDefinition, rng: &mut dyn RngCore) -> Option<usize> {
    if tile.features.is_empty() {
        return None;
    }
    Some(rng.gen_range(0..tile.features.len()))
}

/// Highest-scoring candidate, ties broken at random
fn best_by<F>(candidates: &[Placement], rng: &mut dyn RngCore, score: F) -> Option<Placement>
where
    F: Fn(&Placement) -> i32,
{
    let scored: Vec<(i32, Placement)> = candidates.iter().map(|p| (score(p), *p)).collect();
    let best = scored.iter().map(|(s, _)| *s).max()?;
    let top: Vec<Placement> = scored
        .into_iter()
        .filter(|(s, _)| *s == best)
        .map(|(_, p)| p)
        .collect();
    top.choose(rng).copied()
}

fn occupied_neighbors(tiles: &TileMap, pos: Position) -> usize {
    pos.neighbors()
        .filter(|(_, n)| tiles.contains_key(n))
        .count()
}

fn occupied_surrounding(tiles: &TileMap, pos: Position) -> usize {
    pos.surrounding()
        .filter(|n| tiles.contains_key(n))
        .count()
}

fn adjacent_monasteries(tiles: &TileMap, pos: Position) -> usize {
    pos.surrounding()
        .filter_map(|n| tiles.get(&n))
        .filter(|t| t.tile.has_monastery)
        .count()
}
