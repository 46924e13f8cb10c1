//! Authoritative per-game state.
//!
//! The board owns the placed tiles, the draw pile, the tile in hand, the
//! seated players and whose turn it is. It moves through
//! `Setup → Playing → Ended`; the only natural end is running out of tiles.
//!
//! A turn is: place the current tile, then either place a marker on it or
//! skip, then advance. The board records the position of the tile awaiting a
//! marker decision explicitly instead of inferring it from marker counts.
//!
//! `Board` is not synchronized. Callers that share one across tasks wrap it
//! in a lock.

use crate::events::GameEvent;
use crate::grid::Position;
use crate::placement::{
    check_placement, enumerate_legal_placements, PlacedTile, Placement, PlacementError, TileMap,
};
use crate::player::{Marker, Player, PlayerId, MARKERS_PER_PLAYER};
use crate::tile::{standard_tile_set, Rotation, TileDefinition};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Fewest players a game can start with
pub const MIN_PLAYERS: usize = 2;

/// Most players a board can seat
pub const MAX_PLAYERS: usize = 5;

/// Lifecycle of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardPhase {
    /// Seating players; the origin tile is already down
    Setup,
    /// Turns are being played
    Playing,
    /// The draw pile is exhausted
    Ended,
}

/// Errors that can occur when mutating a board
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Game already started")]
    AlreadyStarted,

    #[error("Maximum {} players allowed", MAX_PLAYERS)]
    TooManyPlayers,

    #[error("Player {0} is already seated")]
    DuplicatePlayer(PlayerId),

    #[error("Need at least {} players to start", MIN_PLAYERS)]
    NotEnoughPlayers,

    #[error("Game not started")]
    NotStarted,

    #[error("Game is over")]
    GameEnded,

    #[error("No current tile to place")]
    NoCurrentTile,

    #[error("Invalid tile placement: {0}")]
    IllegalPlacement(#[from] PlacementError),

    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("No markers available")]
    NoMarkersLeft,

    #[error("No freshly placed tile to put a marker on")]
    NoPlacedTile,

    #[error("Invalid feature index {0}")]
    InvalidFeature(usize),

    #[error("Feature {0} is already occupied")]
    FeatureOccupied(usize),

    #[error("Current tile still has a legal placement")]
    TilePlayable,
}

/// The complete state of one game
#[derive(Debug, Clone)]
pub struct Board {
    /// Placed tiles keyed by cell
    tiles: TileMap,
    /// Remaining tiles, front is drawn next
    draw_pile: VecDeque<Arc<TileDefinition>>,
    /// Tile awaiting placement this turn
    current_tile: Option<Arc<TileDefinition>>,
    /// Seated players in turn order
    players: Vec<Player>,
    /// Index into `players` of whose turn it is
    current_player: usize,
    phase: BoardPhase,
    /// Tile placed this turn that still awaits a marker decision
    last_placed: Option<Position>,
    /// Recorded once when the game ends
    final_scores: Option<BTreeMap<PlayerId, u32>>,
}

impl Board {
    /// Create a board from the standard tile set with a shuffled pile
    pub fn new() -> Self {
        let mut rng = StdRng::from_entropy();
        Self::with_rng(&mut rng)
    }

    /// Create a board whose pile order is fixed by `seed`
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(&mut rng)
    }

    /// Create a standard board, shuffling the pile with a provided RNG.
    ///
    /// The starting tile is always seeded at the origin; only the rest of the
    /// set is shuffled.
    pub fn with_rng<R: Rng>(rng: &mut R) -> Self {
        let mut tiles = standard_tile_set();
        let origin = tiles.remove(0);
        tiles.shuffle(rng);
        Self::from_tiles(origin, tiles)
    }

    /// Create a board with an explicit origin tile and draw pile, unshuffled
    pub fn from_tiles<I>(origin: Arc<TileDefinition>, pile: I) -> Self
    where
        I: IntoIterator<Item = Arc<TileDefinition>>,
    {
        let mut tiles = TileMap::new();
        tiles.insert(
            Position::ORIGIN,
            PlacedTile::new(origin, Position::ORIGIN, Rotation::R0),
        );

        Self {
            tiles,
            draw_pile: pile.into_iter().collect(),
            current_tile: None,
            players: Vec::new(),
            current_player: 0,
            phase: BoardPhase::Setup,
            last_placed: None,
            final_scores: None,
        }
    }

    // ==================== Queries ====================

    pub fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    pub fn tile_at(&self, position: Position) -> Option<&PlacedTile> {
        self.tiles.get(&position)
    }

    /// Tiles left in the draw pile
    pub fn tiles_left(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn current_tile(&self) -> Option<&Arc<TileDefinition>> {
        self.current_tile.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_player_index(&self) -> usize {
        self.current_player
    }

    /// The player whose turn it is, if anyone is seated
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player)
    }

    pub fn phase(&self) -> BoardPhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != BoardPhase::Setup
    }

    pub fn is_ended(&self) -> bool {
        self.phase == BoardPhase::Ended
    }

    /// Position of the tile placed this turn that awaits a marker decision
    pub fn last_placed(&self) -> Option<Position> {
        self.last_placed
    }

    /// Markers a player currently has on the board
    pub fn markers_on_board(&self, player_id: &str) -> usize {
        self.tiles
            .values()
            .flat_map(|t| t.markers.iter())
            .filter(|m| m.player_id == player_id)
            .count()
    }

    /// Cumulative scores by player
    pub fn scores(&self) -> BTreeMap<PlayerId, u32> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.score))
            .collect()
    }

    /// Scores recorded when the game ended
    pub fn final_scores(&self) -> Option<&BTreeMap<PlayerId, u32>> {
        self.final_scores.as_ref()
    }

    /// Legal placements for the tile in hand, empty when there is none
    pub fn valid_placements(&self) -> Vec<Placement> {
        match &self.current_tile {
            Some(tile) => enumerate_legal_placements(&self.tiles, tile),
            None => Vec::new(),
        }
    }

    // ==================== Setup ====================

    /// Seat a player. Only legal before the game starts.
    pub fn add_player(&mut self, mut player: Player) -> Result<(), GameError> {
        if self.phase != BoardPhase::Setup {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::TooManyPlayers);
        }
        if self.player(&player.id).is_some() {
            return Err(GameError::DuplicatePlayer(player.id));
        }

        player.reset_for_game();
        self.players.push(player);
        Ok(())
    }

    /// Unseat a player. Only legal before the game starts.
    pub fn remove_player(&mut self, player_id: &str) -> Result<Player, GameError> {
        if self.phase != BoardPhase::Setup {
            return Err(GameError::AlreadyStarted);
        }
        let idx = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        Ok(self.players.remove(idx))
    }

    /// Begin play: first seated player's turn, first tile drawn
    pub fn start(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != BoardPhase::Setup {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }

        self.phase = BoardPhase::Playing;
        self.current_player = 0;

        let mut events = vec![GameEvent::GameStarted {
            first_player: self.players[0].id.clone(),
        }];
        events.push(self.draw_next()?);
        Ok(events)
    }

    // ==================== Turn Actions ====================

    /// Draw the front of the pile into hand.
    ///
    /// An empty pile ends the game and leaves no tile in hand.
    pub fn draw_next(&mut self) -> Result<GameEvent, GameError> {
        self.ensure_playing()?;

        match self.draw_pile.pop_front() {
            Some(tile) => {
                let tile_id = tile.id;
                self.current_tile = Some(tile);
                Ok(GameEvent::TileDrawn {
                    tile_id,
                    tiles_left: self.draw_pile.len(),
                })
            }
            None => Ok(self.end_game()),
        }
    }

    /// Commit the tile in hand at `position` with `rotation`
    pub fn place_tile(
        &mut self,
        position: Position,
        rotation: Rotation,
    ) -> Result<GameEvent, GameError> {
        self.ensure_playing()?;
        let tile = self.current_tile.clone().ok_or(GameError::NoCurrentTile)?;

        check_placement(&self.tiles, &tile, position, rotation)?;

        let tile_id = tile.id;
        self.tiles
            .insert(position, PlacedTile::new(tile, position, rotation));
        self.current_tile = None;
        self.last_placed = Some(position);

        Ok(GameEvent::TilePlaced {
            player: self.current_player_id(),
            tile_id,
            position,
            rotation,
        })
    }

    /// Claim a feature of the tile placed this turn
    pub fn place_marker(
        &mut self,
        player_id: &str,
        feature_index: usize,
    ) -> Result<GameEvent, GameError> {
        self.ensure_playing()?;

        let player_idx = self.player_index(player_id)?;
        let player = &self.players[player_idx];
        if !player.has_markers() {
            return Err(GameError::NoMarkersLeft);
        }
        let color = player.color;

        let position = self.last_placed.ok_or(GameError::NoPlacedTile)?;
        let placed = self
            .tiles
            .get_mut(&position)
            .ok_or(GameError::NoPlacedTile)?;

        if feature_index >= placed.tile.features.len() {
            return Err(GameError::InvalidFeature(feature_index));
        }
        if placed.is_feature_occupied(feature_index) {
            return Err(GameError::FeatureOccupied(feature_index));
        }

        placed.markers.push(Marker {
            player_id: player_id.to_string(),
            feature_index,
            color,
        });
        self.players[player_idx].markers_remaining -= 1;
        self.last_placed = None;

        debug_assert!(
            self.players[player_idx].markers_remaining as usize + self.markers_on_board(player_id)
                <= MARKERS_PER_PLAYER as usize
        );

        Ok(GameEvent::MarkerPlaced {
            player: player_id.to_string(),
            position,
            feature_index,
        })
    }

    /// Record that no marker will be placed on this turn's tile
    pub fn skip_marker(&mut self, player_id: &str) -> Result<GameEvent, GameError> {
        self.ensure_playing()?;
        self.player_index(player_id)?;
        self.last_placed.take().ok_or(GameError::NoPlacedTile)?;

        Ok(GameEvent::MarkerSkipped {
            player: player_id.to_string(),
        })
    }

    /// Set aside a tile in hand that fits nowhere on the board
    pub fn discard_current_tile(&mut self, player_id: &str) -> Result<GameEvent, GameError> {
        self.ensure_playing()?;
        self.player_index(player_id)?;
        let tile = self.current_tile.as_ref().ok_or(GameError::NoCurrentTile)?;

        if !enumerate_legal_placements(&self.tiles, tile).is_empty() {
            return Err(GameError::TilePlayable);
        }

        let tile_id = tile.id;
        self.current_tile = None;
        Ok(GameEvent::TileDiscarded {
            player: player_id.to_string(),
            tile_id,
        })
    }

    /// Pass the turn to the next player and draw their tile.
    ///
    /// A tile still in hand is dropped. If the pile is empty the game ends
    /// and every further mutation fails with `GameEnded`.
    pub fn advance_turn(&mut self) -> Result<Vec<GameEvent>, GameError> {
        self.ensure_playing()?;

        let player = self.current_player_id();
        self.current_player = (self.current_player + 1) % self.players.len();
        self.current_tile = None;
        self.last_placed = None;

        let mut events = vec![GameEvent::TurnEnded {
            player,
            next_player: self.current_player_id(),
        }];
        events.push(self.draw_next()?);
        Ok(events)
    }

    /// A serializable copy of the game state
    pub fn snapshot(&self) -> GameSnapshot {
        let mut tiles: Vec<PlacedTile> = self.tiles.values().cloned().collect();
        tiles.sort_by_key(|t| t.position);

        GameSnapshot {
            tiles,
            current_tile: self.current_tile.clone(),
            players: self.players.clone(),
            current_player: self.current_player,
            current_player_id: self.current_player().map(|p| p.id.clone()),
            phase: self.phase,
            game_started: self.is_started(),
            game_ended: self.is_ended(),
            last_placed: self.last_placed,
            tiles_left: self.draw_pile.len(),
            scores: self.scores(),
        }
    }

    // ==================== Helper Methods ====================

    fn ensure_playing(&self) -> Result<(), GameError> {
        match self.phase {
            BoardPhase::Setup => Err(GameError::NotStarted),
            BoardPhase::Playing => Ok(()),
            BoardPhase::Ended => Err(GameError::GameEnded),
        }
    }

    fn player_index(&self, player_id: &str) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
    }

    fn current_player_id(&self) -> PlayerId {
        self.current_player()
            .map(|p| p.id.clone())
            .unwrap_or_default()
    }

    fn end_game(&mut self) -> GameEvent {
        self.phase = BoardPhase::Ended;
        self.current_tile = None;
        self.last_placed = None;

        let final_scores = self.tally_final_scores();
        self.final_scores = Some(final_scores.clone());
        GameEvent::GameEnded { final_scores }
    }

    /// End-of-game tally.
    ///
    /// Incomplete roads, cities, monasteries and fields are not scored here;
    /// cumulative scores carry over unchanged.
    fn tally_final_scores(&self) -> BTreeMap<PlayerId, u32> {
        self.scores()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of a board, safe to hand out after the lock is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Placed tiles sorted by position
    pub tiles: Vec<PlacedTile>,
    pub current_tile: Option<Arc<TileDefinition>>,
    pub players: Vec<Player>,
    /// Turn index into `players`
    pub current_player: usize,
    pub current_player_id: Option<PlayerId>,
    pub phase: BoardPhase,
    pub game_started: bool,
    pub game_ended: bool,
    pub last_placed: Option<Position>,
    pub tiles_left: usize,
    pub scores: BTreeMap<PlayerId, u32>,
}

impl GameSnapshot {
    /// Total markers on the board belonging to a player
    pub fn markers_on_board(&self, player_id: &str) -> usize {
        self.tiles
            .iter()
            .flat_map(|t| t.markers.iter())
            .filter(|m| m.player_id == player_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Direction;
    use crate::player::PlayerColor;
    use crate::tile::{starting_tile, EdgeKind, Feature};
    use EdgeKind::{City as C, Field as F, Road as R};

    fn straight_road(id: u32) -> Arc<TileDefinition> {
        Arc::new(TileDefinition::new(
            id,
            [F, R, F, R],
            vec![
                Feature::road(&[Direction::East, Direction::West]),
                Feature::field(&[Direction::North]),
                Feature::field(&[Direction::South]),
            ],
        ))
    }

    fn full_city(id: u32) -> Arc<TileDefinition> {
        Arc::new(TileDefinition::new(
            id,
            [C, C, C, C],
            vec![Feature::city(&Direction::ALL)],
        ))
    }

    fn road_board(pile_len: u32) -> Board {
        Board::from_tiles(starting_tile(), (1..=pile_len).map(straight_road))
    }

    fn seated(pile_len: u32, players: usize) -> Board {
        let mut board = road_board(pile_len);
        let colors = PlayerColor::PALETTE;
        for i in 0..players {
            board
                .add_player(Player::human(format!("p{i}"), format!("Player {i}"), colors[i]))
                .unwrap();
        }
        board
    }

    fn started(pile_len: u32, players: usize) -> Board {
        let mut board = seated(pile_len, players);
        board.start().unwrap();
        board
    }

    #[test]
    fn test_new_board_has_origin_only() {
        let board = Board::new();
        assert_eq!(board.tiles().len(), 1);
        assert!(board.tile_at(Position::ORIGIN).is_some());
        assert_eq!(board.phase(), BoardPhase::Setup);
        assert!(board.current_tile().is_none());
        assert_eq!(board.tiles_left(), standard_tile_set().len() - 1);
    }

    #[test]
    fn test_seeded_boards_share_pile_order() {
        let a = Board::with_seed(42);
        let b = Board::with_seed(42);
        let ids = |board: &Board| board.draw_pile.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.tile_at(Position::ORIGIN).unwrap().tile.id, 0);
    }

    #[test]
    fn test_add_player_limits() {
        let mut board = seated(3, MAX_PLAYERS);
        let extra = Player::human("extra", "Extra", PlayerColor::Red);
        assert_eq!(board.add_player(extra), Err(GameError::TooManyPlayers));

        let mut board = seated(3, 1);
        let dup = Player::human("p0", "Again", PlayerColor::Blue);
        assert_eq!(
            board.add_player(dup),
            Err(GameError::DuplicatePlayer("p0".to_string()))
        );
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut board = seated(3, 1);
        assert_eq!(board.start(), Err(GameError::NotEnoughPlayers));

        let mut board = seated(3, 2);
        let events = board.start().unwrap();
        assert_eq!(board.phase(), BoardPhase::Playing);
        assert!(board.current_tile().is_some());
        assert_eq!(
            events[0],
            GameEvent::GameStarted {
                first_player: "p0".to_string()
            }
        );
        assert_eq!(board.start(), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn test_membership_frozen_after_start() {
        let mut board = started(3, 2);
        let late = Player::human("late", "Late", PlayerColor::Yellow);
        assert_eq!(board.add_player(late), Err(GameError::AlreadyStarted));
        assert_eq!(board.remove_player("p0"), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn test_actions_before_start_rejected() {
        let mut board = seated(3, 2);
        assert_eq!(
            board.place_tile(Position::new(1, 0), Rotation::R0),
            Err(GameError::NotStarted)
        );
        assert_eq!(board.advance_turn(), Err(GameError::NotStarted));
    }

    #[test]
    fn test_place_tile_records_last_placed() {
        let mut board = started(3, 2);
        let event = board.place_tile(Position::new(1, 0), Rotation::R0).unwrap();

        assert!(matches!(event, GameEvent::TilePlaced { ref player, .. } if player == "p0"));
        assert_eq!(board.last_placed(), Some(Position::new(1, 0)));
        assert!(board.current_tile().is_none());
        assert_eq!(
            board.place_tile(Position::new(2, 0), Rotation::R0),
            Err(GameError::NoCurrentTile)
        );
    }

    #[test]
    fn test_illegal_placement_leaves_state_untouched() {
        let mut board = started(3, 2);
        let err = board
            .place_tile(Position::new(1, 0), Rotation::R90)
            .unwrap_err();
        assert!(matches!(err, GameError::IllegalPlacement(_)));
        assert!(board.current_tile().is_some());
        assert_eq!(board.tiles().len(), 1);
        assert_eq!(board.last_placed(), None);
    }

    #[test]
    fn test_place_marker_rules() {
        let mut board = started(3, 2);
        assert_eq!(board.place_marker("p0", 0), Err(GameError::NoPlacedTile));

        board.place_tile(Position::new(1, 0), Rotation::R0).unwrap();
        assert_eq!(board.place_marker("p0", 3), Err(GameError::InvalidFeature(3)));
        assert_eq!(
            board.place_marker("ghost", 0),
            Err(GameError::PlayerNotFound("ghost".to_string()))
        );

        board.place_marker("p0", 0).unwrap();
        assert_eq!(board.player("p0").unwrap().markers_remaining, 6);
        assert_eq!(board.markers_on_board("p0"), 1);
        // Decision recorded, a second marker this turn has no target
        assert_eq!(board.place_marker("p0", 1), Err(GameError::NoPlacedTile));
    }

    #[test]
    fn test_feature_occupied() {
        let mut board = started(3, 2);
        board.place_tile(Position::new(1, 0), Rotation::R0).unwrap();
        board.place_marker("p0", 1).unwrap();

        // Re-open the same tile to exercise the occupancy check directly
        board.last_placed = Some(Position::new(1, 0));
        assert_eq!(board.place_marker("p1", 1), Err(GameError::FeatureOccupied(1)));
    }

    #[test]
    fn test_no_markers_left() {
        let mut board = started(3, 2);
        board.players[0].markers_remaining = 0;
        board.place_tile(Position::new(1, 0), Rotation::R0).unwrap();
        assert_eq!(board.place_marker("p0", 0), Err(GameError::NoMarkersLeft));
        assert!(board.skip_marker("p0").is_ok());
    }

    #[test]
    fn test_skip_marker_requires_placed_tile() {
        let mut board = started(3, 2);
        assert_eq!(board.skip_marker("p0"), Err(GameError::NoPlacedTile));
        board.place_tile(Position::new(-1, 0), Rotation::R180).unwrap();
        assert_eq!(
            board.skip_marker("p0"),
            Ok(GameEvent::MarkerSkipped {
                player: "p0".to_string()
            })
        );
        assert_eq!(board.last_placed(), None);
    }

    #[test]
    fn test_discard_only_when_unplayable() {
        let mut board = started(3, 2);
        assert_eq!(board.discard_current_tile("p0"), Err(GameError::TilePlayable));

        // A full city cannot border an all-field origin in any rotation
        let meadow = Arc::new(TileDefinition::new(
            0,
            [F, F, F, F],
            vec![Feature::field(&Direction::ALL)],
        ));
        let mut board = Board::from_tiles(meadow, vec![full_city(1), straight_road(2)]);
        board
            .add_player(Player::human("a", "A", PlayerColor::Red))
            .unwrap();
        board
            .add_player(Player::human("b", "B", PlayerColor::Blue))
            .unwrap();
        board.start().unwrap();
        assert!(board.valid_placements().is_empty());

        let event = board.discard_current_tile("a").unwrap();
        assert_eq!(
            event,
            GameEvent::TileDiscarded {
                player: "a".to_string(),
                tile_id: 1
            }
        );
        assert!(board.current_tile().is_none());
    }

    #[test]
    fn test_advance_turn_wraps_and_draws() {
        let mut board = started(10, 3);
        let start = board.current_player_index();
        for _ in 0..3 {
            let events = board.advance_turn().unwrap();
            assert!(matches!(events[1], GameEvent::TileDrawn { .. }));
        }
        assert_eq!(board.current_player_index(), start);
        assert!(board.current_tile().is_some());
    }

    #[test]
    fn test_exhaustion_ends_game() {
        let mut board = started(1, 2);
        assert_eq!(board.tiles_left(), 0);
        board.place_tile(Position::new(1, 0), Rotation::R0).unwrap();
        board.skip_marker("p0").unwrap();

        let events = board.advance_turn().unwrap();
        assert!(events.last().unwrap().is_game_end());
        assert_eq!(board.phase(), BoardPhase::Ended);
        assert!(board.current_tile().is_none());
        assert!(board.final_scores().is_some());

        assert_eq!(
            board.place_tile(Position::new(2, 0), Rotation::R0),
            Err(GameError::GameEnded)
        );
        assert_eq!(board.advance_turn(), Err(GameError::GameEnded));
    }

    #[test]
    fn test_snapshot_sorted_and_serializable() {
        let mut board = started(3, 2);
        board.place_tile(Position::new(-1, 0), Rotation::R0).unwrap();
        board.place_marker("p0", 0).unwrap();

        let snapshot = board.snapshot();
        let positions: Vec<_> = snapshot.tiles.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![Position::new(-1, 0), Position::ORIGIN]);
        assert_eq!(snapshot.current_player_id.as_deref(), Some("p0"));
        assert_eq!(snapshot.markers_on_board("p0"), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "playing");
        assert_eq!(json["tiles"][0]["rotation"], 0);
    }
}
