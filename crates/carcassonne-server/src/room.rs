//! Game room management.
//!
//! A room wraps one board together with its bot agents. All mutations take
//! the room's write lock for their whole duration, so turn actions inside one
//! room never interleave; reads take the read lock and hand back copies.

use carcassonne_core::bot::UnknownDifficulty;
use carcassonne_core::{
    Board, Bot, BotDifficulty, BotMove, GameError, GameEvent, GameSnapshot, Placement,
    PlacementError, Player, PlayerColor, PlayerId, Position, Rotation, TileDefinition,
    MAX_PLAYERS, MIN_PLAYERS,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::protocol::{ErrorCode, RoomInfo};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player {0} is already in the room")]
    AlreadyMember(PlayerId),

    #[error("Color {0} is already taken")]
    ColorTaken(PlayerColor),

    #[error("No available colors for bot")]
    NoColorAvailable,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Only the room creator can do that")]
    NotCreator,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Need at least {} players to start", MIN_PLAYERS)]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Game is over")]
    GameEnded,

    #[error("Not your turn")]
    NotYourTurn,

    #[error(transparent)]
    InvalidDifficulty(#[from] UnknownDifficulty),

    #[error("Illegal placement: {0}")]
    IllegalPlacement(PlacementError),

    #[error("Illegal marker: {0}")]
    IllegalMarker(GameError),

    #[error("Invalid action: {0}")]
    InvalidAction(GameError),
}

impl RoomError {
    /// Protocol code reported to the client
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::RoomFull => ErrorCode::CapacityExceeded,
            RoomError::AlreadyMember(_) => ErrorCode::AlreadyInRoom,
            RoomError::ColorTaken(_) | RoomError::NoColorAvailable => ErrorCode::ColorUnavailable,
            RoomError::PlayerNotInRoom => ErrorCode::NotInRoom,
            RoomError::NotCreator => ErrorCode::NotCreator,
            RoomError::GameAlreadyStarted => ErrorCode::AlreadyStarted,
            RoomError::NotEnoughPlayers => ErrorCode::InsufficientPlayers,
            RoomError::GameNotStarted | RoomError::InvalidAction(_) => ErrorCode::InvalidAction,
            RoomError::GameEnded => ErrorCode::GameEnded,
            RoomError::NotYourTurn => ErrorCode::NotYourTurn,
            RoomError::InvalidDifficulty(_) => ErrorCode::InvalidDifficulty,
            RoomError::IllegalPlacement(_) => ErrorCode::IllegalPlacement,
            RoomError::IllegalMarker(_) => ErrorCode::IllegalMarker,
        }
    }
}

impl From<GameError> for RoomError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::AlreadyStarted => RoomError::GameAlreadyStarted,
            GameError::TooManyPlayers => RoomError::RoomFull,
            GameError::DuplicatePlayer(id) => RoomError::AlreadyMember(id),
            GameError::NotEnoughPlayers => RoomError::NotEnoughPlayers,
            GameError::NotStarted => RoomError::GameNotStarted,
            GameError::GameEnded => RoomError::GameEnded,
            GameError::IllegalPlacement(e) => RoomError::IllegalPlacement(e),
            GameError::PlayerNotFound(_) => RoomError::PlayerNotInRoom,
            GameError::NoMarkersLeft
            | GameError::NoPlacedTile
            | GameError::InvalidFeature(_)
            | GameError::FeatureOccupied(_) => RoomError::IllegalMarker(err),
            GameError::NoCurrentTile | GameError::TilePlayable => RoomError::InvalidAction(err),
        }
    }
}

/// Requested capacities outside `2..=5` fall back to 5
pub fn normalize_capacity(requested: u32) -> usize {
    let requested = requested as usize;
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&requested) {
        requested
    } else {
        MAX_PLAYERS
    }
}

/// Whose turn it is, what they hold and where it fits
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    pub current_player: PlayerId,
    pub current_tile: Option<Arc<TileDefinition>>,
    pub valid_placements: Vec<Placement>,
}

/// State guarded by the room lock.
///
/// Membership lives on the board in turn order; bots additionally keep their
/// agent here.
struct RoomState {
    board: Board,
    bots: HashMap<PlayerId, Bot>,
    creator_id: PlayerId,
}

impl RoomState {
    fn is_member(&self, player_id: &str) -> bool {
        self.board.player(player_id).is_some()
    }

    fn has_humans(&self) -> bool {
        self.board.players().iter().any(|p| !p.is_bot)
    }

    /// Check that `player_id` may act right now
    fn ensure_turn(&self, player_id: &str) -> Result<(), RoomError> {
        if !self.board.is_started() {
            return Err(RoomError::GameNotStarted);
        }
        if self.board.is_ended() {
            return Err(RoomError::GameEnded);
        }
        if !self.is_member(player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }
        match self.board.current_player() {
            Some(current) if current.id == player_id => Ok(()),
            _ => Err(RoomError::NotYourTurn),
        }
    }
}

/// A game room holding up to five players.
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub capacity: usize,
    pub created_at: DateTime<Utc>,
    /// Mirrors of the board phase, readable without the lock
    started: AtomicBool,
    ended: AtomicBool,
    /// Unix millis of the last mutating call
    last_activity: AtomicI64,
    state: RwLock<RoomState>,
}

impl Room {
    pub fn new(name: impl Into<String>, creator_id: PlayerId, capacity: u32, board: Board) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capacity: normalize_capacity(capacity),
            created_at,
            started: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            last_activity: AtomicI64::new(created_at.timestamp_millis()),
            state: RwLock::new(RoomState {
                board,
                bots: HashMap::new(),
                creator_id,
            }),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Time since the last mutating call, zero if `now` is earlier
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now.timestamp_millis() - self.last_activity.load(Ordering::Acquire);
        Duration::from_millis(elapsed.max(0) as u64)
    }

    fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    // ==================== Membership ====================

    /// Seat a human player
    pub async fn add_player(&self, player: Player) -> Result<(), RoomError> {
        let mut state = self.state.write().await;
        self.touch();

        if state.board.is_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        if state.board.player_count() >= self.capacity {
            return Err(RoomError::RoomFull);
        }
        if state.is_member(&player.id) {
            return Err(RoomError::AlreadyMember(player.id));
        }
        if state.board.players().iter().any(|p| p.color == player.color) {
            return Err(RoomError::ColorTaken(player.color));
        }

        state.board.add_player(player)?;
        Ok(())
    }

    /// Seat a bot with the first free palette color
    pub async fn add_bot(
        &self,
        requester: &str,
        name: &str,
        difficulty: &str,
    ) -> Result<Player, RoomError> {
        let mut state = self.state.write().await;
        self.touch();

        if state.board.is_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        if state.creator_id != requester {
            return Err(RoomError::NotCreator);
        }
        if state.board.player_count() >= self.capacity {
            return Err(RoomError::RoomFull);
        }
        let difficulty: BotDifficulty = difficulty.parse()?;
        let color = PlayerColor::first_unused(state.board.players().iter().map(|p| &p.color))
            .ok_or(RoomError::NoColorAvailable)?;

        let bot_id = format!("bot-{}", Uuid::new_v4());
        let player = Player::bot(bot_id.clone(), name, color);
        state.board.add_player(player.clone())?;
        state.bots.insert(bot_id.clone(), Bot::new(bot_id, difficulty));

        Ok(player)
    }

    /// Remove a member before the game starts.
    ///
    /// Returns true when no human is left. If the creator leaves, the
    /// earliest-seated remaining human takes over.
    pub async fn remove_player(&self, player_id: &str) -> Result<bool, RoomError> {
        let mut state = self.state.write().await;
        self.touch();

        if state.board.is_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        state.board.remove_player(player_id)?;
        state.bots.remove(player_id);

        if state.creator_id == player_id {
            if let Some(next) = state.board.players().iter().find(|p| !p.is_bot) {
                state.creator_id = next.id.clone();
            }
        }

        Ok(!state.has_humans())
    }

    /// Re-attach a human member after a reconnect
    pub async fn rejoin(&self, player_id: &str) -> Result<Player, RoomError> {
        let state = self.state.read().await;
        match state.board.player(player_id) {
            Some(player) if !player.is_bot => {
                self.touch();
                Ok(player.clone())
            }
            _ => Err(RoomError::PlayerNotInRoom),
        }
    }

    /// Start the game. Creator only.
    pub async fn start(&self, requester: &str) -> Result<Vec<GameEvent>, RoomError> {
        let mut state = self.state.write().await;
        self.touch();

        if state.creator_id != requester {
            return Err(RoomError::NotCreator);
        }
        if state.board.is_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        if state.board.player_count() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }

        let events = state.board.start()?;
        self.started.store(true, Ordering::Release);
        self.sync_ended(&state.board);
        Ok(events)
    }

    // ==================== Turn Actions ====================

    pub async fn place_tile(
        &self,
        player_id: &str,
        position: Position,
        rotation: Rotation,
    ) -> Result<GameEvent, RoomError> {
        let mut state = self.state.write().await;
        self.touch();
        state.ensure_turn(player_id)?;
        Ok(state.board.place_tile(position, rotation)?)
    }

    pub async fn place_marker(
        &self,
        player_id: &str,
        feature_index: usize,
    ) -> Result<GameEvent, RoomError> {
        let mut state = self.state.write().await;
        self.touch();
        state.ensure_turn(player_id)?;
        Ok(state.board.place_marker(player_id, feature_index)?)
    }

    pub async fn skip_marker(&self, player_id: &str) -> Result<GameEvent, RoomError> {
        let mut state = self.state.write().await;
        self.touch();
        state.ensure_turn(player_id)?;
        Ok(state.board.skip_marker(player_id)?)
    }

    pub async fn discard_tile(&self, player_id: &str) -> Result<GameEvent, RoomError> {
        let mut state = self.state.write().await;
        self.touch();
        state.ensure_turn(player_id)?;
        Ok(state.board.discard_current_tile(player_id)?)
    }

    /// Pass the turn. Called after a completed action, so no ownership check.
    pub async fn advance_turn(&self) -> Result<Vec<GameEvent>, RoomError> {
        let mut state = self.state.write().await;
        self.touch();
        let events = state.board.advance_turn()?;
        self.sync_ended(&state.board);
        Ok(events)
    }

    /// Ask the current bot, if it is a bot's turn, what it wants to do.
    ///
    /// The inner `None` means the bot has no legal placement.
    pub async fn decide_bot_move(&self) -> Option<(PlayerId, Option<BotMove>)> {
        let mut state = self.state.write().await;
        let RoomState { board, bots, .. } = &mut *state;

        if !board.is_started() || board.is_ended() {
            return None;
        }
        let current = board.current_player()?;
        if !current.is_bot {
            return None;
        }
        let bot = bots.get_mut(&current.id)?;
        Some((current.id.clone(), bot.decide(board)))
    }

    // ==================== Queries ====================

    pub async fn game_state(&self) -> GameSnapshot {
        self.state.read().await.board.snapshot()
    }

    /// Members in turn order
    pub async fn players(&self) -> Vec<Player> {
        self.state.read().await.board.players().to_vec()
    }

    pub async fn is_current_player_bot(&self) -> bool {
        let state = self.state.read().await;
        state.board.is_started()
            && !state.board.is_ended()
            && state.board.current_player().map_or(false, |p| p.is_bot)
    }

    /// The current turn, or `None` before start and after the end
    pub async fn turn_view(&self) -> Option<TurnView> {
        let state = self.state.read().await;
        if !state.board.is_started() || state.board.is_ended() {
            return None;
        }
        let current = state.board.current_player()?;
        Some(TurnView {
            current_player: current.id.clone(),
            current_tile: state.board.current_tile().cloned(),
            valid_placements: state.board.valid_placements(),
        })
    }

    pub async fn final_scores(&self) -> Option<BTreeMap<PlayerId, u32>> {
        self.state.read().await.board.final_scores().cloned()
    }

    pub async fn has_member(&self, player_id: &str) -> bool {
        self.state.read().await.is_member(player_id)
    }

    pub async fn member_count(&self) -> usize {
        self.state.read().await.board.player_count()
    }

    pub async fn creator_id(&self) -> PlayerId {
        self.state.read().await.creator_id.clone()
    }

    pub async fn info(&self) -> RoomInfo {
        let state = self.state.read().await;
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            player_count: state.board.player_count(),
            max_players: self.capacity,
            game_started: state.board.is_started(),
            game_ended: state.board.is_ended(),
            created_by: state.creator_id.clone(),
            created_at: self.created_at,
        }
    }

    fn sync_ended(&self, board: &Board) {
        if board.is_ended() {
            self.ended.store(true, Ordering::Release);
        }
    }
}
