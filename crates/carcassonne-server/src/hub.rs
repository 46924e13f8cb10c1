//! The dispatcher that owns every live connection.
//!
//! One task runs the hub loop. Transport tasks talk to it only through
//! `HubCommand`s on an unbounded channel, so the connection table is never
//! shared. The loop also owns the bot timer: each tick plays at most one bot
//! turn per room, through the same room operations a human request uses.
//!
//! Outbound delivery never blocks the loop. Each connection has a bounded
//! queue; a connection whose queue is full or closed is marked dead and torn
//! down once the current command has been handled.

use carcassonne_core::{BotMove, GameEvent, Player, PlayerId};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::{DirectoryError, RoomDirectory};
use crate::protocol::{ClientMessage, ErrorCode, Outbound, RawEnvelope, ServerMessage};
use crate::room::{Room, RoomError};

pub type ConnectionId = Uuid;

/// Everything the hub loop reacts to
#[derive(Debug)]
pub enum HubCommand {
    /// A transport accepted a connection
    Register {
        id: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    },
    /// The connection closed
    Unregister { id: ConnectionId },
    /// A text frame arrived
    Inbound { id: ConnectionId, text: String },
    /// Stop the loop
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("hub is not running")]
pub struct HubClosed;

/// Cloneable sender side of the hub loop
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn send(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.tx.send(command).map_err(|_| HubClosed)
    }

    pub fn register(
        &self,
        id: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(), HubClosed> {
        self.send(HubCommand::Register { id, sender })
    }

    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubClosed> {
        self.send(HubCommand::Unregister { id })
    }

    pub fn inbound(&self, id: ConnectionId, text: String) -> Result<(), HubClosed> {
        self.send(HubCommand::Inbound { id, text })
    }

    pub fn shutdown(&self) -> Result<(), HubClosed> {
        self.send(HubCommand::Shutdown)
    }
}

/// What drives bot turns
#[derive(Debug)]
pub enum BotSchedule {
    /// Wall-clock period
    Interval(Duration),
    /// One tick per message received, for tests
    Manual(mpsc::Receiver<()>),
}

enum BotTimer {
    Interval(Interval),
    Manual(mpsc::Receiver<()>),
}

impl BotTimer {
    fn new(schedule: BotSchedule) -> Self {
        match schedule {
            BotSchedule::Interval(period) => {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                BotTimer::Interval(interval)
            }
            BotSchedule::Manual(rx) => BotTimer::Manual(rx),
        }
    }

    async fn tick(&mut self) {
        match self {
            BotTimer::Interval(interval) => {
                interval.tick().await;
            }
            BotTimer::Manual(rx) => {
                if rx.recv().await.is_none() {
                    // Trigger dropped: never tick again
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

/// Per-request failures, reported to the sender only
#[derive(Debug, Error)]
enum RequestError {
    #[error("Must connect first")]
    NotConnected,

    #[error("Not in any room")]
    NotInRoom,

    #[error("Already in room {0}")]
    AlreadyInRoom(Uuid),

    #[error("Player {0} is already connected")]
    IdentityInUse(PlayerId),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

impl RequestError {
    fn code(&self) -> ErrorCode {
        match self {
            RequestError::NotConnected => ErrorCode::NotConnected,
            RequestError::NotInRoom => ErrorCode::NotInRoom,
            RequestError::AlreadyInRoom(_) => ErrorCode::AlreadyInRoom,
            RequestError::IdentityInUse(_) => ErrorCode::IdentityInUse,
            RequestError::Directory(e) => e.code(),
            RequestError::Room(e) => e.code(),
        }
    }
}

/// A live connection as the hub sees it
struct Connection {
    sender: mpsc::Sender<Outbound>,
    player: Option<Player>,
    room_id: Option<Uuid>,
}

/// The dispatcher state, owned by the hub loop.
pub struct Hub {
    connections: HashMap<ConnectionId, Connection>,
    directory: Arc<RoomDirectory>,
    /// Connections that failed a send, torn down after the current command
    dead: Vec<ConnectionId>,
    /// Started rooms nobody is attached to are reclaimed after this long idle
    idle_room_timeout: Duration,
}

impl Hub {
    pub fn new(directory: Arc<RoomDirectory>, idle_room_timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            directory,
            dead: Vec::new(),
            idle_room_timeout,
        }
    }

    /// Start the hub loop on its own task
    pub fn spawn(self, schedule: BotSchedule) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx, schedule));
        (HubHandle { tx }, task)
    }

    /// Run until `Shutdown` or until every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>, schedule: BotSchedule) {
        let mut timer = BotTimer::new(schedule);
        info!("Hub started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(HubCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                _ = timer.tick() => self.bot_tick().await,
            }
            self.reap_dead().await;
        }

        info!(connections = self.connection_count(), "Hub stopped");
    }

    async fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, sender } => self.register(id, sender),
            HubCommand::Unregister { id } => self.unregister(id).await,
            HubCommand::Inbound { id, text } => self.handle_text(id, &text).await,
            HubCommand::Shutdown => {}
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ==================== Connection Lifecycle ====================

    pub fn register(&mut self, id: ConnectionId, sender: mpsc::Sender<Outbound>) {
        self.connections.insert(
            id,
            Connection {
                sender,
                player: None,
                room_id: None,
            },
        );
        info!(connection = %id, "Connection registered");
    }

    /// Drop a connection and give up its seat if the game has not started
    pub async fn unregister(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(&id) else {
            return;
        };
        info!(connection = %id, "Connection unregistered");

        let (Some(player), Some(room_id)) = (connection.player, connection.room_id) else {
            return;
        };

        match self.directory.leave(room_id, &player.id).await {
            Ok(Some(room)) => {
                let state = room_state(&room).await;
                self.fan_out(room_id, state, None);
            }
            Ok(None) => info!(room = %room_id, "Room closed after last player left"),
            Err(e) => debug!(room = %room_id, player = %player.id, "Seat kept: {e}"),
        }
    }

    /// Tear down every connection that failed a send
    pub async fn reap_dead(&mut self) {
        while let Some(id) = self.dead.pop() {
            if self.connections.contains_key(&id) {
                warn!(connection = %id, "Tearing down unresponsive connection");
                self.unregister(id).await;
            }
        }
    }

    fn is_attached(&self, room_id: &Uuid) -> bool {
        self.connections
            .values()
            .any(|c| c.room_id.as_ref() == Some(room_id))
    }

    // ==================== Delivery ====================

    fn send(&mut self, id: ConnectionId, outbound: Outbound) {
        let Some(connection) = self.connections.get(&id) else {
            return;
        };
        if let Err(e) = connection.sender.try_send(outbound) {
            warn!(connection = %id, "Send failed: {e}");
            self.dead.push(id);
        }
    }

    fn reply(&mut self, id: ConnectionId, correlation_id: Option<String>, message: ServerMessage) {
        self.send(id, Outbound::reply(message, correlation_id));
    }

    /// Send to every connection attached to a room. The origin connection,
    /// if given, gets its correlation id on the copy it receives.
    fn fan_out(
        &mut self,
        room_id: Uuid,
        message: ServerMessage,
        origin: Option<(ConnectionId, Option<String>)>,
    ) {
        for (id, connection) in &self.connections {
            if connection.room_id != Some(room_id) {
                continue;
            }
            let outbound = match &origin {
                Some((origin_id, cid)) if origin_id == id => Outbound::reply(message.clone(), cid.clone()),
                _ => Outbound::push(message.clone()),
            };
            if let Err(e) = connection.sender.try_send(outbound) {
                warn!(connection = %id, room = %room_id, "Broadcast failed: {e}");
                self.dead.push(*id);
            }
        }
    }

    // ==================== Request Routing ====================

    /// Decode one text frame and route it
    pub async fn handle_text(&mut self, id: ConnectionId, text: &str) {
        let envelope = match RawEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(connection = %id, "Rejected frame: {e}");
                self.reply(id, None, ServerMessage::error(e.code(), e.to_string()));
                return;
            }
        };
        let correlation_id = envelope.correlation_id.clone();

        let message = match envelope.decode() {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %id, "Rejected request: {e}");
                self.reply(id, correlation_id, ServerMessage::error(e.code(), e.to_string()));
                return;
            }
        };

        let kind = message.kind();
        debug!(connection = %id, %kind, "Routing request");
        if let Err(e) = self.handle_message(id, message, correlation_id.clone()).await {
            warn!(connection = %id, %kind, "Request failed: {e}");
            self.reply(id, correlation_id, ServerMessage::error(e.code(), e.to_string()));
        }
    }

    async fn handle_message(
        &mut self,
        id: ConnectionId,
        message: ClientMessage,
        cid: Option<String>,
    ) -> Result<(), RequestError> {
        match message {
            ClientMessage::Connect(payload) => {
                if let Some(room_id) = self.connections.get(&id).and_then(|c| c.room_id) {
                    return Err(RequestError::AlreadyInRoom(room_id));
                }
                let taken = self.connections.iter().any(|(other, c)| {
                    *other != id && c.player.as_ref().map(|p| &p.id) == Some(&payload.player_id)
                });
                if taken {
                    return Err(RequestError::IdentityInUse(payload.player_id));
                }

                let player = Player::human(payload.player_id, payload.name, payload.color);
                if let Some(connection) = self.connections.get_mut(&id) {
                    connection.player = Some(player.clone());
                }
                info!(connection = %id, player = %player.id, "Player connected");

                let rooms = self.directory.active_rooms().await;
                self.reply(id, cid, ServerMessage::Connected { player, rooms });
            }

            ClientMessage::ListRooms => {
                let rooms = self.directory.active_rooms().await;
                self.reply(id, cid, ServerMessage::RoomList { rooms });
            }

            ClientMessage::CreateRoom(payload) => {
                let player = self.require_player(id)?;
                self.require_no_room(id)?;

                let room = self
                    .directory
                    .create_room(&payload.room_name, player, payload.max_players)
                    .await?;
                self.attach(id, Some(room.id));
                info!(room = %room.id, name = %room.name, capacity = room.capacity, "Room created");

                let state = room_state(&room).await;
                self.fan_out(room.id, state, Some((id, cid)));
            }

            ClientMessage::JoinRoom(payload) => {
                let player = self.require_player(id)?;
                self.require_no_room(id)?;

                let joined = self.directory.join(payload.room_id, player).await?;
                let room = joined.room;
                self.attach(id, Some(room.id));

                if joined.rejoined {
                    info!(room = %room.id, connection = %id, "Player rejoined game");
                    let state = room.game_state().await;
                    self.reply(id, cid, ServerMessage::GameState { state });
                    if let Some(turn) = turn_start(&room).await {
                        self.reply(id, None, turn);
                    }
                } else {
                    let state = room_state(&room).await;
                    self.fan_out(room.id, state, Some((id, cid)));
                }
            }

            ClientMessage::LeaveRoom => {
                let player = self.require_player(id)?;
                let room_id = self.require_room_id(id)?;

                let remaining = self.directory.leave(room_id, &player.id).await?;
                self.attach(id, None);
                if let Some(room) = remaining {
                    let state = room_state(&room).await;
                    self.fan_out(room_id, state, None);
                }

                let rooms = self.directory.active_rooms().await;
                self.reply(id, cid, ServerMessage::RoomList { rooms });
            }

            ClientMessage::AddBot(payload) => {
                let (player, room) = self.require_room(id)?;
                let bot = room
                    .add_bot(&player.id, &payload.bot_name, &payload.difficulty)
                    .await?;
                let seated = room.member_count().await;
                info!(room = %room.id, bot = %bot.id, difficulty = %payload.difficulty, seated, "Bot added");

                let state = room_state(&room).await;
                self.fan_out(room.id, state, Some((id, cid)));
            }

            ClientMessage::StartGame => {
                let (player, room) = self.require_room(id)?;
                room.start(&player.id).await?;
                let players = room.players().await;
                info!(room = %room.id, players = players.len(), "Game started");

                self.fan_out(
                    room.id,
                    ServerMessage::GameStarted {
                        room_id: room.id,
                        players,
                    },
                    Some((id, cid)),
                );
                self.announce_turn(&room).await;
            }

            ClientMessage::PlaceTile(payload) => {
                let (player, room) = self.require_room(id)?;
                let event = room
                    .place_tile(&player.id, payload.position, payload.rotation)
                    .await?;

                self.reply(id, cid, ServerMessage::ActionResult { events: vec![event] });
                let state = room.game_state().await;
                self.fan_out(room.id, ServerMessage::GameState { state }, None);
            }

            ClientMessage::PlaceMarker(payload) => {
                let (player, room) = self.require_room(id)?;
                let event = room.place_marker(&player.id, payload.feature_index).await?;
                self.finish_turn(id, cid, &room, event).await?;
            }

            ClientMessage::SkipMarker => {
                let (player, room) = self.require_room(id)?;
                let event = room.skip_marker(&player.id).await?;
                self.finish_turn(id, cid, &room, event).await?;
            }

            ClientMessage::DiscardTile => {
                let (player, room) = self.require_room(id)?;
                let event = room.discard_tile(&player.id).await?;
                self.finish_turn(id, cid, &room, event).await?;
            }

            ClientMessage::Ping(payload) => {
                self.reply(
                    id,
                    cid,
                    ServerMessage::Pong {
                        timestamp: payload.timestamp,
                        client_id: payload.client_id,
                        server_time: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    fn require_player(&self, id: ConnectionId) -> Result<Player, RequestError> {
        self.connections
            .get(&id)
            .and_then(|c| c.player.clone())
            .ok_or(RequestError::NotConnected)
    }

    fn require_no_room(&self, id: ConnectionId) -> Result<(), RequestError> {
        match self.connections.get(&id).and_then(|c| c.room_id) {
            Some(room_id) => Err(RequestError::AlreadyInRoom(room_id)),
            None => Ok(()),
        }
    }

    fn require_room_id(&self, id: ConnectionId) -> Result<Uuid, RequestError> {
        self.connections
            .get(&id)
            .and_then(|c| c.room_id)
            .ok_or(RequestError::NotInRoom)
    }

    fn require_room(&self, id: ConnectionId) -> Result<(Player, Arc<Room>), RequestError> {
        let player = self.require_player(id)?;
        let room_id = self.require_room_id(id)?;
        let room = self
            .directory
            .get(&room_id)
            .ok_or(DirectoryError::RoomNotFound(room_id))?;
        Ok((player, room))
    }

    fn attach(&mut self, id: ConnectionId, room_id: Option<Uuid>) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.room_id = room_id;
        }
    }

    // ==================== Turn Completion ====================

    /// Reply to a turn-ending human action and move the game on
    async fn finish_turn(
        &mut self,
        id: ConnectionId,
        cid: Option<String>,
        room: &Room,
        event: GameEvent,
    ) -> Result<(), RequestError> {
        let mut events = vec![event];
        events.extend(self.complete_turn(room).await?);
        self.reply(id, cid, ServerMessage::ActionResult { events });
        Ok(())
    }

    /// Advance the turn and tell the room what happens next.
    ///
    /// Shared by human and bot turns.
    async fn complete_turn(&mut self, room: &Room) -> Result<Vec<GameEvent>, RoomError> {
        let events = room.advance_turn().await?;
        self.announce_turn(room).await;
        Ok(events)
    }

    /// Broadcast the game state, then either the next turn or the final result
    async fn announce_turn(&mut self, room: &Room) {
        let state = room.game_state().await;
        self.fan_out(room.id, ServerMessage::GameState { state }, None);

        if room.is_ended() {
            let final_scores = room.final_scores().await.unwrap_or_default();
            info!(room = %room.id, ?final_scores, "Game over");
            let winners = winners(&final_scores);
            self.fan_out(
                room.id,
                ServerMessage::GameOver {
                    final_scores,
                    winners,
                },
                None,
            );
        } else if let Some(turn) = turn_start(room).await {
            self.fan_out(room.id, turn, None);
        }
    }

    // ==================== Bots ====================

    /// Play one bot turn in every room waiting on a bot, then drop finished
    /// or abandoned rooms nobody is watching
    pub async fn bot_tick(&mut self) {
        if self.directory.is_empty() {
            return;
        }
        for room in self.directory.list_snapshot() {
            if !room.is_started() || room.is_ended() {
                continue;
            }
            let Some((bot_id, decision)) = room.decide_bot_move().await else {
                continue;
            };
            if let Err(e) = self.play_bot_turn(&room, &bot_id, decision).await {
                warn!(room = %room.id, bot = %bot_id, "Bot turn failed: {e}");
            }
        }

        let directory = Arc::clone(&self.directory);
        let removed = directory.collect_garbage(Utc::now(), self.idle_room_timeout, |room_id| {
            self.is_attached(room_id)
        });
        if removed > 0 {
            info!(removed, remaining = directory.len(), "Collected finished rooms");
        }
    }

    async fn play_bot_turn(
        &mut self,
        room: &Room,
        bot_id: &str,
        decision: Option<BotMove>,
    ) -> Result<(), RoomError> {
        match decision {
            Some(mv) => {
                room.place_tile(bot_id, mv.placement.position, mv.placement.rotation)
                    .await?;
                match mv.marker {
                    Some(feature_index) => {
                        if let Err(e) = room.place_marker(bot_id, feature_index).await {
                            debug!(room = %room.id, bot = %bot_id, "Marker refused, skipping: {e}");
                            room.skip_marker(bot_id).await?;
                        }
                    }
                    None => {
                        room.skip_marker(bot_id).await?;
                    }
                }
            }
            None => {
                room.discard_tile(bot_id).await?;
            }
        }
        debug!(room = %room.id, bot = %bot_id, ?decision, "Bot moved");

        self.fan_out(
            room.id,
            ServerMessage::BotMoved {
                bot_id: bot_id.to_string(),
                bot_move: decision,
            },
            None,
        );
        self.complete_turn(room).await?;
        Ok(())
    }
}

async fn room_state(room: &Room) -> ServerMessage {
    ServerMessage::RoomState {
        room: room.info().await,
        players: room.players().await,
    }
}

async fn turn_start(room: &Room) -> Option<ServerMessage> {
    let turn = room.turn_view().await?;
    Some(ServerMessage::TurnStart {
        current_player: turn.current_player,
        current_tile: turn.current_tile,
        valid_placements: turn.valid_placements,
    })
}

/// Everyone sharing the top score
fn winners(scores: &BTreeMap<PlayerId, u32>) -> Vec<PlayerId> {
    let Some(best) = scores.values().max() else {
        return Vec::new();
    };
    scores
        .iter()
        .filter(|(_, score)| *score == best)
        .map(|(id, _)| id.clone())
        .collect()
}
