//! Registry of live rooms.
//!
//! The map is only ever locked for a single insert, lookup, delete or
//! snapshot. Callers get `Arc<Room>` handles back and take room locks after
//! the map guard is gone, so the two kinds of lock never nest.

use carcassonne_core::{Board, Player};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{ErrorCode, RoomInfo};
use crate::room::{Room, RoomError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Room {0} not found")]
    RoomNotFound(Uuid),

    #[error(transparent)]
    Room(#[from] RoomError),
}

impl DirectoryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DirectoryError::RoomNotFound(_) => ErrorCode::NotFound,
            DirectoryError::Room(e) => e.code(),
        }
    }
}

/// Result of a successful join
pub struct Joined {
    pub room: Arc<Room>,
    /// True when an existing member re-attached to a started game
    pub rejoined: bool,
}

type BoardFactory = Box<dyn Fn() -> Board + Send + Sync>;

/// All rooms by id.
pub struct RoomDirectory {
    rooms: DashMap<Uuid, Arc<Room>>,
    board_factory: BoardFactory,
}

impl RoomDirectory {
    /// Rooms get a freshly shuffled standard board
    pub fn new() -> Self {
        Self::with_board_factory(Board::new)
    }

    /// Rooms get boards from `factory`, e.g. a fixed pile in tests
    pub fn with_board_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Board + Send + Sync + 'static,
    {
        Self {
            rooms: DashMap::new(),
            board_factory: Box::new(factory),
        }
    }

    // ==================== Store ====================

    pub fn get(&self, id: &Uuid) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn put(&self, room: Arc<Room>) {
        self.rooms.insert(room.id, room);
    }

    pub fn delete(&self, id: &Uuid) -> Option<Arc<Room>> {
        self.rooms.remove(id).map(|(_, room)| room)
    }

    /// Handles to every room at this instant
    pub fn list_snapshot(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    // ==================== Lifecycle ====================

    /// Create a room with `creator` already seated
    pub async fn create_room(
        &self,
        name: &str,
        creator: Player,
        capacity: u32,
    ) -> Result<Arc<Room>, DirectoryError> {
        let room = Arc::new(Room::new(
            name,
            creator.id.clone(),
            capacity,
            (self.board_factory)(),
        ));
        room.add_player(creator).await?;
        self.put(Arc::clone(&room));
        Ok(room)
    }

    /// Join a waiting room, or re-attach to a started one as an existing member
    pub async fn join(&self, room_id: Uuid, player: Player) -> Result<Joined, DirectoryError> {
        let room = self
            .get(&room_id)
            .ok_or(DirectoryError::RoomNotFound(room_id))?;

        if room.is_started() && room.has_member(&player.id).await {
            room.rejoin(&player.id).await?;
            return Ok(Joined {
                room,
                rejoined: true,
            });
        }

        room.add_player(player).await?;
        Ok(Joined {
            room,
            rejoined: false,
        })
    }

    /// Leave a waiting room. Returns the room if it still exists afterwards.
    ///
    /// A room left without humans before it started is deleted.
    pub async fn leave(
        &self,
        room_id: Uuid,
        player_id: &str,
    ) -> Result<Option<Arc<Room>>, DirectoryError> {
        let room = self
            .get(&room_id)
            .ok_or(DirectoryError::RoomNotFound(room_id))?;

        let no_humans = room.remove_player(player_id).await?;
        if no_humans && !room.is_started() {
            self.delete(&room_id);
            return Ok(None);
        }
        Ok(Some(room))
    }

    /// Rooms that can still be joined, oldest first
    pub async fn active_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for room in self.list_snapshot() {
            let info = room.info().await;
            if !info.game_started && !info.is_full() {
                infos.push(info);
            }
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        infos
    }

    /// Drop rooms no connection is attached to once they have ended, or once
    /// a started game has sat idle for `idle_timeout` as of `now`
    pub fn collect_garbage<F>(
        &self,
        now: DateTime<Utc>,
        idle_timeout: Duration,
        is_attached: F,
    ) -> usize
    where
        F: Fn(&Uuid) -> bool,
    {
        let before = self.rooms.len();
        self.rooms.retain(|id, room| {
            if is_attached(id) {
                return true;
            }
            let abandoned = room.is_started() && room.idle_for(now) >= idle_timeout;
            !(room.is_ended() || abandoned)
        });
        before - self.rooms.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
