mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;
pub use queries::BookingFilter;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Authoritative record store for principals, rooms, and bookings.
///
/// Every booking lives inside its room's `RoomState`, and every
/// check-then-write sequence for a room runs under that room's write lock.
/// Two racing creates for overlapping spans therefore serialize: the second
/// one re-checks against the committed state and observes the conflict.
pub struct Engine {
    rooms: DashMap<Ulid, SharedRoomState>,
    /// Unique room number → room id.
    room_numbers: DashMap<String, Ulid>,
    principals: DashMap<Ulid, Principal>,
    /// Unique email → principal id.
    emails: DashMap<String, Ulid>,
    /// Reverse lookup: booking id → room id.
    booking_to_room: DashMap<Ulid, Ulid>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            principals: DashMap::new(),
            emails: DashMap::new(),
            booking_to_room: DashMap::new(),
        }
    }

    pub fn get_room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }

    pub fn get_principal(&self, id: &Ulid) -> Option<Principal> {
        self.principals.get(id).map(|e| e.value().clone())
    }

    /// Lookup booking → room, fetch the room, acquire its write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .room_for_booking(booking_id)
            .ok_or(EngineError::BookingNotFound(*booking_id))?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.write_owned().await;
        // A delete may have unlinked the room while we queued on the lock.
        if !self.rooms.contains_key(&room_id) {
            return Err(EngineError::BookingNotFound(*booking_id));
        }
        Ok((room_id, guard))
    }
}
