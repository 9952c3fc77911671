use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::model::*;

use super::conflict::{total_price, validate_span};
use super::{Engine, EngineError, SharedRoomState};

/// Listing filters shared by the booking list operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

fn paginate<T>(mut items: Vec<T>, filter: &BookingFilter) -> Page<T> {
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let pages = total.div_ceil(per_page);
    let offset = (page - 1) * per_page;
    let items = if offset >= total {
        Vec::new()
    } else {
        items.drain(offset..(offset + per_page).min(total)).collect()
    };
    Page {
        items,
        page,
        per_page,
        total,
        pages,
    }
}

impl Engine {
    pub fn list_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter_map(|entry| {
                let rs = entry.value().clone();
                rs.try_read().ok().map(|guard| guard.room.clone())
            })
            .collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        rooms
    }

    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::RoomNotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .room_for_booking(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        guard
            .find_booking(id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))
    }

    /// Owner lookup for the access guard. Same read path as `get_booking`,
    /// but only the owning principal id leaves the lock.
    pub async fn booking_owner(&self, id: Ulid) -> Result<Ulid, EngineError> {
        Ok(self.get_booking(id).await?.principal_id)
    }

    /// All bookings across all rooms, filtered and paginated. Ordered by
    /// (start date, id) so pages are stable between calls.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Page<Booking> {
        self.collect_bookings(None, filter).await
    }

    /// One principal's bookings, same filtering and ordering.
    pub async fn list_principal_bookings(
        &self,
        principal_id: Ulid,
        filter: BookingFilter,
    ) -> Page<Booking> {
        self.collect_bookings(Some(principal_id), filter).await
    }

    async fn collect_bookings(
        &self,
        principal_id: Option<Ulid>,
        filter: BookingFilter,
    ) -> Page<Booking> {
        let room_states: Vec<SharedRoomState> =
            self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut bookings = Vec::new();
        for rs in room_states {
            let guard = rs.read().await;
            for booking in &guard.bookings {
                if let Some(pid) = principal_id
                    && booking.principal_id != pid {
                        continue;
                    }
                if let Some(status) = filter.status
                    && booking.status != status {
                        continue;
                    }
                bookings.push(booking.clone());
            }
        }
        bookings.sort_by(|a, b| (a.span.start, a.id).cmp(&(b.span.start, b.id)));
        paginate(bookings, &filter)
    }

    /// Quote `nights * rate` for a prospective stay without writing
    /// anything. `RoomNotFound` if the room id does not resolve,
    /// `InvalidRange` if the span has no nights.
    pub async fn quote_total_price(
        &self,
        room_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Price, EngineError> {
        let span = validate_span(start, end)?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        Ok(total_price(guard.room.rate, &span))
    }
}
