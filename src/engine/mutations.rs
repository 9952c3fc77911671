use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, total_price, validate_span};
use super::{Engine, EngineError};

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::Validation("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), EngineError> {
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::Validation("malformed email address"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    Ok(())
}

fn validate_room_number(number: &str) -> Result<(), EngineError> {
    if number.is_empty() {
        return Err(EngineError::Validation("room number must not be empty"));
    }
    if number.len() > MAX_ROOM_NUMBER_LEN {
        return Err(EngineError::LimitExceeded("room number too long"));
    }
    Ok(())
}

impl Engine {
    // ── Principals ───────────────────────────────────────────

    pub fn register_principal(
        &self,
        id: Ulid,
        name: String,
        email: String,
        phone: Option<String>,
        role: Role,
    ) -> Result<Principal, EngineError> {
        validate_name(&name)?;
        validate_email(&email)?;
        if let Some(ref p) = phone
            && p.len() > MAX_PHONE_LEN {
                return Err(EngineError::LimitExceeded("phone too long"));
            }

        // Entry holds the shard lock, so two racing registrations with the
        // same email cannot both pass.
        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => return Err(EngineError::DuplicateEmail(email)),
            Entry::Vacant(v) => {
                v.insert(id);
            }
        }

        let principal = Principal {
            id,
            name,
            email,
            phone,
            role,
        };
        self.principals.insert(id, principal.clone());
        Ok(principal)
    }

    pub fn update_profile(&self, id: Ulid, patch: ProfilePatch) -> Result<Principal, EngineError> {
        let current = self
            .get_principal(&id)
            .ok_or(EngineError::PrincipalNotFound(id))?;

        if let Some(ref name) = patch.name {
            validate_name(name)?;
        }
        if let Some(ref phone) = patch.phone
            && phone.len() > MAX_PHONE_LEN {
                return Err(EngineError::LimitExceeded("phone too long"));
            }
        if let Some(ref email) = patch.email
            && *email != current.email {
                validate_email(email)?;
                match self.emails.entry(email.clone()) {
                    Entry::Occupied(_) => {
                        return Err(EngineError::DuplicateEmail(email.clone()));
                    }
                    Entry::Vacant(v) => {
                        v.insert(id);
                    }
                }
                self.emails.remove(&current.email);
            }

        let mut entry = self
            .principals
            .get_mut(&id)
            .ok_or(EngineError::PrincipalNotFound(id))?;
        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(email) = patch.email {
            entry.email = email;
        }
        if let Some(phone) = patch.phone {
            entry.phone = Some(phone);
        }
        Ok(entry.clone())
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn create_room(
        &self,
        id: Ulid,
        number: String,
        category: RoomCategory,
        rate: Price,
        status: RoomStatus,
    ) -> Result<Room, EngineError> {
        validate_room_number(&number)?;
        if rate <= 0 {
            return Err(EngineError::Validation("nightly rate must be positive"));
        }

        match self.room_numbers.entry(number.clone()) {
            Entry::Occupied(_) => return Err(EngineError::DuplicateRoomNumber(number)),
            Entry::Vacant(v) => {
                v.insert(id);
            }
        }

        let room = Room {
            id,
            number,
            category,
            rate,
            status,
        };
        self.rooms
            .insert(id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        Ok(room)
    }

    /// Rate changes never retro-price existing bookings: a booking's price
    /// is fixed at its own creation/modification time.
    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::RoomNotFound(id))?;
        let mut guard = rs.write().await;
        if !self.rooms.contains_key(&id) {
            return Err(EngineError::RoomNotFound(id));
        }

        if let Some(rate) = patch.rate
            && rate <= 0 {
                return Err(EngineError::Validation("nightly rate must be positive"));
            }
        if let Some(ref number) = patch.number
            && *number != guard.room.number {
                validate_room_number(number)?;
                match self.room_numbers.entry(number.clone()) {
                    Entry::Occupied(_) => {
                        return Err(EngineError::DuplicateRoomNumber(number.clone()));
                    }
                    Entry::Vacant(v) => {
                        v.insert(id);
                    }
                }
                self.room_numbers.remove(&guard.room.number);
            }

        if let Some(number) = patch.number {
            guard.room.number = number;
        }
        if let Some(category) = patch.category {
            guard.room.category = category;
        }
        if let Some(rate) = patch.rate {
            guard.room.rate = rate;
        }
        if let Some(status) = patch.status {
            guard.room.status = status;
        }
        Ok(guard.room.clone())
    }

    /// Refused while active bookings reference the room — no cascade.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::RoomNotFound(id))?;
        let guard = rs.write().await;
        if guard.has_active_bookings() {
            return Err(EngineError::RoomHasBookings(id));
        }
        for booking in &guard.bookings {
            self.booking_to_room.remove(&booking.id);
        }
        self.room_numbers.remove(&guard.room.number);
        // Unlinked while the lock is still held: a writer queued behind us
        // re-checks the table after acquiring the lock and finds the room
        // gone, instead of committing into the orphaned state.
        self.rooms.remove(&id);
        Ok(())
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Conflict check, price computation, and the insert all happen under
    /// the room's write lock.
    pub async fn create_booking(
        &self,
        id: Ulid,
        principal_id: Ulid,
        room_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let span = validate_span(start, end)?;
        if !self.principals.contains_key(&principal_id) {
            return Err(EngineError::PrincipalNotFound(principal_id));
        }
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let mut guard = rs.write().await;
        // The room may have been deleted while we waited for the lock.
        if !self.rooms.contains_key(&room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        check_no_conflict(&guard, &span, None)?;

        let booking = Booking {
            id,
            principal_id,
            room_id,
            span,
            status: BookingStatus::Active,
            total_price: total_price(guard.room.rate, &span),
        };
        guard.insert_booking(booking.clone());
        self.booking_to_room.insert(id, room_id);
        Ok(booking)
    }

    /// Any change to room, start, or end re-runs the conflict check
    /// (excluding the booking itself) and recomputes the price against the
    /// target room's rate. Moving between rooms takes both room locks in
    /// sorted id order so two opposing moves cannot deadlock.
    pub async fn update_booking(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        let src_room_id = self
            .room_for_booking(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        let dst_room_id = patch.room_id.unwrap_or(src_room_id);

        if dst_room_id == src_room_id {
            let rs = self
                .get_room_state(&src_room_id)
                .ok_or(EngineError::RoomNotFound(src_room_id))?;
            let mut guard = rs.write().await;
            if !self.rooms.contains_key(&src_room_id) {
                return Err(EngineError::RoomNotFound(src_room_id));
            }
            let current = guard
                .find_booking(id)
                .cloned()
                .ok_or(EngineError::BookingNotFound(id))?;

            let span = validate_span(
                patch.start_date.unwrap_or(current.span.start),
                patch.end_date.unwrap_or(current.span.end),
            )?;
            check_no_conflict(&guard, &span, Some(id))?;

            let mut updated = current;
            updated.span = span;
            if patch.changes_placement() {
                updated.total_price = total_price(guard.room.rate, &span);
            }
            guard.remove_booking(id);
            guard.insert_booking(updated.clone());
            return Ok(updated);
        }

        // Cross-room move: lock both rooms, smaller id first.
        let src_rs = self
            .get_room_state(&src_room_id)
            .ok_or(EngineError::RoomNotFound(src_room_id))?;
        let dst_rs = self
            .get_room_state(&dst_room_id)
            .ok_or(EngineError::RoomNotFound(dst_room_id))?;

        let (mut src_guard, mut dst_guard) = if src_room_id < dst_room_id {
            let a = src_rs.write_owned().await;
            let b = dst_rs.write_owned().await;
            (a, b)
        } else {
            let b = dst_rs.write_owned().await;
            let a = src_rs.write_owned().await;
            (a, b)
        };

        if !self.rooms.contains_key(&src_room_id) {
            return Err(EngineError::RoomNotFound(src_room_id));
        }
        if !self.rooms.contains_key(&dst_room_id) {
            return Err(EngineError::RoomNotFound(dst_room_id));
        }
        let current = src_guard
            .find_booking(id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))?;
        if dst_guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        let span = validate_span(
            patch.start_date.unwrap_or(current.span.start),
            patch.end_date.unwrap_or(current.span.end),
        )?;
        check_no_conflict(&dst_guard, &span, Some(id))?;

        let mut updated = current;
        updated.room_id = dst_room_id;
        updated.span = span;
        updated.total_price = total_price(dst_guard.room.rate, &span);

        src_guard.remove_booking(id);
        dst_guard.insert_booking(updated.clone());
        self.booking_to_room.insert(id, dst_room_id);
        Ok(updated)
    }

    /// Soft termination: the record stays, the range it held becomes free.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (_, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard
            .find_booking_mut(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        booking.status = BookingStatus::Cancelled;
        Ok(booking.clone())
    }

    pub async fn delete_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (_, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard
            .remove_booking(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        self.booking_to_room.remove(&id);
        Ok(booking)
    }

    // ── Sweeper support ──────────────────────────────────────

    /// Active bookings whose stay has fully ended. Contended rooms are
    /// skipped and picked up on the next sweep.
    pub fn collect_ended_bookings(&self, today: NaiveDate) -> Vec<Ulid> {
        let mut ended = Vec::new();
        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for booking in &guard.bookings {
                    if booking.is_active() && booking.span.ended_by(today) {
                        ended.push(booking.id);
                    }
                }
            }
        }
        ended
    }

    /// Returns true if the booking transitioned Active → Completed.
    pub async fn complete_booking(&self, id: Ulid) -> Result<bool, EngineError> {
        let (_, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard
            .find_booking_mut(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        if !booking.is_active() {
            return Ok(false);
        }
        booking.status = BookingStatus::Completed;
        Ok(true)
    }
}
