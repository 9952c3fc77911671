use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — clock type for cache expiry and rate windows.
pub type Ms = i64;

/// Smallest currency unit (e.g. cents).
pub type Price = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCategory {
    Single,
    Double,
    Suite,
}

/// Informational only — availability is always derived from active bookings,
/// never from this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
}

/// Half-open stay range `[start, end)` — the night of `end` is not included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StaySpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "StaySpan start must be before end");
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &StaySpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True once the whole stay lies in the past relative to `today`.
    pub fn ended_by(&self, today: NaiveDate) -> bool {
        self.end <= today
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: Ulid,
    pub number: String,
    pub category: RoomCategory,
    pub rate: Price,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: Ulid,
    pub principal_id: Ulid,
    pub room_id: Ulid,
    #[serde(flatten)]
    pub span: StaySpan,
    pub status: BookingStatus,
    pub total_price: Price,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }
}

// ── Partial updates ──────────────────────────────────────────────
//
// Explicit field lists instead of a generic attribute merge: only the
// fields named here can change, so role/owner/id can never be smuggled
// through an update payload.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomPatch {
    pub number: Option<String>,
    pub category: Option<RoomCategory>,
    pub rate: Option<Price>,
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingPatch {
    pub room_id: Option<Ulid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BookingPatch {
    /// True when the patch touches anything that re-triggers the conflict
    /// check and price computation.
    pub fn changes_placement(&self) -> bool {
        self.room_id.is_some() || self.start_date.is_some() || self.end_date.is_some()
    }
}

// ── Per-room state ───────────────────────────────────────────────

/// A room record plus every booking that references it, sorted by
/// `span.start`. The whole struct sits behind one `RwLock`: the per-room
/// critical section that makes check-then-write atomic.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        if let Some(pos) = self.bookings.iter().position(|b| b.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    pub fn find_booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn find_booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Active bookings whose span overlaps the query window. Binary search
    /// skips everything starting at or after `query.end`.
    pub fn overlapping_active(&self, query: &StaySpan) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.is_active() && b.span.end > query.start)
    }

    pub fn has_active_bookings(&self) -> bool {
        self.bookings.iter().any(|b| b.is_active())
    }
}

// ── Query result types ───────────────────────────────────────────

/// One page of a listing, with enough shape for the boundary layer to
/// render pagination links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, per_page: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            per_page,
            total: 0,
            pages: 0,
        }
    }
}
