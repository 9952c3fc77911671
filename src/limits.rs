//! Hard ceilings on record sizes and query shapes. Everything here maps to
//! an `InvalidInput`-class rejection, never a panic.

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 100;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_ROOM_NUMBER_LEN: usize = 10;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Bookings held on a single room (active + historical).
pub const MAX_BOOKINGS_PER_ROOM: usize = 10_000;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;
