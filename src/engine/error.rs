use ulid::Ulid;

use crate::error::ErrorKind;

#[derive(Debug)]
pub enum EngineError {
    PrincipalNotFound(Ulid),
    RoomNotFound(Ulid),
    BookingNotFound(Ulid),
    DuplicateRoomNumber(String),
    DuplicateEmail(String),
    /// The id of the active booking that blocks the requested span.
    Conflict(Ulid),
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    RoomHasBookings(Ulid),
    Validation(&'static str),
    LimitExceeded(&'static str),
}

impl EngineError {
    /// Collapse into the pipeline-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::PrincipalNotFound(_)
            | EngineError::RoomNotFound(_)
            | EngineError::BookingNotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) | EngineError::RoomHasBookings(_) => ErrorKind::Conflict,
            EngineError::InvalidRange { .. } => ErrorKind::InvalidRange,
            EngineError::DuplicateRoomNumber(_)
            | EngineError::DuplicateEmail(_)
            | EngineError::Validation(_)
            | EngineError::LimitExceeded(_) => ErrorKind::InvalidInput,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::PrincipalNotFound(id) => write!(f, "principal not found: {id}"),
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::DuplicateRoomNumber(n) => {
                write!(f, "room number already exists: {n}")
            }
            EngineError::DuplicateEmail(e) => write!(f, "email already registered: {e}"),
            EngineError::Conflict(id) => {
                write!(f, "room is already booked for this date range (booking {id})")
            }
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid date range: [{start}, {end}) has no nights")
            }
            EngineError::RoomHasBookings(id) => {
                write!(f, "cannot delete room {id}: active bookings exist")
            }
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
