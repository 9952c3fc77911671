use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::{Price, RoomState, StaySpan};

use super::EngineError;

/// Build and validate a stay span. A non-positive night count is
/// `InvalidRange` and must be rejected before any conflict check runs.
pub(crate) fn validate_span(start: NaiveDate, end: NaiveDate) -> Result<StaySpan, EngineError> {
    if end <= start {
        return Err(EngineError::InvalidRange { start, end });
    }
    let span = StaySpan::new(start, end);
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(span)
}

/// Reject the span if any *active* booking on the room intersects it.
/// Half-open intersection: `[s1,e1)` and `[s2,e2)` collide iff
/// `s1 < e2 && s2 < e1`. When updating, the booking being moved is
/// excluded from its own check via `exclude`.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    span: &StaySpan,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    for booking in rs.overlapping_active(span) {
        if exclude == Some(booking.id) {
            continue;
        }
        return Err(EngineError::Conflict(booking.id));
    }
    Ok(())
}

/// `nights * rate`, for an already validated span. Deterministic: the same
/// (rate, span) always yields the same price.
pub(crate) fn total_price(rate: Price, span: &StaySpan) -> Price {
    span.nights() * rate
}
