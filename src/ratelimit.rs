use dashmap::DashMap;
use ulid::Ulid;

use crate::error::ApiError;
use crate::model::Ms;

/// Rate classes mirror how the routes group mutations: booking writes are
/// throttled per principal, administrative room writes and profile writes
/// are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    BookingWrite,
    Exempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max: u32,
    pub window_ms: Ms,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Ms,
    count: u32,
}

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Ms
}

/// Fixed-window counter keyed by (principal, rate class). The DashMap entry
/// API holds the shard lock across the read-check-increment, so concurrent
/// requests from one principal never lose an update.
pub struct RateLimiter {
    windows: DashMap<(Ulid, RateClass), Window>,
    booking_writes: RatePolicy,
}

impl RateLimiter {
    pub fn new(booking_writes: RatePolicy) -> Self {
        Self {
            windows: DashMap::new(),
            booking_writes,
        }
    }

    fn policy(&self, class: RateClass) -> Option<RatePolicy> {
        match class {
            RateClass::BookingWrite => Some(self.booking_writes),
            RateClass::Exempt => None,
        }
    }

    /// Consume one unit of quota, or fail `RateLimited` with a retry-after
    /// hint. Quota is consumed at attempt time: the caller's handler may
    /// still fail afterwards, and the unit is not refunded. A rejected
    /// attempt does not advance the counter.
    pub fn check(&self, principal: Ulid, class: RateClass) -> Result<(), ApiError> {
        self.check_at(principal, class, now_ms())
    }

    pub fn check_at(&self, principal: Ulid, class: RateClass, now: Ms) -> Result<(), ApiError> {
        let Some(policy) = self.policy(class) else {
            return Ok(());
        };

        let mut window = self
            .windows
            .entry((principal, class))
            .or_insert(Window {
                started_at: now,
                count: 0,
            });
        if now - window.started_at >= policy.window_ms {
            window.started_at = now;
            window.count = 0;
        }
        if window.count >= policy.max {
            let remaining_ms = (window.started_at + policy.window_ms - now).max(0) as u64;
            return Err(ApiError::rate_limited(remaining_ms.div_ceil(1000)));
        }
        window.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed. Called by the sweeper.
    pub fn prune(&self, now: Ms) {
        self.windows.retain(|(_, class), window| {
            self.policy(*class)
                .is_some_and(|p| now - window.started_at < p.window_ms)
        });
    }

    #[cfg(test)]
    fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const MIN: Ms = 60_000;

    fn limiter() -> RateLimiter {
        // The original deployment policy: 2 booking writes per 30 minutes.
        RateLimiter::new(RatePolicy {
            max: 2,
            window_ms: 30 * MIN,
        })
    }

    #[test]
    fn allows_up_to_ceiling_then_rejects() {
        let l = limiter();
        let p = Ulid::new();
        assert!(l.check_at(p, RateClass::BookingWrite, 0).is_ok());
        assert!(l.check_at(p, RateClass::BookingWrite, MIN).is_ok());
        let err = l.check_at(p, RateClass::BookingWrite, 2 * MIN).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimited);
        // 28 minutes left in the window.
        assert_eq!(err.retry_after_secs, Some(28 * 60));
    }

    #[test]
    fn rejected_attempt_does_not_extend_quota_usage() {
        let l = limiter();
        let p = Ulid::new();
        l.check_at(p, RateClass::BookingWrite, 0).unwrap();
        l.check_at(p, RateClass::BookingWrite, 0).unwrap();
        for _ in 0..5 {
            assert!(l.check_at(p, RateClass::BookingWrite, MIN).is_err());
        }
        // Window elapses — counter resets and the write succeeds again.
        assert!(l.check_at(p, RateClass::BookingWrite, 30 * MIN).is_ok());
    }

    #[test]
    fn retry_hint_rounds_partial_seconds_up() {
        let l = limiter();
        let p = Ulid::new();
        l.check_at(p, RateClass::BookingWrite, 0).unwrap();
        l.check_at(p, RateClass::BookingWrite, 0).unwrap();
        // 1500 ms left in the window → a 2 second hint, never 1.
        let err = l
            .check_at(p, RateClass::BookingWrite, 30 * MIN - 1500)
            .unwrap_err();
        assert_eq!(err.retry_after_secs, Some(2));
    }

    #[test]
    fn principals_have_independent_windows() {
        let l = limiter();
        let a = Ulid::new();
        let b = Ulid::new();
        l.check_at(a, RateClass::BookingWrite, 0).unwrap();
        l.check_at(a, RateClass::BookingWrite, 0).unwrap();
        assert!(l.check_at(a, RateClass::BookingWrite, 0).is_err());
        assert!(l.check_at(b, RateClass::BookingWrite, 0).is_ok());
    }

    #[test]
    fn exempt_class_never_limited() {
        let l = limiter();
        let p = Ulid::new();
        for _ in 0..100 {
            assert!(l.check_at(p, RateClass::Exempt, 0).is_ok());
        }
    }

    #[test]
    fn prune_drops_elapsed_windows() {
        let l = limiter();
        let p = Ulid::new();
        l.check_at(p, RateClass::BookingWrite, 0).unwrap();
        assert_eq!(l.window_count(), 1);
        l.prune(10 * MIN);
        assert_eq!(l.window_count(), 1);
        l.prune(31 * MIN);
        assert_eq!(l.window_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        use std::sync::Arc;
        let l = Arc::new(RateLimiter::new(RatePolicy {
            max: 50,
            window_ms: 30 * MIN,
        }));
        let p = Ulid::new();
        let mut handles = Vec::new();
        for _ in 0..100 {
            let l = l.clone();
            handles.push(tokio::spawn(async move {
                l.check_at(p, RateClass::BookingWrite, 0).is_ok()
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        // Exactly the ceiling passes, no lost updates.
        assert_eq!(ok, 50);
    }
}
