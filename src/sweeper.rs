use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{ResponseCache, Scope};
use crate::engine::Engine;
use crate::observability::BOOKINGS_COMPLETED_TOTAL;
use crate::ratelimit::{now_ms, RateLimiter};

/// Background task: moves finished stays from `Active` to `Completed` and
/// trims expired cache entries and elapsed rate windows.
pub async fn run_sweeper(
    engine: Arc<Engine>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        sweep_once(&engine, &cache, &limiter, chrono::Utc::now().date_naive()).await;
    }
}

/// One sweep pass. Split out so tests can drive it with a fixed date.
pub async fn sweep_once(
    engine: &Engine,
    cache: &ResponseCache,
    limiter: &RateLimiter,
    today: chrono::NaiveDate,
) -> usize {
    let mut completed = 0usize;
    for id in engine.collect_ended_bookings(today) {
        match engine.complete_booking(id).await {
            Ok(true) => {
                info!("completed ended booking {id}");
                completed += 1;
            }
            // Already completed/cancelled by someone else — fine.
            Ok(false) => {}
            Err(e) => tracing::debug!("sweeper skip {id}: {e}"),
        }
    }
    if completed > 0 {
        metrics::counter!(BOOKINGS_COMPLETED_TOTAL).increment(completed as u64);
        // Listings that still show the stays as active are stale now.
        cache.invalidate(Scope::Bookings);
    }

    let now = now_ms();
    cache.prune(now);
    limiter.prune(now);
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingStatus, RoomCategory, RoomStatus, Role};
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn sweep_completes_ended_bookings_only() {
        let engine = Engine::new();
        let cache = ResponseCache::new();
        let limiter = RateLimiter::new(crate::ratelimit::RatePolicy {
            max: 2,
            window_ms: 1000,
        });

        let pid = Ulid::new();
        engine
            .register_principal(pid, "G".into(), "g@x.com".into(), None, Role::Customer)
            .unwrap();
        let room = Ulid::new();
        engine
            .create_room(room, "101".into(), RoomCategory::Single, 100, RoomStatus::Available)
            .unwrap();

        let past = Ulid::new();
        engine
            .create_booking(past, pid, room, d(2025, 1, 1), d(2025, 1, 3))
            .await
            .unwrap();
        let future = Ulid::new();
        engine
            .create_booking(future, pid, room, d(2025, 6, 1), d(2025, 6, 3))
            .await
            .unwrap();

        let swept = sweep_once(&engine, &cache, &limiter, d(2025, 2, 1)).await;
        assert_eq!(swept, 1);
        assert_eq!(
            engine.get_booking(past).await.unwrap().status,
            BookingStatus::Completed
        );
        assert_eq!(
            engine.get_booking(future).await.unwrap().status,
            BookingStatus::Active
        );

        // Second pass is a no-op.
        let swept = sweep_once(&engine, &cache, &limiter, d(2025, 2, 1)).await;
        assert_eq!(swept, 0);
    }
}
