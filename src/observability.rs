use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: pipeline operations handled. Labels: route, status.
pub const REQUESTS_TOTAL: &str = "stayd_requests_total";

/// Histogram: handler latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "stayd_request_duration_seconds";

/// Counter: identity resolution failures.
pub const AUTH_FAILURES_TOTAL: &str = "stayd_auth_failures_total";

/// Counter: authorization denials.
pub const ACCESS_DENIED_TOTAL: &str = "stayd_access_denied_total";

/// Counter: writes rejected by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "stayd_rate_limited_total";

/// Counter: booking attempts rejected for an overlapping reservation.
pub const BOOKING_CONFLICTS_TOTAL: &str = "stayd_booking_conflicts_total";

// ── Cache metrics ───────────────────────────────────────────────

/// Counter: reads served from the response cache. Labels: scope.
pub const CACHE_HITS_TOTAL: &str = "stayd_cache_hits_total";

/// Counter: reads that fell through to the handler. Labels: scope.
pub const CACHE_MISSES_TOTAL: &str = "stayd_cache_misses_total";

// ── Sweeper metrics ─────────────────────────────────────────────

/// Counter: bookings moved Active → Completed by the sweeper.
pub const BOOKINGS_COMPLETED_TOTAL: &str = "stayd_bookings_completed_total";

/// Install the fmt tracing subscriber. Call once from the embedding
/// process before serving.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
