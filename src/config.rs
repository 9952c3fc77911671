use crate::cache::Scope;
use crate::model::Ms;
use crate::ratelimit::RatePolicy;

const MINUTE_MS: Ms = 60_000;

/// Tunable policy values: rate ceilings, cache TTLs, sweep cadence.
/// Defaults mirror the original deployment (2 booking writes per 30
/// minutes; 15 s room cache, 20 s booking/account cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub booking_writes: RatePolicy,
    pub rooms_ttl_ms: Ms,
    pub bookings_ttl_ms: Ms,
    pub accounts_ttl_ms: Ms,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            booking_writes: RatePolicy {
                max: 2,
                window_ms: 30 * MINUTE_MS,
            },
            rooms_ttl_ms: 15_000,
            bookings_ttl_ms: 20_000,
            accounts_ttl_ms: 20_000,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Read overrides from `STAYD_*` environment variables; anything unset
    /// or unparseable keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max) = env_parse::<u32>("STAYD_BOOKING_WRITES_MAX") {
            config.booking_writes.max = max;
        }
        if let Some(mins) = env_parse::<Ms>("STAYD_BOOKING_WRITES_WINDOW_MINUTES") {
            config.booking_writes.window_ms = mins * MINUTE_MS;
        }
        if let Some(secs) = env_parse::<Ms>("STAYD_ROOMS_TTL_SECONDS") {
            config.rooms_ttl_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<Ms>("STAYD_BOOKINGS_TTL_SECONDS") {
            config.bookings_ttl_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<Ms>("STAYD_ACCOUNTS_TTL_SECONDS") {
            config.accounts_ttl_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<u64>("STAYD_SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval_secs = secs;
        }
        config
    }

    pub fn ttl_for(&self, scope: Scope) -> Ms {
        match scope {
            Scope::Rooms => self.rooms_ttl_ms,
            Scope::Bookings => self.bookings_ttl_ms,
            Scope::Accounts => self.accounts_ttl_ms,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_policy() {
        let c = Config::default();
        assert_eq!(c.booking_writes.max, 2);
        assert_eq!(c.booking_writes.window_ms, 30 * MINUTE_MS);
        assert_eq!(c.ttl_for(Scope::Rooms), 15_000);
        assert_eq!(c.ttl_for(Scope::Bookings), 20_000);
        assert_eq!(c.ttl_for(Scope::Accounts), 20_000);
    }
}
