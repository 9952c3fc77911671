use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::access::{self, OpClass, Ownership};
use crate::auth::{IdentityResolver, TokenVerifier};
use crate::cache::{CacheKey, ResponseCache, Scope};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{ApiError, ErrorKind};
use crate::model::Principal;
use crate::observability::*;
use crate::ratelimit::{now_ms, RateClass, RateLimiter};

/// Static description of one operation: where it sits in the authorization
/// matrix, which cache scope it reads or dirties, and how its writes are
/// throttled.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub route: &'static str,
    pub class: OpClass,
    pub scope: Scope,
    pub rate: RateClass,
}

impl Operation {
    pub const fn read(route: &'static str, class: OpClass, scope: Scope) -> Self {
        Self {
            route,
            class,
            scope,
            rate: RateClass::Exempt,
        }
    }

    pub const fn write(
        route: &'static str,
        class: OpClass,
        scope: Scope,
        rate: RateClass,
    ) -> Self {
        Self {
            route,
            class,
            scope,
            rate,
        }
    }
}

/// Composes identity resolution, the access guard, the response cache, and
/// the rate limiter around a domain handler, in that fixed order for every
/// operation. Routes differ only in their [`Operation`] descriptor — the
/// stage sequence itself cannot drift between them.
pub struct Pipeline {
    engine: Arc<Engine>,
    identity: IdentityResolver,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    config: Config,
}

impl Pipeline {
    pub fn new(engine: Arc<Engine>, verifier: Arc<dyn TokenVerifier>, config: Config) -> Self {
        Self {
            identity: IdentityResolver::new(verifier, engine.clone()),
            engine,
            cache: Arc::new(ResponseCache::new()),
            limiter: Arc::new(RateLimiter::new(config.booking_writes)),
            config,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        self.cache.clone()
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Entry point for every operation.
    ///
    /// 1. resolve identity, 2. resolve the target's owner and run the
    /// access guard, 3. reads: consult the cache and short-circuit on a
    /// hit, 4. writes: consume rate-limit quota, 5. run the handler,
    /// 6. on success populate the cache (reads) or invalidate the
    /// operation's scope (writes). Failures at 1–4 return before the
    /// handler runs; the only state an attempt may leave behind is its own
    /// rate-counter increment.
    pub async fn handle<O, OFut, H, HFut, T>(
        &self,
        op: Operation,
        credential: Option<&str>,
        params: &str,
        resolve_owner: O,
        handler: H,
    ) -> Result<Value, ApiError>
    where
        O: FnOnce(Arc<Principal>) -> OFut,
        OFut: Future<Output = Result<Ownership, ApiError>>,
        H: FnOnce(Arc<Principal>) -> HFut,
        HFut: Future<Output = Result<T, ApiError>>,
        T: Serialize,
    {
        let started = Instant::now();
        let result = self
            .run(op, credential, params, resolve_owner, handler)
            .await;
        metrics::histogram!(REQUEST_DURATION_SECONDS, "route" => op.route)
            .record(started.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind.as_str(),
        };
        metrics::counter!(REQUESTS_TOTAL, "route" => op.route, "status" => status).increment(1);
        result
    }

    async fn run<O, OFut, H, HFut, T>(
        &self,
        op: Operation,
        credential: Option<&str>,
        params: &str,
        resolve_owner: O,
        handler: H,
    ) -> Result<Value, ApiError>
    where
        O: FnOnce(Arc<Principal>) -> OFut,
        OFut: Future<Output = Result<Ownership, ApiError>>,
        H: FnOnce(Arc<Principal>) -> HFut,
        HFut: Future<Output = Result<T, ApiError>>,
        T: Serialize,
    {
        let principal = match self.identity.resolve(credential).await {
            Ok(p) => Arc::new(p),
            Err(e) => {
                metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
                debug!(route = op.route, "identity resolution failed: {e}");
                return Err(e);
            }
        };

        // Owner resolution and the guard run before any cache lookup, so a
        // cached result can never leak across principals.
        let ownership = resolve_owner(principal.clone()).await?;
        if let Err(e) = access::authorize(&principal, op.class, ownership) {
            metrics::counter!(ACCESS_DENIED_TOTAL).increment(1);
            debug!(route = op.route, principal = %principal.id, "access denied");
            return Err(e);
        }

        let cache_key = (!op.class.is_write()).then(|| CacheKey {
            scope: op.scope,
            principal: principal.id,
            route: op.route,
            params: params.to_string(),
        });
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache.get(key) {
                metrics::counter!(CACHE_HITS_TOTAL, "scope" => op.scope.as_str()).increment(1);
                return Ok(hit);
            }
            metrics::counter!(CACHE_MISSES_TOTAL, "scope" => op.scope.as_str()).increment(1);
        }

        // Captured before the handler reads anything: if a concurrent write
        // invalidates the scope while the handler runs, the entry stored
        // below lands under this stale generation and is born dead.
        let read_generation = self.cache.current_generation(op.scope);

        // Quota is consumed at attempt time and not refunded if the
        // handler fails later.
        if op.class.is_write()
            && let Err(e) = self.limiter.check(principal.id, op.rate) {
                metrics::counter!(RATE_LIMITED_TOTAL).increment(1);
                warn!(route = op.route, principal = %principal.id, "rate limit exceeded");
                return Err(e);
            }

        let output = match handler(principal.clone()).await {
            Ok(v) => v,
            Err(e) => {
                if e.kind == ErrorKind::Conflict {
                    metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
                }
                if e.kind.is_expected() {
                    debug!(route = op.route, principal = %principal.id, "rejected: {e}");
                } else {
                    error!(route = op.route, principal = %principal.id, "handler failed: {e}");
                }
                return Err(e);
            }
        };
        // Raw serialization errors stay in the log; the caller only ever
        // sees the generic kind.
        let value = serde_json::to_value(output).map_err(|e| {
            error!(route = op.route, "response serialization failed: {e}");
            ApiError::unavailable("internal error")
        })?;

        if op.class.is_write() {
            self.cache.invalidate(op.scope);
        } else if let Some(key) = cache_key {
            self.cache.put_at_generation(
                key,
                value.clone(),
                self.config.ttl_for(op.scope),
                now_ms(),
                read_generation,
            );
        }
        debug!(route = op.route, principal = %principal.id, "ok");
        Ok(value)
    }
}
