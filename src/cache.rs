use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use ulid::Ulid;

use crate::model::Ms;
use crate::ratelimit::now_ms;

/// Resource classes for coarse invalidation: any successful write to a
/// class discards every cached read of that class. Per-key invalidation
/// would have to track derived keys (paginated lists and the like) and is
/// deliberately not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Rooms,
    Bookings,
    Accounts,
}

impl Scope {
    fn index(self) -> usize {
        match self {
            Scope::Rooms => 0,
            Scope::Bookings => 1,
            Scope::Accounts => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Rooms => "rooms",
            Scope::Bookings => "bookings",
            Scope::Accounts => "accounts",
        }
    }
}

/// Cache keys carry the principal id, so one principal's result can never
/// be served to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: Scope,
    pub principal: Ulid,
    pub route: &'static str,
    pub params: String,
}

struct Entry {
    value: Value,
    expires_at: Ms,
    generation: u64,
}

/// Principal-scoped response cache with generation-based scope flushes.
///
/// `invalidate` bumps a single per-scope atomic; every entry born under an
/// older generation is dead the instant the bump lands. A reader can never
/// observe a half-applied invalidation.
pub struct ResponseCache {
    entries: DashMap<CacheKey, Entry>,
    generations: [AtomicU64; 3],
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generations: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    /// The scope's live generation. Callers that read data and store the
    /// result later must capture this *before* the read, so an invalidation
    /// landing in between kills the entry they are about to store.
    pub fn current_generation(&self, scope: Scope) -> u64 {
        self.generations[scope.index()].load(Ordering::Acquire)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.get_at(key, now_ms())
    }

    pub fn get_at(&self, key: &CacheKey, now: Ms) -> Option<Value> {
        let generation = self.current_generation(key.scope);
        {
            let entry = self.entries.get(key)?;
            if entry.generation == generation && entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Dead entry — evict lazily so repeated misses don't pile up.
        self.entries
            .remove_if(key, |_, e| e.generation != generation || e.expires_at <= now);
        None
    }

    pub fn put_at(&self, key: CacheKey, value: Value, ttl_ms: Ms, now: Ms) {
        let generation = self.current_generation(key.scope);
        self.put_at_generation(key, value, ttl_ms, now, generation);
    }

    /// Store an entry under a generation captured before the value was
    /// computed. If the scope was invalidated in the meantime the entry is
    /// born dead — it can never resurrect pre-write data.
    pub fn put_at_generation(
        &self,
        key: CacheKey,
        value: Value,
        ttl_ms: Ms,
        now: Ms,
        generation: u64,
    ) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl_ms,
                generation,
            },
        );
    }

    /// Discard every entry in the scope, atomically.
    pub fn invalidate(&self, scope: Scope) {
        self.generations[scope.index()].fetch_add(1, Ordering::Release);
    }

    /// Physically remove expired and superseded entries. Correctness does
    /// not depend on this; it only bounds memory. Called by the sweeper.
    pub fn prune(&self, now: Ms) {
        self.entries.retain(|key, entry| {
            entry.expires_at > now && entry.generation == self.current_generation(key.scope)
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(scope: Scope, principal: Ulid, route: &'static str, params: &str) -> CacheKey {
        CacheKey {
            scope,
            principal,
            route,
            params: params.into(),
        }
    }

    #[test]
    fn hit_within_ttl_miss_after() {
        let c = ResponseCache::new();
        let k = key(Scope::Rooms, Ulid::new(), "rooms.list", "");
        c.put_at(k.clone(), json!(["r1"]), 15_000, 0);
        assert_eq!(c.get_at(&k, 14_999), Some(json!(["r1"])));
        assert_eq!(c.get_at(&k, 15_000), None);
    }

    #[test]
    fn keys_are_principal_scoped() {
        let c = ResponseCache::new();
        let a = Ulid::new();
        let b = Ulid::new();
        c.put_at(key(Scope::Bookings, a, "bookings.get", "id=1"), json!("a"), 20_000, 0);
        assert_eq!(
            c.get_at(&key(Scope::Bookings, a, "bookings.get", "id=1"), 0),
            Some(json!("a"))
        );
        assert_eq!(c.get_at(&key(Scope::Bookings, b, "bookings.get", "id=1"), 0), None);
    }

    #[test]
    fn keys_include_params() {
        let c = ResponseCache::new();
        let p = Ulid::new();
        c.put_at(key(Scope::Bookings, p, "bookings.list", "page=1"), json!(1), 20_000, 0);
        assert_eq!(c.get_at(&key(Scope::Bookings, p, "bookings.list", "page=2"), 0), None);
    }

    #[test]
    fn invalidate_kills_whole_scope_only() {
        let c = ResponseCache::new();
        let p = Ulid::new();
        let rooms = key(Scope::Rooms, p, "rooms.list", "");
        let bookings = key(Scope::Bookings, p, "bookings.list", "");
        c.put_at(rooms.clone(), json!("rooms"), 20_000, 0);
        c.put_at(bookings.clone(), json!("bookings"), 20_000, 0);

        c.invalidate(Scope::Bookings);
        assert_eq!(c.get_at(&bookings, 1), None);
        assert_eq!(c.get_at(&rooms, 1), Some(json!("rooms")));
    }

    #[test]
    fn put_after_invalidate_is_fresh() {
        let c = ResponseCache::new();
        let p = Ulid::new();
        let k = key(Scope::Rooms, p, "rooms.list", "");
        c.put_at(k.clone(), json!("stale"), 20_000, 0);
        c.invalidate(Scope::Rooms);
        c.put_at(k.clone(), json!("fresh"), 20_000, 5);
        assert_eq!(c.get_at(&k, 6), Some(json!("fresh")));
    }

    #[test]
    fn entry_stored_under_superseded_generation_is_born_dead() {
        let c = ResponseCache::new();
        let p = Ulid::new();
        let k = key(Scope::Rooms, p, "rooms.list", "");
        // A reader captures the generation, then a write invalidates the
        // scope before the reader gets to store its (now stale) result.
        let generation = c.current_generation(Scope::Rooms);
        c.invalidate(Scope::Rooms);
        c.put_at_generation(k.clone(), json!("stale"), 20_000, 0, generation);
        assert_eq!(c.get_at(&k, 1), None);
    }

    #[test]
    fn prune_removes_dead_entries() {
        let c = ResponseCache::new();
        let p = Ulid::new();
        c.put_at(key(Scope::Rooms, p, "rooms.list", ""), json!(1), 10_000, 0);
        c.put_at(key(Scope::Bookings, p, "bookings.list", ""), json!(2), 10_000, 0);
        c.invalidate(Scope::Rooms);
        c.prune(5_000);
        assert_eq!(c.len(), 1); // rooms entry superseded, bookings kept
        c.prune(10_000);
        assert!(c.is_empty()); // bookings entry expired
    }
}
