//! Per-user memoization of resolved permission sets with a fixed TTL.
//!
//! Expiry is checked lazily on read; there is no background eviction inside
//! the cache itself. Grant mutations do not invalidate entries, so staleness is
//! bounded by the TTL alone. Concurrent misses for the same user may both run
//! the resolver; the last insert wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};

use staybook_core::UserId;

use crate::resolver::{PermissionSource, ResolvedPermissionSet};
use crate::{AuthzError, Principal};

/// Default entry lifetime.
pub const DEFAULT_TTL_SECS: i64 = 120;

/// Time source, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    set: Arc<ResolvedPermissionSet>,
    inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.inserted_at < ttl
    }
}

/// Authorization cache in front of a [`PermissionSource`].
pub struct AuthorizationCache<P> {
    source: P,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<UserId, CacheEntry>>,
}

impl<P> AuthorizationCache<P>
where
    P: PermissionSource,
{
    pub fn new(source: P, ttl: Duration) -> Self {
        Self::with_clock(source, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(source: P, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    /// Return the principal's effective permissions, resolving on miss.
    ///
    /// SuperUser principals bypass the cache entirely: an `All` entry keyed by
    /// user id must never outlive a token that carried the sentinel role.
    pub async fn resolve(
        &self,
        principal: &Principal,
    ) -> Result<Arc<ResolvedPermissionSet>, AuthzError> {
        if principal.is_super_user() {
            return Ok(Arc::new(ResolvedPermissionSet::All));
        }

        let user_id = principal.user_id;
        if let Some(set) = self.lookup(user_id) {
            tracing::trace!(%user_id, "authorization cache hit");
            return Ok(set);
        }

        tracing::trace!(%user_id, "authorization cache miss");
        let set = Arc::new(self.source.resolve(principal).await?);

        let entry = CacheEntry {
            set: Arc::clone(&set),
            inserted_at: self.clock.now(),
        };
        if let Ok(mut map) = self.entries.write() {
            map.insert(user_id, entry);
        }

        Ok(set)
    }

    fn lookup(&self, user_id: UserId) -> Option<Arc<ResolvedPermissionSet>> {
        let map = self.entries.read().ok()?;
        let entry = map.get(&user_id)?;
        entry
            .is_fresh(self.clock.now(), self.ttl)
            .then(|| Arc::clone(&entry.set))
    }

    /// Drop expired entries. Optional housekeeping; `resolve` never depends
    /// on it having run.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut map) = self.entries.write() else {
            return 0;
        };
        let before = map.len();
        map.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before - map.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
