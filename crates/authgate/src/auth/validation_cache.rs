//! Memoization of successful validations.
//!
//! Keyed by credential fingerprint, bounded by capacity (LRU eviction) and by
//! a fixed TTL. Failures are never stored: a rejection cached across a key
//! rotation or an authority outage would outlive its cause.
//!
//! An entry for a credential that carries `exp` also expires no later than
//! that `exp`, so a cached success can never outlive the token.

use crate::auth::claims::Claims;
use crate::auth::credential::Fingerprint;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    claims: Claims,
    expires_at: Instant,
}

/// Bounded TTL cache of validated claims.
pub struct ValidationCache {
    entries: Mutex<LruCache<Fingerprint, Entry>>,
    ttl: Duration,
}

impl ValidationCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Claims> {
        self.get_at(fingerprint, Instant::now())
    }

    /// Lookup against an explicit `now`. Expired entries are removed.
    pub fn get_at(&self, fingerprint: &Fingerprint, now: Instant) -> Option<Claims> {
        let mut entries = self.lock();
        let entry = entries.get(fingerprint)?;
        if entry.expires_at > now {
            return Some(entry.claims.clone());
        }

        entries.pop(fingerprint);
        tracing::debug!(target: "authgate.auth.cache", "Validation cache entry expired");
        None
    }

    pub fn insert(&self, fingerprint: Fingerprint, claims: Claims) {
        self.insert_at(
            fingerprint,
            claims,
            Instant::now(),
            chrono::Utc::now().timestamp(),
        );
    }

    /// Insert against an explicit `now` (monotonic) and `unix_now` (seconds,
    /// compared with the claims' `exp`).
    pub fn insert_at(&self, fingerprint: Fingerprint, claims: Claims, now: Instant, unix_now: i64) {
        let mut lifetime = self.ttl;
        if let Some(exp) = claims.exp {
            let remaining = u64::try_from(exp.saturating_sub(unix_now)).unwrap_or(0);
            lifetime = lifetime.min(Duration::from_secs(remaining));
        }

        if lifetime.is_zero() {
            return;
        }

        let Some(expires_at) = now.checked_add(lifetime) else {
            tracing::warn!(target: "authgate.auth.cache", ttl_secs = lifetime.as_secs(), "Validation cache lifetime out of range, not caching");
            return;
        };

        let entry = Entry { claims, expires_at };
        // `push` also hands back the old value when replacing the same key
        if let Some((evicted, _)) = self.lock().push(fingerprint, entry) {
            if evicted != fingerprint {
                tracing::debug!(target: "authgate.auth.cache", "Validation cache full, evicted least recently used entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Fingerprint, Entry>> {
        // Entries are replaced whole; a poisoned lock holds no partial entry.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
