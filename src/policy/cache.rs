use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::store_location;
use crate::errors::PolicyError;
use crate::policy::{PolicyResolver, Scope};
use crate::schema::ShareableEntity;

/// Cache key for a resolved scope. Includes the branch configuration
/// version so an administrator's change to `isolation_mode` or a share
/// flag is observed immediately, not after the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeCacheKey {
    pub branch_id: Uuid,
    pub entity: ShareableEntity,
    pub config_version: i64,
}

impl ScopeCacheKey {
    pub fn for_branch(branch: &store_location::Model, entity: ShareableEntity) -> Self {
        Self {
            branch_id: branch.id,
            entity,
            config_version: branch.config_version(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    scope: Scope,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(scope: Scope, ttl: Duration) -> Self {
        Self {
            scope,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Counters exposed through the diagnostics endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

/// Bounded-TTL in-memory cache of resolved scopes.
///
/// Entries expire on read; stale versions of a branch's configuration also
/// age out through the TTL even if nothing reads them again. Resolution
/// errors are never cached, so a misconfigured branch keeps failing closed
/// on every call until fixed.
#[derive(Debug)]
pub struct ScopeCache {
    entries: RwLock<HashMap<ScopeCacheKey, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScopeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &ScopeCacheKey) -> Option<Scope> {
        let expired = {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.scope.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.write().unwrap().remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: ScopeCacheKey, scope: Scope) {
        self.entries
            .write()
            .unwrap()
            .insert(key, CacheEntry::new(scope, self.ttl));
    }

    /// Get-or-resolve for the enforcer's hot path.
    pub fn resolve(
        &self,
        resolver: &PolicyResolver,
        branch: &store_location::Model,
        entity: ShareableEntity,
    ) -> Result<Scope, PolicyError> {
        let key = ScopeCacheKey::for_branch(branch, entity);
        if let Some(scope) = self.get(&key) {
            return Ok(scope);
        }
        let scope = resolver.resolve(branch, entity)?;
        self.insert(key, scope.clone());
        Ok(scope)
    }

    /// Drops expired entries; run opportunistically by the background
    /// health loop so abandoned keys do not accumulate.
    pub fn purge_expired(&self) {
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| !entry.is_expired());
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
