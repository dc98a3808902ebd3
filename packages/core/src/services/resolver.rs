//! Reference Resolver & Cache
//!
//! Document content embeds assets indirectly through reference tokens of
//! the form `![alt-text](asset://<asset-id>)`. Before rendering or export,
//! those tokens must be rewritten to the asset's inline payload. This
//! module does that rewrite backed by a bounded cache so repeated
//! resolution of the same document does not repeatedly hit the store.
//!
//! # Algorithm
//!
//! 1. Scan content for reference tokens; collapse duplicate asset ids.
//! 2. Partition ids into cached / uncached.
//! 3. Fetch uncached ids from the store concurrently, one `get_asset` per
//!    id. Concurrent `resolve` calls never issue duplicate reads for the
//!    same id (per-id single-flight locks). Absent assets are cached as an
//!    explicit miss marker so they are not refetched either.
//! 4. Rewrite: replace each token with `![alt](<payload>)`; tokens whose
//!    id has a miss marker are left unchanged and a diagnostic is logged.
//!    Resolution never fails because an asset is missing.
//!
//! # Cache discipline
//!
//! Fixed capacity (default 100), insertion-order eviction: when a new key
//! would exceed capacity, the oldest inserted key is evicted. Entries are
//! invalidated only by explicit [`ReferenceResolver::update`] /
//! [`ReferenceResolver::invalidate`] calls; the cache never checks
//! staleness against the store.

use crate::db::DocumentStore;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

/// Matches `![alt](asset://id)`; group 1 = alt text, group 2 = asset id
const REFERENCE_PATTERN: &str = r"!\[([^\]]*)\]\(asset://([^)\s]+)\)";

fn reference_regex() -> &'static Regex {
    static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    REFERENCE_REGEX.get_or_init(|| Regex::new(REFERENCE_PATTERN).unwrap())
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of cached assets
    pub cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
        }
    }
}

/// A cached resolution result for one asset id
#[derive(Debug, Clone, PartialEq)]
enum CacheEntry {
    /// Inline payload ready for substitution
    Inline(String),
    /// The store has no such asset; do not refetch
    Missing,
}

/// Bounded insertion-order cache.
///
/// `order` tracks insertion order for eviction; re-inserting an existing
/// key updates the value without changing its position.
struct BoundedCache {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    capacity: usize,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    fn insert(&mut self, id: String, entry: CacheEntry) {
        if self.entries.insert(id.clone(), entry).is_none() {
            self.order.push_back(id);
            if self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    tracing::debug!("Asset cache evicting {}", evicted);
                    self.entries.remove(&evicted);
                }
            }
        }
    }

    fn remove(&mut self, id: &str) {
        if self.entries.remove(id).is_some() {
            self.order.retain(|k| k != id);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Rewrites asset reference tokens to inline payloads, with a bounded
/// cache and in-flight de-duplication.
///
/// # Examples
///
/// ```no_run
/// # use inkdeck_core::db::{DatabaseService, DocumentStore, SqliteStore};
/// # use inkdeck_core::services::{ReferenceResolver, ResolverConfig};
/// # use std::path::PathBuf;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = Arc::new(DatabaseService::open(PathBuf::from("./inkdeck.db")).await?);
/// # let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(db));
/// let resolver = ReferenceResolver::new(store, ResolverConfig::default());
/// let rendered = resolver.resolve("![logo](asset://abc-123)").await;
/// # Ok(())
/// # }
/// ```
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
    cache: Arc<RwLock<BoundedCache>>,

    /// Per-asset-id fetch locks; concurrent fills for one id serialize
    /// here and re-check the cache instead of refetching
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ReferenceResolver {
    /// Create a resolver over the given store
    pub fn new(store: Arc<dyn DocumentStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(BoundedCache::new(config.cache_capacity))),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve every reference token in `content`.
    ///
    /// Tokens whose asset exists (in cache or store) are replaced by
    /// `![alt](<payload>)`; tokens for absent assets are left unchanged
    /// with a logged diagnostic. Store failures for individual assets
    /// degrade the same way - resolution itself never errors.
    pub async fn resolve(&self, content: &str) -> String {
        let ids = self.referenced_ids(content);

        if ids.is_empty() {
            return content.to_string();
        }

        // Partition into cached / uncached under a read lock
        let uncached: Vec<String> = {
            let cache = self.cache.read().await;
            ids.iter()
                .filter(|id| cache.get(id).is_none())
                .cloned()
                .collect()
        };

        // Fetch uncached ids concurrently; single-flight per id
        if !uncached.is_empty() {
            let mut fetches = JoinSet::new();
            for id in uncached {
                let store = Arc::clone(&self.store);
                let cache = Arc::clone(&self.cache);
                let inflight = Arc::clone(&self.inflight);
                fetches.spawn(Self::fetch_and_cache(store, cache, inflight, id));
            }
            while let Some(joined) = fetches.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Asset fetch task panicked: {}", e);
                }
            }
        }

        // Rewrite pass
        let cache = self.cache.read().await;
        reference_regex()
            .replace_all(content, |caps: &regex::Captures<'_>| {
                let alt = &caps[1];
                let id = &caps[2];
                match cache.get(id) {
                    Some(CacheEntry::Inline(payload)) => format!("![{}]({})", alt, payload),
                    Some(CacheEntry::Missing) | None => {
                        tracing::warn!("Unresolvable asset reference: {}", id);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Fetch one asset and record the result (payload or miss marker).
    ///
    /// The per-id lock plus the cache re-check under it guarantees exactly
    /// one store read per id across concurrent resolve calls.
    async fn fetch_and_cache(
        store: Arc<dyn DocumentStore>,
        cache: Arc<RwLock<BoundedCache>>,
        inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
        id: String,
    ) {
        let id_lock = {
            let mut map = inflight.lock().await;
            Arc::clone(map.entry(id.clone()).or_default())
        };
        let _guard = id_lock.lock().await;

        // Another fill may have completed while we waited
        if cache.read().await.get(&id).is_some() {
            return;
        }

        let entry = match store.get_asset(&id).await {
            Ok(Some(asset)) => CacheEntry::Inline(asset.binary_content),
            Ok(None) => {
                tracing::debug!("Asset {} not found, caching miss marker", id);
                CacheEntry::Missing
            }
            Err(e) => {
                tracing::warn!("Asset {} fetch failed, caching miss marker: {}", id, e);
                CacheEntry::Missing
            }
        };

        cache.write().await.insert(id.clone(), entry);
        inflight.lock().await.remove(&id);
    }

    /// Record (or replace) the cached payload for an asset.
    ///
    /// Call after `put_asset` so newly uploaded assets resolve without a
    /// store round trip.
    pub async fn update(&self, id: impl Into<String>, payload: impl Into<String>) {
        self.cache
            .write()
            .await
            .insert(id.into(), CacheEntry::Inline(payload.into()));
    }

    /// Drop the cache entry for an asset.
    ///
    /// Call after `delete_asset`. The next resolve touching the id will
    /// consult the store again.
    pub async fn invalidate(&self, id: &str) {
        self.cache.write().await.remove(id);
    }

    /// Number of cached entries (diagnostics)
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Asset ids referenced by `content`, duplicates collapsed
    pub fn referenced_ids(&self, content: &str) -> HashSet<String> {
        reference_regex()
            .captures_iter(content)
            .map(|caps| caps[2].to_string())
            .collect()
    }
}
