//! Memoized search responses with per-key request coalescing.
//!
//! The first caller for a key starts the computation on its own task; later
//! callers for the same key await that task instead of starting another.
//! The task runs to completion even when every caller has gone away, so an
//! abandoned request still warms the cache.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, warn};

use kbsearch_core::config::CacheSettings;
use kbsearch_core::normalize::normalize_query;
use kbsearch_core::types::{LabelFilterSpec, SearchResponse};
use kbsearch_core::{Result, SearchError};

/// Values the cache can hold. A value that reports itself as not cacheable is
/// still handed to every waiter but never stored.
pub trait Cacheable: Clone + Send + Sync + 'static {
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl Cacheable for SearchResponse {
    fn is_cacheable(&self) -> bool {
        !self.is_degraded()
    }
}

/// Derive the cache key from the normalized query, the filter spec, topK and
/// the corpus. A pass-through spec keys the same as no spec.
///
/// The query is keyed in the exact form the pipeline computes on, case
/// included: a cased embedder maps `SSO` and `sso` to different vectors.
pub fn cache_key(query: &str, filters: Option<&LabelFilterSpec>, top_k: usize, table: &str) -> String {
    let filters = filters.filter(|f| !f.is_pass_through());
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update(&[0x1f]);
    hasher.update(serde_json::to_string(&filters).unwrap_or_default().as_bytes());
    hasher.update(&[0x1f]);
    hasher.update(&(top_k as u64).to_le_bytes());
    hasher.update(&[0x1f]);
    hasher.update(table.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from a stored entry.
    Hit,
    /// Attached to a computation another caller started.
    Joined,
    /// Started the computation.
    Miss,
}

impl CacheOutcome {
    pub fn is_hit(self) -> bool {
        !matches!(self, CacheOutcome::Miss)
    }
}

/// Coalesced joiners count as hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub inflight: usize,
    pub evictions: u64,
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    seq: u64,
    hit_count: u64,
}

type Flight<V> = Shared<BoxFuture<'static, Result<V>>>;

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    inflight: HashMap<String, Flight<V>>,
    generation: u64,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            inflight: HashMap::new(),
            generation: 0,
            next_seq: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }
}

impl<V> CacheState<V> {
    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        self.entries.retain(|_, e| now.duration_since(e.created_at) < ttl);
    }

    fn insert(&mut self, key: String, value: V, max_entries: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, CacheEntry { value, created_at: Instant::now(), seq, hit_count: 0 });
        while self.entries.len() > max_entries {
            let Some(oldest) = self.entries.iter().min_by_key(|(_, e)| e.seq).map(|(k, _)| k.clone()) else { break };
            self.entries.remove(&oldest);
            self.evictions += 1;
        }
    }
}

pub struct ResultCache<V = SearchResponse> {
    state: Arc<Mutex<CacheState<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V> Clone for ResultCache<V> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone(), ttl: self.ttl, max_entries: self.max_entries }
    }
}

impl<V: Cacheable> ResultCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { state: Arc::new(Mutex::new(CacheState::default())), ttl, max_entries }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState<V>>> {
        self.state.lock().map_err(|_| SearchError::Cache("cache lock poisoned".to_string()))
    }

    /// Return the stored value for `key`, join the in-flight computation for
    /// it, or start `compute`. `compute` is only called on a miss.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<(V, CacheOutcome)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (flight, outcome) = {
            let mut state = self.lock()?;
            state.purge_expired(Instant::now(), self.ttl);
            if let Some(entry) = state.entries.get_mut(key) {
                entry.hit_count += 1;
                let (value, entry_hits) = (entry.value.clone(), entry.hit_count);
                state.hits += 1;
                debug!(outcome = ?CacheOutcome::Hit, entry_hits, "result cache lookup");
                return Ok((value, CacheOutcome::Hit));
            }
            if let Some(flight) = state.inflight.get(key).cloned() {
                state.hits += 1;
                (flight, CacheOutcome::Joined)
            } else {
                state.misses += 1;
                let flight = self.launch(key.to_string(), state.generation, compute());
                state.inflight.insert(key.to_string(), flight.clone());
                (flight, CacheOutcome::Miss)
            }
        };
        debug!(?outcome, "result cache lookup");
        flight.await.map(|value| (value, outcome))
    }

    fn launch<Fut>(&self, key: String, generation: u64, fut: Fut) -> Flight<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(SearchError::Internal("search computation panicked".to_string())),
            };
            cache.settle(&key, generation, &result);
            result
        });
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(SearchError::Internal(format!("search computation did not complete: {e}"))),
            }
        }
        .boxed()
        .shared()
    }

    fn settle(&self, key: &str, generation: u64, result: &Result<V>) {
        let Ok(mut state) = self.state.lock() else {
            warn!("result cache lock poisoned; computed value not stored");
            return;
        };
        if state.generation != generation {
            debug!("cache cleared while computing; result not stored");
            return;
        }
        state.inflight.remove(key);
        match result {
            Ok(value) if value.is_cacheable() => {
                let max_entries = self.max_entries;
                state.insert(key.to_string(), value.clone(), max_entries);
            }
            Ok(_) => debug!("response not cacheable; returned without storing"),
            Err(e) => debug!(error = %e, "computation failed; nothing stored"),
        }
    }

    /// Drop every entry. Computations already running finish for their
    /// waiters but do not repopulate the cache.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.entries.clear();
        state.inflight.clear();
        state.generation += 1;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut state = self.lock()?;
        state.purge_expired(Instant::now(), self.ttl);
        Ok(CacheStats {
            size: state.entries.len(),
            hit_count: state.hits,
            miss_count: state.misses,
            inflight: state.inflight.len(),
            evictions: state.evictions,
        })
    }
}
