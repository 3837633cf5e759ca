//! Key/TTL-addressed store for raw provider payloads.
//!
//! One payload blob per (provider, external id, language) key with the fetch
//! timestamp recorded at write time. Staleness is always measured from that
//! timestamp, never approximated.
//!
//! Concurrent `get_or_fetch` calls for the same key are collapsed into a
//! single in-flight fetch: the flight runs in a spawned task joined through a
//! [`Shared`] handle, so every concurrent caller observes the same outcome
//! and a cancelling caller never aborts a flight other callers are waiting
//! on. Reads of different keys are fully independent.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

/// Cache address: one payload per provider/id/language triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub external_id: String,
    pub language: String,
}

impl CacheKey {
    pub fn new<P, I, L>(provider: P, external_id: I, language: L) -> Self
    where
        P: Into<String>,
        I: Into<String>,
        L: Into<String>,
    {
        Self {
            provider: provider.into(),
            external_id: external_id.into(),
            language: language.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.external_id, self.language)
    }
}

/// A cached raw payload. Overwritten atomically on re-fetch, never partially
/// updated.
struct CacheEntry {
    payload: Bytes,
    fetched_at: DateTime<Utc>,
}

type FlightResult = std::result::Result<Bytes, ProviderError>;
type SharedFlight = Shared<BoxFuture<'static, FlightResult>>;

/// Thread-safe store for raw provider payloads with single-flight fetch
/// de-duplication.
pub struct RemoteCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    inflight: Arc<Mutex<HashMap<CacheKey, SharedFlight>>>,
}

impl RemoteCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the payload for `key`, fetching it when needed.
    ///
    /// - No entry: invoke `fetch`; on success write a new entry stamped now
    ///   and return the payload, on failure surface the error and write
    ///   nothing.
    /// - Fresh entry (`now - fetched_at < ttl`): return it, zero fetches.
    /// - Stale entry with `updates_enabled == false`: return it as if fresh.
    ///   Sources whose auto-update is administratively disabled serve
    ///   known-stale data indefinitely; this mirrors the upstream policy.
    /// - Stale entry with updates enabled: invoke `fetch`; on success
    ///   overwrite and return the new payload, on failure fall back to the
    ///   stale payload instead of failing the refresh.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        updates_enabled: bool,
        fetch: F,
    ) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        let mut stale: Option<Bytes> = None;

        if let Some(entry) = self.entries.get(&key) {
            let age = Utc::now() - entry.fetched_at;
            if age < ttl {
                debug!(key = %key, "Cache hit (fresh)");
                return Ok(entry.payload.clone());
            }
            if !updates_enabled {
                debug!(key = %key, "Cache hit (stale, updates disabled)");
                return Ok(entry.payload.clone());
            }
            stale = Some(entry.payload.clone());
        }

        let flight = self.join_flight(&key, fetch);

        match flight.await {
            Ok(payload) => Ok(payload),
            Err(err) => match stale {
                Some(payload) => {
                    warn!(key = %key, error = %err, "Re-fetch failed; serving stale payload");
                    Ok(payload)
                }
                None => Err(err),
            },
        }
    }

    /// Join the in-flight fetch for `key`, starting one if none exists.
    fn join_flight<F, Fut>(&self, key: &CacheKey, fetch: F) -> SharedFlight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        let mut inflight = self.inflight.lock();

        if let Some(existing) = inflight.get(key) {
            debug!(key = %key, "Joining in-flight fetch");
            return existing.clone();
        }

        let entries = Arc::clone(&self.entries);
        let inflight_map = Arc::clone(&self.inflight);
        let flight_key = key.clone();
        let fut = fetch();

        // Spawned so the flight runs to completion (and the entry is
        // written) even if every waiter stops polling.
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if let Ok(payload) = &result {
                entries.insert(
                    flight_key.clone(),
                    CacheEntry {
                        payload: payload.clone(),
                        fetched_at: Utc::now(),
                    },
                );
            }
            inflight_map.lock().remove(&flight_key);
            result
        });

        let flight: SharedFlight = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(ProviderError::transient(format!(
                    "fetch task aborted: {join_err}"
                ))),
            }
        }
        .boxed()
        .shared();

        inflight.insert(key.clone(), flight.clone());
        flight
    }

    /// Change monitor for remote sources: `true` when no payload has been
    /// cached for `key`, or when the cached payload was fetched after
    /// `since`.
    pub fn has_newer(&self, key: &CacheKey, since: DateTime<Utc>) -> bool {
        match self.entries.get(key) {
            Some(entry) => entry.fetched_at > since,
            None => true,
        }
    }

    /// Restore a persisted entry with its original fetch timestamp.
    ///
    /// Used by hosts that persist the cache across restarts; age continues to
    /// be measured from `fetched_at`.
    pub fn seed(&self, key: CacheKey, payload: Bytes, fetched_at: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                fetched_at,
            },
        );
    }

    /// Number of cached payloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RemoteCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Change monitor for local-file-backed sources: `true` when the file exists
/// and was modified after `since`.
///
/// A missing file reports unchanged; the provider's fetch surfaces the absent
/// sidecar as `NotFound` on its own.
pub fn file_changed(path: &Path, since: DateTime<Utc>) -> bool {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified) > since,
        Err(_) => false,
    }
}
