//! Refresh configuration surface.
//!
//! Exposes the per-source "updates enabled" toggles, the preferred metadata
//! language, and the remote cache TTL consumed by the cache and the image
//! ranker. The host application deserializes this from its own config file;
//! all fields have sensible defaults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Preferred ISO-639-1 metadata language (e.g. "en", "fr").
    #[serde(default = "default_language")]
    pub preferred_language: String,

    /// Maximum age in days at which a cached remote payload is still fresh.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: i64,

    /// Per-source automatic update toggles, keyed by provider name.
    ///
    /// A source that is absent from the map is treated as enabled. While a
    /// source is disabled its stale cache entries are served as if fresh and
    /// its change monitor always reports "unchanged".
    #[serde(default)]
    pub source_updates: HashMap<String, bool>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_cache_ttl_days() -> i64 {
    7
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            preferred_language: default_language(),
            cache_ttl_days: default_cache_ttl_days(),
            source_updates: HashMap::new(),
        }
    }
}

impl RefreshConfig {
    /// Whether automatic updates are enabled for the named source.
    pub fn updates_enabled(&self, source: &str) -> bool {
        self.source_updates.get(source).copied().unwrap_or(true)
    }

    /// Remote cache TTL as a chrono duration.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_ttl_days)
    }
}
