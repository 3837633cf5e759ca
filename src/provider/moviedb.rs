//! MovieDb-style remote metadata provider for series.
//!
//! Fetches the per-series JSON document keyed by external id and preferred
//! language, through the shared [`RemoteCache`] (7-day TTL by default), and
//! maps it into a [`PartialRecord`]. The change monitor answers from cache
//! timestamps and respects the per-source updates toggle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheKey, RemoteCache};
use crate::catalog::{CatalogEntry, EntryKind, KindAttributes, PartialRecord, SeriesStatus};
use crate::config::RefreshConfig;
use crate::error::{ProviderError, Result};
use crate::transport::Transport;

use super::{Contribution, Provider, ProviderDescriptor, SourceKind};

pub const PROVIDER_NAME: &str = "moviedb";
const BASE_URL: &str = "https://api.themoviedb.org/3";

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    last_air_date: Option<String>,
    status: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u32>,
    episode_run_time: Option<Vec<u32>>,
    genres: Option<Vec<Named>>,
    networks: Option<Vec<Named>>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Remote metadata provider backed by a MovieDb-style REST API.
pub struct MovieDbProvider {
    descriptor: ProviderDescriptor,
    cache: Arc<RemoteCache>,
    transport: Arc<dyn Transport>,
    config: Arc<RefreshConfig>,
}

impl MovieDbProvider {
    /// Create a provider sharing the given cache, transport, and config.
    pub fn new(
        cache: Arc<RemoteCache>,
        transport: Arc<dyn Transport>,
        config: Arc<RefreshConfig>,
    ) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name: PROVIDER_NAME,
                order: 2,
                source: SourceKind::RemoteMetadata,
                kinds: &[EntryKind::Series],
            },
            cache,
            transport,
            config,
        }
    }

    fn cache_key(&self, external_id: &str) -> CacheKey {
        CacheKey::new(
            PROVIDER_NAME,
            external_id,
            self.config.preferred_language.clone(),
        )
    }

    fn series_url(&self, external_id: &str) -> String {
        format!(
            "{BASE_URL}/tv/{external_id}?language={}&append_to_response=external_ids",
            self.config.preferred_language
        )
    }
}

/// Map the raw series document into a partial record.
fn to_partial_record(series: SeriesResponse) -> PartialRecord {
    let mut provider_ids = HashMap::new();
    provider_ids.insert(PROVIDER_NAME.to_string(), series.id.to_string());
    if let Some(ids) = &series.external_ids {
        if let Some(imdb) = &ids.imdb_id {
            if !imdb.is_empty() {
                provider_ids.insert("imdb".to_string(), imdb.clone());
            }
        }
        if let Some(tvdb) = ids.tvdb_id {
            if tvdb > 0 {
                provider_ids.insert("tvdb".to_string(), tvdb.to_string());
            }
        }
    }

    let ended = series
        .status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("Ended"))
        .unwrap_or(false);
    let attributes = KindAttributes::Series {
        status: Some(if ended {
            SeriesStatus::Ended
        } else {
            SeriesStatus::Continuing
        }),
        // End date is only meaningful for an ended series.
        end_date: if ended { series.last_air_date } else { None },
    };

    PartialRecord {
        name: series.name,
        overview: series.overview,
        genres: series
            .genres
            .unwrap_or_default()
            .into_iter()
            .map(|g| g.name)
            .collect(),
        studios: series
            .networks
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.name)
            .collect(),
        community_rating: series.vote_average,
        vote_count: series.vote_count,
        runtime_minutes: series
            .episode_run_time
            .as_ref()
            .and_then(|v| v.first().copied()),
        premiere_date: series.first_air_date,
        provider_ids,
        attributes: Some(attributes),
        ..Default::default()
    }
}

#[async_trait]
impl Provider for MovieDbProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn has_changed(&self, entry: &CatalogEntry, since: DateTime<Utc>) -> bool {
        if !self.config.updates_enabled(PROVIDER_NAME) {
            return false;
        }
        let Some(external_id) = entry.provider_id(PROVIDER_NAME) else {
            return false;
        };
        self.cache.has_newer(&self.cache_key(external_id), since)
    }

    async fn fetch(
        &self,
        entry: &CatalogEntry,
        cancel: &CancellationToken,
    ) -> Result<Contribution> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let external_id = entry
            .provider_id(PROVIDER_NAME)
            .ok_or_else(|| ProviderError::not_found(format!("no {PROVIDER_NAME} id on entry")))?
            .to_string();

        let url = self.series_url(&external_id);
        let transport = Arc::clone(&self.transport);
        let payload = self
            .cache
            .get_or_fetch(
                self.cache_key(&external_id),
                self.config.cache_ttl(),
                self.config.updates_enabled(PROVIDER_NAME),
                move || async move { transport.get(&url).await },
            )
            .await?;

        let series: SeriesResponse = serde_json::from_slice(&payload)?;
        debug!(entry_id = %entry.id, external_id = %external_id, "Parsed series document");

        Ok(Contribution {
            record: Some(to_partial_record(series)),
            images: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport returning a canned body and counting requests.
    struct CannedTransport {
        body: String,
        requests: AtomicUsize,
    }

    impl CannedTransport {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                requests: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn get(&self, _url: &str) -> Result<Bytes> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(self.body.clone()))
        }
    }

    const SERIES_JSON: &str = r#"{
        "id": 1399,
        "name": "Game of Thrones",
        "overview": "Seven noble families fight for control.",
        "first_air_date": "2011-04-17",
        "last_air_date": "2019-05-19",
        "status": "Ended",
        "vote_average": 8.4,
        "vote_count": 21000,
        "episode_run_time": [60, 55],
        "genres": [{"id": 1, "name": "Drama"}, {"id": 2, "name": "Fantasy"}],
        "networks": [{"id": 49, "name": "HBO"}],
        "external_ids": {"imdb_id": "tt0944947", "tvdb_id": 121361}
    }"#;

    fn make_provider(transport: Arc<CannedTransport>) -> MovieDbProvider {
        MovieDbProvider::new(
            Arc::new(RemoteCache::new()),
            transport,
            Arc::new(RefreshConfig::default()),
        )
    }

    fn series_entry() -> CatalogEntry {
        let mut entry = CatalogEntry::new("entry-1", EntryKind::Series);
        entry
            .provider_ids
            .insert(PROVIDER_NAME.to_string(), "1399".to_string());
        entry
    }

    #[tokio::test]
    async fn fetch_maps_series_document() {
        let transport = CannedTransport::new(SERIES_JSON);
        let provider = make_provider(Arc::clone(&transport));

        let contribution = provider
            .fetch(&series_entry(), &CancellationToken::new())
            .await
            .unwrap();

        let record = contribution.record.unwrap();
        assert_eq!(record.name.as_deref(), Some("Game of Thrones"));
        assert_eq!(record.genres, vec!["Drama", "Fantasy"]);
        assert_eq!(record.studios, vec!["HBO"]);
        assert_eq!(record.community_rating, Some(8.4));
        assert_eq!(record.vote_count, Some(21000));
        assert_eq!(record.runtime_minutes, Some(60));
        assert_eq!(record.premiere_date.as_deref(), Some("2011-04-17"));
        assert_eq!(record.provider_ids.get("imdb").unwrap(), "tt0944947");
        assert_eq!(record.provider_ids.get("tvdb").unwrap(), "121361");

        match record.attributes.unwrap() {
            KindAttributes::Series { status, end_date } => {
                assert_eq!(status, Some(SeriesStatus::Ended));
                assert_eq!(end_date.as_deref(), Some("2019-05-19"));
            }
            other => panic!("unexpected attributes: {other:?}"),
        }
    }

    #[tokio::test]
    async fn continuing_series_has_no_end_date() {
        let json = SERIES_JSON.replace("\"Ended\"", "\"Returning Series\"");
        let transport = CannedTransport::new(&json);
        let provider = make_provider(transport);

        let contribution = provider
            .fetch(&series_entry(), &CancellationToken::new())
            .await
            .unwrap();

        match contribution.record.unwrap().attributes.unwrap() {
            KindAttributes::Series { status, end_date } => {
                assert_eq!(status, Some(SeriesStatus::Continuing));
                assert!(end_date.is_none());
            }
            other => panic!("unexpected attributes: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_fetch_served_from_cache() {
        let transport = CannedTransport::new(SERIES_JSON);
        let provider = make_provider(Arc::clone(&transport));
        let entry = series_entry();
        let cancel = CancellationToken::new();

        provider.fetch(&entry, &cancel).await.unwrap();
        provider.fetch(&entry, &cancel).await.unwrap();

        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_external_id_is_not_found() {
        let transport = CannedTransport::new(SERIES_JSON);
        let provider = make_provider(transport);
        let entry = CatalogEntry::new("entry-1", EntryKind::Series);

        let err = provider
            .fetch(&entry, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn malformed_payload_is_malformed() {
        let transport = CannedTransport::new("not json");
        let provider = make_provider(transport);

        let err = provider
            .fetch(&series_entry(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn cancelled_before_fetch() {
        let transport = CannedTransport::new(SERIES_JSON);
        let provider = make_provider(Arc::clone(&transport));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = provider.fetch(&series_entry(), &cancel).await.unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert_eq!(transport.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn change_monitor_respects_updates_toggle() {
        let transport = CannedTransport::new(SERIES_JSON);
        let mut config = RefreshConfig::default();
        config
            .source_updates
            .insert(PROVIDER_NAME.to_string(), false);
        let provider = MovieDbProvider::new(
            Arc::new(RemoteCache::new()),
            transport,
            Arc::new(config),
        );

        // Nothing cached, which would normally report changed -- but the
        // toggle wins.
        assert!(
            !provider
                .has_changed(&series_entry(), Utc::now())
                .await
        );
    }

    #[tokio::test]
    async fn change_monitor_reports_uncached_as_changed() {
        let transport = CannedTransport::new(SERIES_JSON);
        let provider = make_provider(transport);
        assert!(provider.has_changed(&series_entry(), Utc::now()).await);
    }
}
