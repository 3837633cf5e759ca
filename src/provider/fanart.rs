//! Fanart-style remote image provider for seasons.
//!
//! The upstream service exposes one XML catalog per series covering every
//! season at once. The document is ensured through the shared [`RemoteCache`]
//! and then walked with a forward-only streaming parse to bound memory on
//! large catalogs: top-level sections are scanned by name (unrecognized ones
//! are skipped), and a candidate is emitted only when an entry's season
//! discriminator matches the requested season and a url is present. A
//! malformed numeric field skips that single entry, never the whole parse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheKey, RemoteCache};
use crate::catalog::{CatalogEntry, EntryKind, ImageKind, KindAttributes};
use crate::config::RefreshConfig;
use crate::error::{ProviderError, Result};
use crate::transport::Transport;

use super::{Contribution, ImageCandidate, Provider, ProviderDescriptor, SourceKind};

pub const PROVIDER_NAME: &str = "fanart";
const BASE_URL: &str = "https://webservice.fanart.tv/series";

/// Catalog section being walked, with the fixed dimensions the service
/// publishes for that category.
#[derive(Debug, Clone, Copy)]
struct Section {
    kind: ImageKind,
    width: u32,
    height: u32,
}

const SEASON_THUMBS: Section = Section {
    kind: ImageKind::Thumb,
    width: 500,
    height: 281,
};
const SHOW_BACKGROUNDS: Section = Section {
    kind: ImageKind::Backdrop,
    width: 1920,
    height: 1080,
};

/// Remote image provider backed by a fanart-style per-series XML catalog.
pub struct FanartProvider {
    descriptor: ProviderDescriptor,
    cache: Arc<RemoteCache>,
    transport: Arc<dyn Transport>,
    config: Arc<RefreshConfig>,
}

impl FanartProvider {
    /// Create a provider sharing the given cache, transport, and config.
    pub fn new(
        cache: Arc<RemoteCache>,
        transport: Arc<dyn Transport>,
        config: Arc<RefreshConfig>,
    ) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name: PROVIDER_NAME,
                order: 1,
                source: SourceKind::RemoteImage,
                kinds: &[EntryKind::Season],
            },
            cache,
            transport,
            config,
        }
    }

    /// The catalog covers all seasons of a series, so the key carries the
    /// series id and no language.
    fn cache_key(&self, series_id: &str) -> CacheKey {
        CacheKey::new(PROVIDER_NAME, series_id, "all")
    }

    fn catalog_url(series_id: &str) -> String {
        format!("{BASE_URL}/{series_id}/xml/all")
    }
}

#[async_trait]
impl Provider for FanartProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn has_changed(&self, entry: &CatalogEntry, since: DateTime<Utc>) -> bool {
        if !self.config.updates_enabled(PROVIDER_NAME) {
            return false;
        }
        let Some(series_id) = entry.provider_id("tvdb") else {
            return false;
        };
        self.cache.has_newer(&self.cache_key(series_id), since)
    }

    async fn fetch(
        &self,
        entry: &CatalogEntry,
        cancel: &CancellationToken,
    ) -> Result<Contribution> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let series_id = entry
            .provider_id("tvdb")
            .ok_or_else(|| ProviderError::not_found("no tvdb id on entry"))?
            .to_string();

        let season_number = match entry.attributes {
            KindAttributes::Season {
                season_number: Some(n),
            } => n,
            _ => return Err(ProviderError::not_found("entry has no season number")),
        };

        let url = Self::catalog_url(&series_id);
        let transport = Arc::clone(&self.transport);
        let payload = self
            .cache
            .get_or_fetch(
                self.cache_key(&series_id),
                self.config.cache_ttl(),
                self.config.updates_enabled(PROVIDER_NAME),
                move || async move { transport.get(&url).await },
            )
            .await?;

        let images = parse_season_images(&payload, season_number, cancel)?;
        debug!(
            entry_id = %entry.id,
            series_id = %series_id,
            season = season_number,
            candidates = images.len(),
            "Walked image catalog"
        );

        Ok(Contribution {
            record: None,
            images,
        })
    }
}

/// Forward-only walk of the series catalog document.
///
/// The cancellation token is polled between element reads so a large catalog
/// stays responsive to cooperative shutdown.
fn parse_season_images(
    xml: &[u8],
    season_number: u32,
    cancel: &CancellationToken,
) -> Result<Vec<ImageCandidate>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut buf = Vec::new();
    let mut in_series = false;
    let mut section: Option<Section> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"series" => in_series = true,
                b"seasonthumbs" if in_series => section = Some(SEASON_THUMBS),
                b"showbackgrounds" if in_series => section = Some(SHOW_BACKGROUNDS),
                b"seasonthumb" | b"showbackground" => {
                    if let Some(section) = section {
                        push_candidate(&mut candidates, &e, section, season_number);
                    }
                }
                // Unrecognized sections are skipped, not an error.
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"seasonthumb" | b"showbackground" => {
                    if let Some(section) = section {
                        push_candidate(&mut candidates, &e, section, season_number);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"series" => in_series = false,
                b"seasonthumbs" | b"showbackgrounds" => section = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ProviderError::malformed(format!("catalog parse: {e}"))),
            Ok(_) => {}
        }

        buf.clear();
    }

    Ok(candidates)
}

/// Emit one candidate from an entry element, or skip it silently when the
/// url is missing, the season discriminator is absent/malformed/mismatched,
/// or the popularity counter is malformed.
fn push_candidate(
    candidates: &mut Vec<ImageCandidate>,
    element: &BytesStart<'_>,
    section: Section,
    season_number: u32,
) {
    let Some(url) = attribute(element, b"url") else {
        return;
    };
    let Some(season) = attribute(element, b"season") else {
        return;
    };
    let Ok(entry_season) = season.parse::<u32>() else {
        return;
    };
    if entry_season != season_number {
        return;
    }

    let community_rating = match attribute(element, b"likes") {
        Some(likes) => match likes.parse::<u32>() {
            Ok(likes) => Some(f64::from(likes)),
            Err(_) => return,
        },
        None => None,
    };

    let language = attribute(element, b"lang").filter(|l| !l.is_empty());

    candidates.push(ImageCandidate {
        url,
        kind: section.kind,
        width: Some(section.width),
        height: Some(section.height),
        language,
        community_rating,
        vote_count: None,
        provider: PROVIDER_NAME.to_string(),
    });
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CATALOG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fanart>
  <series>
    <clearlogos>
      <clearlogo url="http://img.example/logo.png" lang="en" likes="9"/>
    </clearlogos>
    <seasonthumbs>
      <seasonthumb url="http://img.example/s2-thumb-a.jpg" season="2" lang="en" likes="7"/>
      <seasonthumb url="http://img.example/s2-thumb-b.jpg" season="2" lang="fr"/>
      <seasonthumb url="http://img.example/s1-thumb.jpg" season="1" lang="en" likes="3"/>
      <seasonthumb url="http://img.example/bad-season.jpg" season="two" likes="5"/>
      <seasonthumb url="http://img.example/bad-likes.jpg" season="2" likes="many"/>
      <seasonthumb season="2" likes="4"/>
    </seasonthumbs>
    <showbackgrounds>
      <showbackground url="http://img.example/s2-bg.jpg" season="2" lang="" likes="2"/>
    </showbackgrounds>
  </series>
</fanart>"#;

    #[test]
    fn parse_filters_by_season() {
        let cancel = CancellationToken::new();
        let images = parse_season_images(CATALOG_XML.as_bytes(), 2, &cancel).unwrap();

        let urls: Vec<_> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "http://img.example/s2-thumb-a.jpg",
                "http://img.example/s2-thumb-b.jpg",
                "http://img.example/s2-bg.jpg",
            ]
        );
    }

    #[test]
    fn thumbs_and_backdrops_carry_fixed_dimensions() {
        let cancel = CancellationToken::new();
        let images = parse_season_images(CATALOG_XML.as_bytes(), 2, &cancel).unwrap();

        let thumb = &images[0];
        assert_eq!(thumb.kind, ImageKind::Thumb);
        assert_eq!(thumb.width, Some(500));
        assert_eq!(thumb.height, Some(281));
        assert_eq!(thumb.language.as_deref(), Some("en"));
        assert_eq!(thumb.community_rating, Some(7.0));

        let backdrop = images.last().unwrap();
        assert_eq!(backdrop.kind, ImageKind::Backdrop);
        assert_eq!(backdrop.width, Some(1920));
        assert_eq!(backdrop.height, Some(1080));
        // Empty lang attribute counts as untagged.
        assert!(backdrop.language.is_none());
    }

    #[test]
    fn malformed_entries_skipped_individually() {
        let cancel = CancellationToken::new();
        let images = parse_season_images(CATALOG_XML.as_bytes(), 2, &cancel).unwrap();

        // bad-season, bad-likes, and the url-less entry are all absent.
        assert!(images.iter().all(|i| !i.url.contains("bad")));
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn missing_likes_is_fine() {
        let cancel = CancellationToken::new();
        let images = parse_season_images(CATALOG_XML.as_bytes(), 2, &cancel).unwrap();
        assert!(images[1].community_rating.is_none());
    }

    #[test]
    fn cancellation_stops_parse() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = parse_season_images(CATALOG_XML.as_bytes(), 2, &cancel).unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[test]
    fn no_matching_season_yields_empty() {
        let cancel = CancellationToken::new();
        let images = parse_season_images(CATALOG_XML.as_bytes(), 9, &cancel).unwrap();
        assert!(images.is_empty());
    }

    // -----------------------------------------------------------------------
    // Provider-level tests
    // -----------------------------------------------------------------------

    struct CannedTransport {
        body: String,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn get(&self, _url: &str) -> Result<Bytes> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(self.body.clone()))
        }
    }

    struct MissingTransport;

    #[async_trait]
    impl Transport for MissingTransport {
        async fn get(&self, url: &str) -> Result<Bytes> {
            Err(ProviderError::not_found(url.to_string()))
        }
    }

    fn season_entry(season: u32) -> CatalogEntry {
        let mut entry = CatalogEntry::new("season-1", EntryKind::Season);
        entry
            .provider_ids
            .insert("tvdb".to_string(), "81189".to_string());
        entry.attributes = KindAttributes::Season {
            season_number: Some(season),
        };
        entry
    }

    fn make_provider(transport: Arc<dyn Transport>) -> FanartProvider {
        FanartProvider::new(
            Arc::new(RemoteCache::new()),
            transport,
            Arc::new(RefreshConfig::default()),
        )
    }

    #[tokio::test]
    async fn fetch_returns_season_candidates() {
        let transport = Arc::new(CannedTransport {
            body: CATALOG_XML.to_string(),
            requests: AtomicUsize::new(0),
        });
        let provider = make_provider(Arc::clone(&transport) as Arc<dyn Transport>);

        let contribution = provider
            .fetch(&season_entry(2), &CancellationToken::new())
            .await
            .unwrap();

        assert!(contribution.record.is_none());
        assert_eq!(contribution.images.len(), 3);
    }

    #[tokio::test]
    async fn catalog_cached_across_seasons() {
        let transport = Arc::new(CannedTransport {
            body: CATALOG_XML.to_string(),
            requests: AtomicUsize::new(0),
        });
        let provider = make_provider(Arc::clone(&transport) as Arc<dyn Transport>);
        let cancel = CancellationToken::new();

        // Two seasons of the same series share one catalog document.
        provider.fetch(&season_entry(1), &cancel).await.unwrap();
        provider.fetch(&season_entry(2), &cancel).await.unwrap();

        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_catalog_is_not_found() {
        let provider = make_provider(Arc::new(MissingTransport));
        let err = provider
            .fetch(&season_entry(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_season_number_is_not_found() {
        let transport = Arc::new(CannedTransport {
            body: CATALOG_XML.to_string(),
            requests: AtomicUsize::new(0),
        });
        let provider = make_provider(transport as Arc<dyn Transport>);

        let mut entry = season_entry(2);
        entry.attributes = KindAttributes::Season {
            season_number: None,
        };
        let err = provider
            .fetch(&entry, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn change_monitor_gated_by_toggle() {
        let transport = Arc::new(CannedTransport {
            body: CATALOG_XML.to_string(),
            requests: AtomicUsize::new(0),
        });
        let mut config = RefreshConfig::default();
        config
            .source_updates
            .insert(PROVIDER_NAME.to_string(), false);
        let provider = FanartProvider::new(
            Arc::new(RemoteCache::new()),
            transport as Arc<dyn Transport>,
            Arc::new(config),
        );

        assert!(!provider.has_changed(&season_entry(2), Utc::now()).await);
    }
}
