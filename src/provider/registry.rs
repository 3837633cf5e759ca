//! Ordered catalog of metadata/image sources per entry kind.
//!
//! Providers are registered once at startup. [`ProviderRegistry::providers_for`]
//! returns the providers supporting a kind, stable-sorted by ascending
//! priority order with ties broken by registration order. No side effects,
//! no failure modes; an unknown kind yields an empty sequence.

use std::sync::Arc;

use crate::catalog::EntryKind;

use super::Provider;

/// A registry of [`Provider`] implementations in registration order.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider. Registration order is the tiebreaker between
    /// providers with equal priority order.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Ordered providers for the given entry kind.
    pub fn providers_for(&self, kind: EntryKind) -> Vec<Arc<dyn Provider>> {
        let mut matching: Vec<Arc<dyn Provider>> = self
            .providers
            .iter()
            .filter(|p| p.descriptor().supports(kind))
            .cloned()
            .collect();

        // Stable sort keeps registration order between equal priorities.
        matching.sort_by_key(|p| p.descriptor().order);
        matching
    }

    /// Look up a provider by its descriptor name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|p| p.descriptor().name == name)
            .cloned()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::error::Result;
    use crate::provider::{Contribution, ProviderDescriptor, SourceKind};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tokio_util::sync::CancellationToken;

    /// Minimal stub provider used for registry ordering tests.
    struct StubProvider {
        descriptor: ProviderDescriptor,
    }

    impl StubProvider {
        fn new(name: &'static str, order: u32, kinds: &'static [EntryKind]) -> Arc<Self> {
            Arc::new(Self {
                descriptor: ProviderDescriptor {
                    name,
                    order,
                    source: SourceKind::RemoteMetadata,
                    kinds,
                },
            })
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        async fn has_changed(&self, _entry: &CatalogEntry, _since: DateTime<Utc>) -> bool {
            false
        }

        async fn fetch(
            &self,
            _entry: &CatalogEntry,
            _cancel: &CancellationToken,
        ) -> Result<Contribution> {
            Ok(Contribution::empty())
        }
    }

    const SERIES: &[EntryKind] = &[EntryKind::Series];
    const GAMES: &[EntryKind] = &[EntryKind::Game];

    #[test]
    fn empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.providers_for(EntryKind::Series).is_empty());
        assert!(registry.get("moviedb").is_none());
    }

    #[test]
    fn sorts_by_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(StubProvider::new("second", 2, SERIES));
        registry.register(StubProvider::new("first", 1, SERIES));

        let ordered = registry.providers_for(EntryKind::Series);
        let names: Vec<_> = ordered.iter().map(|p| p.descriptor().name).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn ties_broken_by_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(StubProvider::new("a", 1, SERIES));
        registry.register(StubProvider::new("b", 1, SERIES));
        registry.register(StubProvider::new("c", 0, SERIES));

        let ordered = registry.providers_for(EntryKind::Series);
        let names: Vec<_> = ordered.iter().map(|p| p.descriptor().name).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn filters_by_kind() {
        let mut registry = ProviderRegistry::new();
        registry.register(StubProvider::new("series-only", 0, SERIES));
        registry.register(StubProvider::new("games-only", 0, GAMES));

        let series = registry.providers_for(EntryKind::Series);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].descriptor().name, "series-only");

        // Unknown-to-everyone kind yields an empty sequence.
        assert!(registry.providers_for(EntryKind::Album).is_empty());
    }

    #[test]
    fn lookup_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(StubProvider::new("moviedb", 0, SERIES));
        assert!(registry.get("moviedb").is_some());
        assert!(registry.get("fanart").is_none());
    }
}
