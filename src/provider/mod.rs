//! Trait definition and types for metadata and image providers.
//!
//! This module defines the [`Provider`] trait that all sources (remote
//! metadata catalogs, remote image catalogs, local sidecar descriptors) must
//! implement, along with the shared types returned by provider queries.
//!
//! Providers receive their shared handles (remote cache, transport, config)
//! at construction; there is no ambient global state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogEntry, EntryKind, ImageKind, PartialRecord};
use crate::error::Result;

pub mod fanart;
pub mod moviedb;
pub mod registry;
pub mod sidecar;

pub use registry::ProviderRegistry;

/// Where a provider's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Sidecar descriptor file next to the entry's storage location.
    LocalFile,
    /// Remote metadata catalog queried over HTTP.
    RemoteMetadata,
    /// Remote image catalog queried over HTTP.
    RemoteImage,
    /// Custom pre-refresh hook.
    Custom,
}

/// Immutable description of a provider: identity, ordering, and the entry
/// kinds it can serve. Registered once at startup and consumed read-only.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Short lowercase identifier (e.g. "moviedb").
    pub name: &'static str,
    /// Ascending priority order; lower merges earlier.
    pub order: u32,
    pub source: SourceKind,
    /// Entry kinds this provider supports.
    pub kinds: &'static [EntryKind],
}

impl ProviderDescriptor {
    /// Whether this provider serves entries of the given kind.
    pub fn supports(&self, kind: EntryKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Per-provider verdict for one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Query the source this cycle.
    Fetch,
    /// Skip the source; it contributes nothing new this cycle.
    Reuse,
}

/// A candidate image offered by a provider during one refresh. Ephemeral;
/// only the winning candidate per slot survives as an image tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Fully-qualified url to the image.
    pub url: String,
    /// Which artwork slot the image is for.
    pub kind: ImageKind,
    /// Image width in pixels, if known.
    pub width: Option<u32>,
    /// Image height in pixels, if known.
    pub height: Option<u32>,
    /// ISO-639-1 language of any text in the image, if applicable.
    pub language: Option<String>,
    /// Community rating / like count, if known.
    pub community_rating: Option<f64>,
    /// Number of votes behind the rating, if known.
    pub vote_count: Option<u32>,
    /// Name of the provider offering the candidate.
    pub provider: String,
}

/// Everything a single provider contributed during one refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct Contribution {
    /// Partial metadata record, if the source carries metadata.
    pub record: Option<PartialRecord>,
    /// Candidate artwork, if the source carries images.
    pub images: Vec<ImageCandidate>,
}

impl Contribution {
    /// A contribution carrying nothing (the NotFound outcome).
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Async trait implemented by every metadata/image source.
///
/// Providers are expected to be wrapped in an `Arc` and shared across
/// concurrent refresh tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's immutable descriptor.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Change monitor: has the backing source changed since `since`?
    ///
    /// Remote sources answer from cache-entry timestamps; local sources
    /// compare file modification times. A source whose automatic updates are
    /// administratively disabled always answers `false`.
    async fn has_changed(&self, entry: &CatalogEntry, since: DateTime<Utc>) -> bool;

    /// Query the source for its contribution to `entry`.
    ///
    /// Remote sources route payload acquisition through the shared
    /// [`RemoteCache`](crate::cache::RemoteCache). `NotFound` is the benign
    /// absent-resource outcome and is mapped to an empty contribution by the
    /// orchestrator.
    async fn fetch(&self, entry: &CatalogEntry, cancel: &CancellationToken)
        -> Result<Contribution>;
}
