//! Per-item refresh orchestration.
//!
//! Drives the full pipeline for one catalog entry: ask the registry for the
//! ordered providers of the entry's kind, decide fetch-vs-reuse per provider,
//! collect partial records and image candidates, fold the records into the
//! entry under its locks, and rank the candidates into image tags.
//!
//! Provider failures are isolated -- a failing source contributes nothing and
//! the refresh proceeds. Cancellation is cooperative: it is checked between
//! providers, and a cancelled refresh returns the entry with whatever merges
//! were already applied, with no rollback.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, ImageKind, ImageTag};
use crate::config::RefreshConfig;
use crate::merge::{merge, MergePolicy};
use crate::provider::{ImageCandidate, Provider, ProviderRegistry, RefreshDecision};
use crate::rank::rank;

/// Per-refresh options supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOptions {
    /// Query every provider regardless of staleness checks.
    pub force_full_refresh: bool,
}

/// Orchestrates metadata and artwork refreshes for catalog entries.
///
/// Refreshes for distinct entries are independent; the orchestrator holds no
/// mutable state of its own and can be shared across concurrent tasks.
pub struct RefreshOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: Arc<RefreshConfig>,
}

impl RefreshOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: Arc<RefreshConfig>) -> Self {
        Self { registry, config }
    }

    /// Refresh one entry and return the rewritten copy.
    ///
    /// Freshly fetched records merge with the replace policy, so a later
    /// (higher-order) provider overwrites an earlier one for unlocked scalar
    /// fields. Locked fields are never altered.
    pub async fn refresh(
        &self,
        mut entry: CatalogEntry,
        options: RefreshOptions,
        cancel: CancellationToken,
    ) -> CatalogEntry {
        let providers = self.registry.providers_for(entry.kind);
        info!(
            entry_id = %entry.id,
            kind = %entry.kind,
            providers = providers.len(),
            force = options.force_full_refresh,
            "Starting refresh"
        );

        let mut candidates: Vec<ImageCandidate> = Vec::new();
        let mut cancelled = false;

        for provider in &providers {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let name = provider.descriptor().name;
            let decision = self.decide(provider.as_ref(), &entry, options).await;
            if decision == RefreshDecision::Reuse {
                debug!(entry_id = %entry.id, provider = name, "Source unchanged; reusing");
                continue;
            }

            let contribution = tokio::select! {
                result = provider.fetch(&entry, &cancel) => result,
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            };

            match contribution {
                Ok(contribution) => {
                    if let Some(record) = &contribution.record {
                        debug!(entry_id = %entry.id, provider = name, "Merging partial record");
                        entry = merge(entry, record, MergePolicy::replace());
                    }
                    if !contribution.images.is_empty() {
                        debug!(
                            entry_id = %entry.id,
                            provider = name,
                            count = contribution.images.len(),
                            "Collected image candidates"
                        );
                        candidates.extend(contribution.images);
                    }
                }
                Err(err) if err.is_not_found() => {
                    debug!(entry_id = %entry.id, provider = name, "Nothing to contribute");
                }
                Err(crate::error::ProviderError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!(
                        entry_id = %entry.id,
                        provider = name,
                        error = %err,
                        "Provider failed; continuing with next provider"
                    );
                }
            }
        }

        self.select_images(&mut entry, &candidates);
        // The collected candidate list is transient working set; it goes out
        // of scope here rather than lingering on the entry.
        drop(candidates);

        if cancelled {
            info!(entry_id = %entry.id, "Refresh cancelled; returning partial result");
        } else {
            entry.last_refreshed = Some(chrono::Utc::now());
            info!(entry_id = %entry.id, "Refresh complete");
        }

        entry
    }

    /// Per-provider fetch-vs-reuse verdict for this cycle.
    async fn decide(
        &self,
        provider: &dyn Provider,
        entry: &CatalogEntry,
        options: RefreshOptions,
    ) -> RefreshDecision {
        if options.force_full_refresh {
            return RefreshDecision::Fetch;
        }
        // An entry that never completed a refresh has nothing to reuse.
        let Some(since) = entry.last_refreshed else {
            return RefreshDecision::Fetch;
        };
        if provider.has_changed(entry, since).await {
            RefreshDecision::Fetch
        } else {
            RefreshDecision::Reuse
        }
    }

    /// Keep the top-ranked candidate per image slot as the entry's new tag.
    fn select_images(&self, entry: &mut CatalogEntry, candidates: &[ImageCandidate]) {
        const SLOTS: [ImageKind; 6] = [
            ImageKind::Primary,
            ImageKind::Backdrop,
            ImageKind::Thumb,
            ImageKind::Banner,
            ImageKind::Logo,
            ImageKind::Disc,
        ];

        for slot in SLOTS {
            let ranked = rank(candidates, &self.config.preferred_language, slot);
            if let Some(best) = ranked.first() {
                debug!(
                    entry_id = %entry.id,
                    slot = %slot,
                    provider = %best.provider,
                    url = %best.url,
                    "Selected image"
                );
                entry.images.insert(
                    slot,
                    ImageTag {
                        provider: best.provider.clone(),
                        fingerprint: fingerprint(&best.url),
                        url: best.url.clone(),
                    },
                );
            }
        }
    }
}

/// Opaque content fingerprint for an image tag.
fn fingerprint(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}
