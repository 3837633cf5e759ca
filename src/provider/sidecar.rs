//! Local sidecar descriptor provider.
//!
//! Reads a JSON descriptor stored next to the entry's media ([`PartialRecord`]
//! shaped, every field optional). The file location is resolved by the host's
//! filesystem layer through [`SidecarLocator`]; an absent file is a normal
//! not-found outcome. No payload caching: staleness is a modification-time
//! comparison and the file is re-read on every fetch.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::file_changed;
use crate::catalog::{CatalogEntry, EntryKind, PartialRecord};
use crate::error::{ProviderError, Result};

use super::{Contribution, Provider, ProviderDescriptor, SourceKind};

pub const PROVIDER_NAME: &str = "sidecar";

/// Resolves the sidecar descriptor path for an entry, if the entry has a
/// storage location at all. Implemented by the host's filesystem layer.
pub trait SidecarLocator: Send + Sync {
    fn locate(&self, entry: &CatalogEntry) -> Option<PathBuf>;
}

/// Provider reading operator-maintained descriptor files from disk.
///
/// Registered with order 0 so local data merges before any remote source.
pub struct SidecarProvider {
    descriptor: ProviderDescriptor,
    locator: Arc<dyn SidecarLocator>,
}

impl SidecarProvider {
    pub fn new(locator: Arc<dyn SidecarLocator>) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name: PROVIDER_NAME,
                order: 0,
                source: SourceKind::LocalFile,
                kinds: &[
                    EntryKind::Series,
                    EntryKind::Season,
                    EntryKind::Album,
                    EntryKind::Song,
                    EntryKind::Game,
                ],
            },
            locator,
        }
    }
}

#[async_trait]
impl Provider for SidecarProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn has_changed(&self, entry: &CatalogEntry, since: DateTime<Utc>) -> bool {
        match self.locator.locate(entry) {
            Some(path) => file_changed(&path, since),
            None => false,
        }
    }

    async fn fetch(
        &self,
        entry: &CatalogEntry,
        cancel: &CancellationToken,
    ) -> Result<Contribution> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let path = self
            .locator
            .locate(entry)
            .ok_or_else(|| ProviderError::not_found("entry has no storage location"))?;

        // io::ErrorKind::NotFound maps to the benign NotFound variant.
        let bytes = tokio::fs::read(&path).await?;
        let record: PartialRecord = serde_json::from_slice(&bytes)?;

        debug!(entry_id = %entry.id, path = %path.display(), "Read sidecar descriptor");

        Ok(Contribution {
            record: Some(record),
            images: Vec::new(),
        })
    }
}
