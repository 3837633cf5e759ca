//! Metaforge: metadata acquisition and reconciliation core for media catalogs.
//!
//! The crate turns a set of pluggable metadata and artwork sources into a
//! single merged [`CatalogEntry`](catalog::CatalogEntry) per media item:
//!
//! - **Providers**: remote metadata catalogs, remote image catalogs, and local
//!   sidecar descriptors behind one [`Provider`](provider::Provider) trait
//! - **Remote cache**: TTL-scoped payload cache with request coalescing, so
//!   concurrent refreshes of the same resource share a single network fetch
//! - **Merge engine**: policy-driven field merging that honors per-field
//!   operator locks
//! - **Image ranking**: deterministic candidate ordering by resolution,
//!   language affinity, and community rating
//! - **Orchestration**: the per-entry refresh pipeline with provider failure
//!   isolation and cooperative cancellation
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use metaforge::catalog::{CatalogEntry, EntryKind};
//! use metaforge::config::RefreshConfig;
//! use metaforge::provider::ProviderRegistry;
//! use metaforge::refresh::{RefreshOptions, RefreshOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let registry = Arc::new(ProviderRegistry::new());
//! let config = Arc::new(RefreshConfig::default());
//! let orchestrator = RefreshOrchestrator::new(registry, config);
//!
//! let entry = CatalogEntry::new("series-1", EntryKind::Series);
//! let refreshed = orchestrator
//!     .refresh(entry, RefreshOptions::default(), CancellationToken::new())
//!     .await;
//! # let _ = refreshed;
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod merge;
pub mod provider;
pub mod rank;
pub mod refresh;
pub mod transport;

pub use error::{ProviderError, Result};
