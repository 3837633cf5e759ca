//! Failure taxonomy for providers and the refresh pipeline.
//!
//! Every failure in the core is scoped to a single provider, cache key, or
//! parsed record. Nothing here is fatal to the host process: the orchestrator
//! treats [`ProviderError::NotFound`] as an empty contribution, isolates
//! `Transient` and `Malformed` failures to the provider that raised them, and
//! turns `Cancelled` into a best-effort partial result.

/// Error raised by a provider or by the remote cache on its behalf.
///
/// `Clone` so a single-flight fetch outcome can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The backing resource (sidecar file, catalog document, remote record)
    /// does not exist. Benign: yields an empty contribution.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A network or upstream failure. Retried on the next scheduled refresh.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A single record or payload could not be parsed.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Cooperative cancellation was observed mid-fetch or mid-parse.
    #[error("Cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Transient error.
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a new Malformed error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::Malformed(msg.into())
    }

    /// Returns `true` for the benign absent-resource case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result type alias using [`ProviderError`].
pub type Result<T> = std::result::Result<T, ProviderError>;
