//! HTTP transport seam for remote providers.
//!
//! The core never talks to the network directly: remote providers hold a
//! [`Transport`] handle injected at construction. The production
//! implementation wraps [`reqwest`] with a token-bucket rate limit, a bounded
//! 429 retry loop, and a per-service [`ResourcePool`] so one external
//! service is never hit with unbounded parallel requests. Tests substitute
//! canned transports.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Bounded concurrency for one external service.
///
/// Every remote fetch for the service holds a permit for the duration of the
/// request. Shared by all providers that talk to the same service.
#[derive(Clone)]
pub struct ResourcePool {
    semaphore: Arc<Semaphore>,
}

impl ResourcePool {
    /// Pool allowing at most `permits` concurrent requests.
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Acquire a request token, waiting if the service is saturated.
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition cannot fail.
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("resource pool semaphore closed")
    }
}

/// Executes a GET for a url and returns the raw response body.
///
/// Retries and timeouts are the transport's responsibility; callers only see
/// the taxonomy: `NotFound` for 404, `Transient` for everything else that
/// fails.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Bytes>;
}

/// Production transport: reqwest with rate limiting and 429 backoff.
pub struct ReqwestTransport {
    client: reqwest::Client,
    pool: ResourcePool,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl ReqwestTransport {
    /// Create a transport limited to `requests_per_second` and bounded by
    /// `pool`.
    pub fn new(requests_per_second: u32, pool: ResourcePool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::transient(format!("failed to build http client: {e}")))?;

        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            pool,
            rate_limiter,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<Bytes> {
        let _permit = self.pool.acquire().await;

        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ProviderError::transient(format!("request failed: {url}: {e}")))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(url = %url, retry = retries, wait_secs = wait, "Got 429, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if resp.status() == StatusCode::NOT_FOUND {
                return Err(ProviderError::not_found(url.to_string()));
            }

            let resp = resp.error_for_status().map_err(|e| {
                ProviderError::transient(format!("request returned error: {url}: {e}"))
            })?;

            debug!(url = %url, "Fetched remote payload");
            return resp
                .bytes()
                .await
                .map_err(|e| ProviderError::transient(format!("body read failed: {url}: {e}")));
        }
    }
}
