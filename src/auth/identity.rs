use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::CurrentUser;
use crate::transport::{HttpTransport, TransportError};

/// Remembers which account a bearer token belongs to, so opening a chat does
/// not cost a `GET /user` round trip every time.
#[derive(Clone)]
pub struct IdentityCache {
    cache: Arc<Cache<String, CurrentUser>>,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Arc::new(
            Cache::builder()
                .time_to_live(ttl)
                .max_capacity(16)
                .build(),
        );

        Self { cache }
    }

    /// Return the cached user for `token`, running `fetch` on a miss.
    /// Concurrent misses for the same token share one fetch. Failures are not
    /// cached.
    pub async fn resolve<F, Fut>(&self, token: &str, fetch: F) -> Result<CurrentUser, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CurrentUser, TransportError>>,
    {
        if let Some(cached) = self.cache.get(token).await {
            return Ok(cached);
        }

        debug!("Resolving current user from the API");
        self.cache
            .try_get_with(token.to_string(), fetch())
            .await
            .map_err(|e| e.as_ref().clone())
    }

    /// The user behind `transport`'s current token.
    pub async fn current_user(&self, transport: &HttpTransport) -> Result<CurrentUser, TransportError> {
        let token = transport.bearer()?;
        self.resolve(&token, || transport.current_user()).await
    }

    /// Drop the entry for `token`, e.g. after logout.
    pub async fn forget(&self, token: &str) {
        self.cache.invalidate(token).await;
    }
}
