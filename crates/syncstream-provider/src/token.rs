//! Access token cache

use std::future::Future;
use std::sync::Arc;
use syncstream_store::{AuditEvent, AuditEventType, Store};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ProviderResult;

/// Store key holding the raw bearer token
pub const ACCESS_TOKEN_KEY: &str = "provider:access_token";

/// Cached bearer token backed by the store.
///
/// Reads are lock-free. Refreshes are serialized: a caller that waited on
/// another refresh reuses the token it wrote.
pub struct TokenCache {
    store: Arc<dyn Store>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Currently cached token, if any
    pub fn current(&self) -> ProviderResult<Option<String>> {
        Ok(self.store.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    /// Replace `stale` (the token the caller last used) with a fresh one.
    ///
    /// If the cached token already differs from `stale`, someone else
    /// refreshed while we waited and that token is returned instead of
    /// calling `fetch`.
    pub async fn refresh<F, Fut>(&self, stale: Option<&str>, fetch: F) -> ProviderResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        let _guard = self.refresh_lock.lock().await;

        if let Some(cached) = self.current()?
            && Some(cached.as_str()) != stale
        {
            debug!("Token refreshed concurrently, reusing it");
            return Ok(cached);
        }

        let token = fetch().await?;
        self.store.set(ACCESS_TOKEN_KEY, &token)?;
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::TokenRefreshed))
        {
            warn!(error = %e, "Failed to record token refresh");
        }
        info!("Access token refreshed");
        Ok(token)
    }

    /// Cached token, refreshing first when the slot is empty
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> ProviderResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        match self.current()? {
            Some(token) => Ok(token),
            None => self.refresh(None, fetch).await,
        }
    }
}
