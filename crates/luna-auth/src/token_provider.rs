//! Access token providers.
//!
//! The adapter holds one provider for its lifetime; the provider hands out a
//! bearer token per request and re-requests it when close to expiry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::credential::{AccessToken, ServicePrincipalConfig, now_millis, request_token};
use crate::error::Result;

/// Buffer time before expiry to trigger a new request (5 minutes in milliseconds).
const REFRESH_BUFFER_MS: u64 = 5 * 60 * 1000;

// ============================================================================
// TokenProvider Trait
// ============================================================================

/// Supplies bearer tokens for outgoing API requests.
#[async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    /// Get a valid access token, acquiring a new one if necessary.
    async fn get_token(&self) -> Result<String>;

    /// Drop any cached token.
    async fn clear_cache(&self);
}

/// Shared token provider for use across async contexts.
pub type SharedTokenProvider = Arc<dyn TokenProvider>;

// ============================================================================
// ServicePrincipalTokenProvider
// ============================================================================

/// Client-credentials token provider with an in-memory cache.
#[derive(Debug)]
pub struct ServicePrincipalTokenProvider {
    config: ServicePrincipalConfig,
    http: reqwest::Client,
    cached: RwLock<Option<AccessToken>>,
    request_count: AtomicU32,
}

impl ServicePrincipalTokenProvider {
    /// Create a provider with its own HTTP client.
    pub fn new(config: ServicePrincipalConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a provider reusing an existing HTTP client.
    pub fn with_client(config: ServicePrincipalConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            cached: RwLock::new(None),
            request_count: AtomicU32::new(0),
        }
    }

    /// Number of token requests sent to the authority so far.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Check if a token is expired (with buffer time).
    pub fn is_token_expired(token: &AccessToken) -> bool {
        if token.expires_at == 0 {
            return true;
        }
        now_millis() >= token.expires_at.saturating_sub(REFRESH_BUFFER_MS)
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalTokenProvider {
    async fn get_token(&self) -> Result<String> {
        {
            let cache = self.cached.read().await;
            if let Some(token) = cache.as_ref()
                && !Self::is_token_expired(token)
            {
                return Ok(token.access_token.clone());
            }
        }

        let mut cache = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = cache.as_ref()
            && !Self::is_token_expired(token)
        {
            return Ok(token.access_token.clone());
        }

        let token = request_token(&self.http, &self.config).await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            tenant = %self.config.tenant_id,
            expires_in = token.expires_in,
            "Acquired access token"
        );

        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    async fn clear_cache(&self) {
        let mut cache = self.cached.write().await;
        *cache = None;
    }
}

// ============================================================================
// StaticTokenProvider (for testing)
// ============================================================================

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn clear_cache(&self) {}
}
