use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use moka::future::Cache;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::{config::AuthConfig, Error};

const JWK_SET_CACHE_KEY: &str = "jwk_set";

/// Builder for configuring a [`RemoteJwkSet`] with optional caching.
pub struct RemoteJwkSetBuilder {
    url: Url,
    cache_ttl: Option<Duration>,
    min_refresh_interval: Duration,
    timeout: Duration,
}

impl RemoteJwkSetBuilder {
    /// Creates a new builder with the given JWKS URL. Without [`with_cache`](Self::with_cache), the
    /// set is fetched on every lookup.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            cache_ttl: None,
            min_refresh_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }

    /// Enables caching to avoid re-fetching the remote JWK set on every authentication request.
    pub fn with_cache(mut self, time_to_live: Duration) -> Self {
        self.cache_ttl = Some(time_to_live);
        self
    }

    /// Lower bound between two forced refreshes triggered by unknown key ids.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Upper bound for a single key set request, connection included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RemoteJwkSet, Error> {
        let http_client = Client::builder().timeout(self.timeout).build()?;
        let cache = self.cache_ttl.map(|time_to_live| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(time_to_live)
                .build()
        });

        Ok(RemoteJwkSet {
            http_client,
            url: self.url,
            cache,
            min_refresh_interval: self.min_refresh_interval,
            last_forced_refresh: Arc::new(Mutex::new(None)),
        })
    }
}

/// Signing keys published by the identity provider, fetched over HTTP(S).
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct RemoteJwkSet {
    http_client: Client,
    url: Url,
    cache: Option<Cache<String, Arc<JwkSet>>>,
    min_refresh_interval: Duration,
    last_forced_refresh: Arc<Mutex<Option<Instant>>>,
}

impl RemoteJwkSet {
    /// Creates a builder for configuring a `RemoteJwkSet`.
    pub fn builder(url: Url) -> RemoteJwkSetBuilder {
        RemoteJwkSetBuilder::new(url)
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, Error> {
        let mut builder = Self::builder(config.jwks_url.clone())
            .with_min_refresh_interval(config.jwks_min_refresh_interval)
            .with_timeout(config.fetch_timeout);
        if let Some(ttl) = config.jwks_cache_ttl {
            builder = builder.with_cache(ttl);
        }
        builder.build()
    }

    /// Returns the current key set, from the cache when one is configured and still fresh.
    pub async fn jwk_set(&self) -> Result<Arc<JwkSet>, Error> {
        self.cached_or_fetch().await.map(|(jwk_set, _)| jwk_set)
    }

    /// Looks up the key with the given id.
    ///
    /// If the key is missing from a cached set, the set is fetched again once, since the provider
    /// may have rotated its keys. Such forced refreshes happen at most once per minimum refresh
    /// interval.
    pub async fn find(&self, kid: &str) -> Result<Option<Jwk>, Error> {
        let (jwk_set, fresh) = self.cached_or_fetch().await?;
        if let Some(jwk) = jwk_set.find(kid) {
            return Ok(Some(jwk.clone()));
        }
        if fresh || !self.claim_forced_refresh().await {
            return Ok(None);
        }

        debug!(kid, "key id not in cached JWK set, refreshing");
        let jwk_set = self.refresh().await?;
        Ok(jwk_set.find(kid).cloned())
    }

    /// Also reports whether this call fetched the set itself.
    async fn cached_or_fetch(&self) -> Result<(Arc<JwkSet>, bool), Error> {
        let Some(cache) = &self.cache else {
            return self.fetch().await.map(|jwk_set| (Arc::new(jwk_set), true));
        };

        // Concurrent misses wait on a single fetch; only the caller running it sets `fetched`.
        let mut fetched = false;
        let jwk_set = cache
            .try_get_with(JWK_SET_CACHE_KEY.to_string(), async {
                fetched = true;
                self.fetch().await.map(Arc::new)
            })
            .await?;
        Ok((jwk_set, fetched))
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, Error> {
        let jwk_set = Arc::new(self.fetch().await?);
        if let Some(cache) = &self.cache {
            cache.insert(JWK_SET_CACHE_KEY.to_string(), jwk_set.clone()).await;
        }
        Ok(jwk_set)
    }

    async fn claim_forced_refresh(&self) -> bool {
        let mut last = self.last_forced_refresh.lock().await;
        match *last {
            Some(at) if at.elapsed() < self.min_refresh_interval => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<JwkSet, Error> {
        let response = self
            .http_client
            .get(self.url.clone())
            .send()
            .await
            .inspect_err(|err| warn!(error = %err, "JWK set request failed"))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "JWK set endpoint returned an error");
            return Err(Error::KeySetResponse {
                status: response.status(),
            });
        }

        let jwk_set: JwkSet = response
            .json()
            .await
            .inspect_err(|err| warn!(error = %err, "JWK set response could not be decoded"))?;
        debug!(keys = jwk_set.keys.len(), "fetched JWK set");
        Ok(jwk_set)
    }
}
