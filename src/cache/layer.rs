use std::{future::Future, time::Duration};

use axum::{
    Json,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    cache::{CacheBackend, backend, fingerprint},
    config::AppConfig,
    error::CacheError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A response value together with how it was produced.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
    pub max_age: Duration,
}

impl<T: Serialize> IntoResponse for Cached<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.value).into_response();
        let headers = response.headers_mut();
        headers.insert("x-cache", HeaderValue::from_static(self.status.as_str()));
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", self.max_age.as_secs())) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        response
    }
}

/// Best-effort memoisation of route results keyed by request fingerprint.
///
/// Backend faults are logged and the computation runs as if the entry were
/// absent; they never fail the request.
pub struct ResponseCache {
    backend: Box<dyn CacheBackend>,
    ttl: Duration,
    prefix: String,
}

impl ResponseCache {
    pub fn new(backend: Box<dyn CacheBackend>, ttl: Duration, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            ttl,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(config: &AppConfig) -> Result<Self, CacheError> {
        let backend = backend::connect(&config.cache_url).await?;
        Ok(Self::new(backend, config.cache_ttl, config.cache_prefix.clone()))
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }

    /// Returns the stored result for `(route, body)` or runs `compute` and stores it.
    pub async fn get_or_compute<B, T, E, F, Fut>(
        &self,
        route: &str,
        body: &B,
        compute: F,
    ) -> Result<Cached<T>, E>
    where
        B: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match fingerprint(&self.prefix, route, body) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(route, error = %err, "could not fingerprint request, bypassing cache");
                None
            }
        };

        if let Some(key) = key.as_deref() {
            if let Some(value) = self.lookup(key).await {
                debug!(route, key, "cache hit");
                return Ok(self.wrap(value, CacheStatus::Hit));
            }
            debug!(route, key, "cache miss");
        }

        let value = compute().await?;

        if let Some(key) = key.as_deref() {
            self.store(key, &value).await;
        }
        Ok(self.wrap(value, CacheStatus::Miss))
    }

    fn wrap<T>(&self, value: T, status: CacheStatus) -> Cached<T> {
        Cached {
            value,
            status,
            max_age: self.ttl,
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let result = match serde_json::to_string(value) {
            Ok(raw) => self.backend.set(key, &raw, self.ttl).await,
            Err(err) => Err(CacheError::from(err)),
        };
        if let Err(err) = result {
            warn!(key, error = %err, "cache write failed");
        }
    }
}
