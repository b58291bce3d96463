use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{
    AsyncCommands,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::info;

use crate::error::CacheError;

const CONNECT_RETRIES: usize = 2;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Key/value store with per-entry expiry used by the response cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Releases the connection. Later calls fail with [`CacheError::Closed`].
    async fn close(&self);
}

/// Opens the backend named by `url`: `redis://`, `rediss://` or `memory://`.
pub async fn connect(url: &str) -> Result<Box<dyn CacheBackend>, CacheError> {
    if url.starts_with("memory://") {
        info!("using in-process response cache");
        return Ok(Box::new(MemoryBackend::new()));
    }
    if url.starts_with("redis://") || url.starts_with("rediss://") {
        return Ok(Box::new(RedisBackend::connect(url).await?));
    }
    Err(CacheError::UnsupportedUrl(url.to_string()))
}

pub struct RedisBackend {
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Connects and verifies the server answers `PING`. An unreachable server
    /// fails after a bounded number of retries.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let mut connection = ConnectionManager::new_with_config(client, config).await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!(url, "connected to redis");
        Ok(Self {
            connection: Mutex::new(Some(connection)),
        })
    }

    fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.connection.lock().clone().ok_or(CacheError::Closed)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection()?;
        Ok(connection.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection()?;
        let seconds = ttl.as_secs().max(1);
        connection.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.connection.lock().take().is_some() {
            info!("redis connection released");
        }
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process backend. Expired entries are dropped when next read.
pub struct MemoryBackend {
    entries: Mutex<Option<HashMap<String, MemoryEntry>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Some(HashMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut guard = self.entries.lock();
        let entries = guard.as_mut().ok_or(CacheError::Closed)?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut guard = self.entries.lock();
        let entries = guard.as_mut().ok_or(CacheError::Closed)?;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn close(&self) {
        self.entries.lock().take();
    }
}
