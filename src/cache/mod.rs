//! Response caching for the prediction routes.

mod backend;
mod key;
mod layer;

pub use backend::{CacheBackend, MemoryBackend, RedisBackend, connect};
pub use key::fingerprint;
pub use layer::{CacheStatus, Cached, ResponseCache};
