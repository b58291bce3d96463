use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use crate::error::StartupError;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_MODEL_PATH: &str = "model_pipeline.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_path: PathBuf,
    /// Connection string for the response cache. `memory://` keeps entries in-process.
    pub cache_url: String,
    pub cache_ttl: Duration,
    pub cache_prefix: String,
    /// Path prefix the prediction API is mounted under, e.g. `/lab`.
    pub api_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            cache_url: DEFAULT_REDIS_URL.to_string(),
            cache_ttl: Duration::from_secs(60),
            cache_prefix: "housing-predict".to_string(),
            api_prefix: "/lab".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        let defaults = Self::default();

        let listen_addr = env::var("SERVER_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_addr);

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let cache_url = env::var("REDIS_URL").unwrap_or(defaults.cache_url);

        let cache_ttl = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_prefix = env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix);
        let api_prefix = env::var("API_PREFIX").unwrap_or(defaults.api_prefix);

        let config = Self {
            listen_addr,
            model_path,
            cache_url,
            cache_ttl,
            cache_prefix,
            api_prefix,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        let prefix = self.api_prefix.as_str();
        if prefix.len() < 2 || !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(StartupError::Config(format!(
                "API_PREFIX must look like `/name`, got `{prefix}`"
            )));
        }
        if self.cache_ttl.is_zero() {
            return Err(StartupError::Config(
                "CACHE_TTL_SECS must be greater than zero".into(),
            ));
        }
        if self.cache_prefix.is_empty() {
            return Err(StartupError::Config("CACHE_PREFIX must not be empty".into()));
        }
        Ok(())
    }
}
