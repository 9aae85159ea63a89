//! Configuration module

use std::env;
use std::fmt;
use std::time::Duration;

/// Default Safe Browsing lookup endpoint
pub const DEFAULT_SAFE_BROWSING_URL: &str =
    "https://safebrowsing.googleapis.com/v4/threatMatches:find";

/// Which cache store backs the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
    None,
}

impl CacheBackend {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => CacheBackend::Memory,
            "none" | "off" | "disabled" => CacheBackend::None,
            _ => CacheBackend::Redis,
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Safe Browsing API key (lookups are refused without it)
    pub api_key: Option<String>,

    /// Server port
    pub port: u16,

    /// Safe Browsing `threatMatches:find` endpoint
    pub safe_browsing_url: String,

    /// Outbound request timeout in seconds
    pub request_timeout_secs: u64,

    /// Cache store selection
    pub cache_backend: CacheBackend,

    /// Redis host
    pub redis_host: String,

    /// Redis port
    pub redis_port: u16,

    /// Redis logical database index
    pub redis_db: i64,

    /// Lifetime of a cached classification in seconds
    pub cache_ttl_secs: u64,

    /// Attach heuristic scores to fresh results
    pub heuristics_enabled: bool,

    /// Substrings of known bad domains
    pub suspicious_domains: Vec<String>,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            safe_browsing_url: env::var("SAFE_BROWSING_URL")
                .unwrap_or_else(|_| DEFAULT_SAFE_BROWSING_URL.to_string()),

            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            cache_backend: env::var("CACHE_BACKEND")
                .map(|b| CacheBackend::parse(&b))
                .unwrap_or(CacheBackend::Redis),

            redis_host: env::var("REDIS_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),

            redis_port: env::var("REDIS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(6379),

            redis_db: env::var("REDIS_DB")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0),

            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),

            heuristics_enabled: env::var("HEURISTICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            suspicious_domains: env::var("SUSPICIOUS_DOMAINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Redis connection URL built from host, port and db index
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            port: 8000,
            safe_browsing_url: DEFAULT_SAFE_BROWSING_URL.to_string(),
            request_timeout_secs: 10,
            cache_backend: CacheBackend::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_db: 0,
            cache_ttl_secs: 3600,
            heuristics_enabled: true,
            suspicious_domains: Vec::new(),
            environment: "development".to_string(),
        }
    }
}

// API key stays out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("safe_browsing_url", &self.safe_browsing_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_backend", &self.cache_backend)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_db", &self.redis_db)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("heuristics_enabled", &self.heuristics_enabled)
            .field("suspicious_domains", &self.suspicious_domains)
            .field("environment", &self.environment)
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
