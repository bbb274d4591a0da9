use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub trakt: TraktConfig,
}

/// Aggregation, caching and scheduling knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Percent at or above which a title counts as finished
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,

    /// Metadata cache entry lifetime in seconds
    #[serde(default = "default_metadata_ttl")]
    pub metadata_ttl_secs: u64,

    /// Timeout applied to each external call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on in-flight metadata lookups
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Number of remote history events fetched per cycle
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,

    /// Quiet period before a burst of store updates triggers a refresh
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Polling fallback interval when the store cannot push updates
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_completion_threshold() -> f64 {
    upnext_common::DEFAULT_COMPLETION_THRESHOLD
}

fn default_metadata_ttl() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    5
}

fn default_max_concurrent_lookups() -> usize {
    8
}

fn default_history_page_size() -> u32 {
    200
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_threshold: default_completion_threshold(),
            metadata_ttl_secs: default_metadata_ttl(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            history_page_size: default_history_page_size(),
            debounce_ms: default_debounce_ms(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl EngineConfig {
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// SQLite database file (tilde is expanded)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("upnext.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// Cinemeta-compatible addon base URL
    #[serde(default = "default_metadata_url")]
    pub base_url: String,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_metadata_url() -> String {
    "https://v3-cinemeta.strem.io".to_string()
}

fn default_requests_per_second() -> u32 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_metadata_url(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Trakt watch-history integration. Disabled unless credentials are given.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraktConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Trakt API application client id
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth bearer token of the signed-in user
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_trakt_url")]
    pub base_url: String,
}

fn default_trakt_url() -> String {
    "https://api.trakt.tv".to_string()
}

impl Default for TraktConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: None,
            access_token: None,
            base_url: default_trakt_url(),
        }
    }
}
