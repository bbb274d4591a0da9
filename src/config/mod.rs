mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./upnext.toml",
        "~/.config/upnext/config.toml",
        "/etc/upnext/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let engine = &config.engine;

    if !(engine.completion_threshold > 0.0 && engine.completion_threshold <= 100.0) {
        anyhow::bail!(
            "completion_threshold must be in (0, 100], got {}",
            engine.completion_threshold
        );
    }
    if engine.metadata_ttl_secs == 0 {
        anyhow::bail!("metadata_ttl_secs cannot be 0");
    }
    if engine.request_timeout_secs == 0 {
        anyhow::bail!("request_timeout_secs cannot be 0");
    }
    if engine.max_concurrent_lookups == 0 {
        anyhow::bail!("max_concurrent_lookups cannot be 0");
    }
    if engine.history_page_size == 0 {
        anyhow::bail!("history_page_size cannot be 0");
    }
    if engine.poll_interval_secs == 0 {
        anyhow::bail!("poll_interval_secs cannot be 0");
    }

    if config.metadata.requests_per_second == 0 {
        anyhow::bail!("metadata.requests_per_second cannot be 0");
    }

    let trakt = &config.trakt;
    if trakt.enabled {
        let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if missing(&trakt.client_id) {
            anyhow::bail!("Trakt is enabled but has no client_id");
        }
        if missing(&trakt.access_token) {
            anyhow::bail!("Trakt is enabled but has no access_token");
        }
    }

    Ok(())
}

/// Database path with `~` expanded.
pub fn resolve_db_path(config: &Config) -> PathBuf {
    let raw = config.store.db_path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}
