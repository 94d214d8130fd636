//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default EmailSort backend URL (overridable at runtime via EMAILSORT_API_URL).
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default site URL used as the OAuth redirect target
/// (overridable at runtime via EMAILSORT_SITE_URL).
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://project.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via
/// SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "publishable-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The placeholder value the identity exchange emits in place of a real
/// delegated token under misconfiguration. A session carrying this value
/// must be treated as unusable and re-consented.
pub const DEFAULT_POISONED_TOKEN_SENTINEL: &str = "present";

/// Default interval between email snapshot refreshes (30 seconds).
const DEFAULT_EMAIL_REFRESH_INTERVAL_MS: u64 = 30_000;

/// Default interval between collection triggers (30 minutes).
const DEFAULT_COLLECTION_INTERVAL_MS: u64 = 1_800_000;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// EmailSort backend base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Frontend origin the OAuth flow redirects back to.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// Placeholder value that marks a delegated token as poisoned.
    /// TODO: remove once the upstream token exchange stops emitting it.
    #[serde(default = "default_poisoned_token_sentinel")]
    pub poisoned_token_sentinel: String,
    /// Interval between email snapshot refreshes, in milliseconds.
    #[serde(default = "default_email_refresh_interval_ms")]
    pub email_refresh_interval_ms: u64,
    /// Interval between collection triggers, in milliseconds.
    #[serde(default = "default_collection_interval_ms")]
    pub collection_interval_ms: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_poisoned_token_sentinel() -> String {
    DEFAULT_POISONED_TOKEN_SENTINEL.to_string()
}

fn default_email_refresh_interval_ms() -> u64 {
    DEFAULT_EMAIL_REFRESH_INTERVAL_MS
}

fn default_collection_interval_ms() -> u64 {
    DEFAULT_COLLECTION_INTERVAL_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_publishable_key: DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string(),
            poisoned_token_sentinel: DEFAULT_POISONED_TOKEN_SENTINEL.to_string(),
            email_refresh_interval_ms: DEFAULT_EMAIL_REFRESH_INTERVAL_MS,
            collection_interval_ms: DEFAULT_COLLECTION_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a file, falling back to defaults.
    /// Note: supabase_url and supabase_publishable_key are compile-time only
    /// and will always use the built-in defaults, regardless of what's in the
    /// config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.supabase_url = DEFAULT_SUPABASE_URL.to_string();
        config.supabase_publishable_key = DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("EMAILSORT_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(api_url) = std::env::var("EMAILSORT_API_URL") {
            self.api_url = api_url;
        }
        if let Ok(site_url) = std::env::var("EMAILSORT_SITE_URL") {
            self.site_url = site_url;
        }
    }

    /// Get the backend API URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}
