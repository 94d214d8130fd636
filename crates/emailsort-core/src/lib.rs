//! Core types, configuration, and utilities for the EmailSort client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_URL, DEFAULT_LOG_LEVEL, DEFAULT_POISONED_TOKEN_SENTINEL, DEFAULT_SITE_URL,
    DEFAULT_SUPABASE_PUBLISHABLE_KEY, DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
