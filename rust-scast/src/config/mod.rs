//! Application configuration.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file) with typed fallbacks.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::database::time::UsageResetPolicy;
use crate::engine::FfmpegEngineConfig;
use crate::logging::LoggingSettings;
use crate::session::SessionConfig;

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:scast.db?mode=rwc";

/// Top-level configuration of the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub api: ApiServerConfig,
    pub logging: LoggingSettings,
    pub engine: FfmpegEngineConfig,
    pub session: SessionConfig,
    /// Calendar used for daily usage resets.
    pub usage_reset: UsageResetPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api: ApiServerConfig::default(),
            logging: LoggingSettings::default(),
            engine: FfmpegEngineConfig::default(),
            session: SessionConfig::default(),
            usage_reset: UsageResetPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `DATABASE_URL`
    /// - `API_BIND_ADDRESS`, `API_PORT`
    /// - `LOG_DIR`, `LOG_JSON`
    /// - `SCAST_FFMPEG_PATH`, `SCAST_WORK_DIR`
    /// - `SCAST_USAGE_DEBOUNCE_SECS`, `SCAST_USAGE_RESET_TZ` (`utc` or `local`)
    /// - `SCAST_STOP_TIMEOUT_SECS`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(bind_address) = var("API_BIND_ADDRESS") {
            config.api.bind_address = bind_address;
        }
        if let Some(port) = var("API_PORT") {
            match port.trim().parse::<u16>() {
                Ok(parsed) => config.api.port = parsed,
                Err(_) => warn!("Ignoring invalid API_PORT '{}'", port),
            }
        }

        if let Some(dir) = var("LOG_DIR") {
            config.logging.log_dir = PathBuf::from(dir);
        }
        if let Some(json) = var("LOG_JSON") {
            config.logging.json = matches!(json.trim(), "1" | "true" | "yes");
        }

        if let Some(path) = var("SCAST_FFMPEG_PATH") {
            config.engine.binary_path = path;
        }
        if let Some(dir) = var("SCAST_WORK_DIR") {
            config.engine.work_dir = PathBuf::from(dir);
        }

        if let Some(secs) = var("SCAST_USAGE_DEBOUNCE_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(parsed) => config.session.usage_debounce_secs = parsed,
                Err(_) => warn!("Ignoring invalid SCAST_USAGE_DEBOUNCE_SECS '{}'", secs),
            }
        }
        if let Some(secs) = var("SCAST_STOP_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(parsed) => config.session.stop_timeout = Duration::from_secs(parsed),
                Err(_) => warn!("Ignoring invalid SCAST_STOP_TIMEOUT_SECS '{}'", secs),
            }
        }
        if let Some(tz) = var("SCAST_USAGE_RESET_TZ") {
            match UsageResetPolicy::parse(&tz) {
                Some(policy) => config.usage_reset = policy,
                None => warn!("Ignoring unknown SCAST_USAGE_RESET_TZ '{}'", tz),
            }
        }

        config
    }
}
