//! Engine configuration

use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of verification-code resends per verification screen.
pub const RESEND_LIMIT: u32 = 5;

/// Window in which a second back press at the navigation root means "exit".
pub const EXIT_PRESS_WINDOW_MS: u64 = 2_000;

/// Timeout applied to every backend call made by the session engine.
pub const REQUEST_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub resend_limit: u32,
    pub exit_press_window_ms: u64,
    /// SQLite file backing the key/value store
    pub db_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            resend_limit: RESEND_LIMIT,
            exit_press_window_ms: EXIT_PRESS_WINDOW_MS,
            db_path: PathBuf::from("rentnest.db"),
        }
    }
}

impl AuthConfig {
    /// Defaults overlaid with `RENTNEST_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RENTNEST_API_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(secs) = std::env::var("RENTNEST_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.request_timeout_secs = secs;
        }
        if let Ok(path) = std::env::var("RENTNEST_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = PathBuf::from(path.trim());
            }
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn exit_press_window(&self) -> Duration {
        Duration::from_millis(self.exit_press_window_ms)
    }

    pub fn store_config(&self) -> rentnest_store::StoreConfig {
        rentnest_store::StoreConfig {
            db_path: self.db_path.clone(),
        }
    }
}
