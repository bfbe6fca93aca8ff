use std::path::PathBuf;

use chrono::Duration;
use marquee_core::hero::HistoryTracker;
use marquee_core::hero::artwork::DEFAULT_THUMBNAIL_ROUTE;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub policy: PolicyConfig,
    pub tmdb: TmdbSettings,
    pub artwork: ArtworkConfig,
    pub history: HistoryConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// `None` runs the server on in-memory collaborators.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    /// Hero policy JSON file; the built-in policy is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TmdbSettings {
    pub api_key: Option<String>,
    pub enabled: bool,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: true,
            base_url: None,
            timeout_secs: 10,
        }
    }
}

impl TmdbSettings {
    /// Enabled and holding a non-blank key.
    pub fn is_usable(&self) -> bool {
        self.enabled
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ArtworkConfig {
    pub thumbnail_route: String,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            thumbnail_route: DEFAULT_THUMBNAIL_ROUTE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub window_days: u32,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            limit: 60,
        }
    }
}

impl HistoryConfig {
    pub fn tracker(&self) -> HistoryTracker {
        HistoryTracker::new(
            Duration::days(i64::from(self.window_days)),
            self.limit,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
