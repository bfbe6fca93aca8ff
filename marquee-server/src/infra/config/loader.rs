use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use super::{
    models::{
        ArtworkConfig, Config, ConfigMetadata, ConfigWarnings, CorsConfig,
        DatabaseConfig, HistoryConfig, PolicyConfig, ServerConfig,
        TmdbSettings,
    },
    sources::{EnvConfig, FileConfig},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("marquee.toml"),
        PathBuf::from("config/marquee.toml"),
    ]
});

const MAX_HISTORY_LIMIT: usize = 1_000;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, then resolve file and environment values.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Resolve configuration against an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path);
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> (Config, ConfigWarnings) {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No marquee.toml detected; falling back to environment variables",
                "Create ./marquee.toml or set MARQUEE_CONFIG_PATH",
            );
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            policy: file_policy,
            tmdb: file_tmdb,
            artwork: file_artwork,
            history: file_history,
            cors: file_cors,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| ServerConfig::default().host),
            port: env
                .server_port
                .or(file_server.port)
                .unwrap_or(ServerConfig::default().port),
        };

        let database = DatabaseConfig {
            url: env
                .database_url
                .or(file_database.url)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        };
        if database.url.is_none() {
            warnings.push_with_hint(
                "No database configured; hero pools are kept in memory",
                "Set DATABASE_URL to persist pools across restarts",
            );
        }

        let policy = PolicyConfig {
            path: env.policy_path.or(file_policy.path).map(|path| {
                resolve_relative(&path, config_path.as_deref())
            }),
        };

        let tmdb_defaults = TmdbSettings::default();
        let tmdb = TmdbSettings {
            api_key: env
                .tmdb_api_key
                .or(file_tmdb.api_key)
                .filter(|key| !key.trim().is_empty()),
            enabled: env
                .tmdb_enabled
                .or(file_tmdb.enabled)
                .unwrap_or(tmdb_defaults.enabled),
            base_url: env
                .tmdb_base_url
                .or(file_tmdb.base_url)
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            timeout_secs: file_tmdb
                .timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(tmdb_defaults.timeout_secs),
        };
        if tmdb.enabled && tmdb.api_key.is_none() {
            warnings.push_with_hint(
                "TMDB enrichment enabled without an API key; serving local metadata only",
                "Set TMDB_API_KEY or disable with TMDB_ENABLED=false",
            );
        }

        let artwork = ArtworkConfig {
            thumbnail_route: env
                .thumbnail_route
                .or(file_artwork.thumbnail_route)
                .filter(|route| !route.trim().is_empty())
                .unwrap_or_else(|| ArtworkConfig::default().thumbnail_route),
        };

        let history_defaults = HistoryConfig::default();
        let mut history = HistoryConfig {
            window_days: env
                .history_window_days
                .or(file_history.window_days)
                .unwrap_or(history_defaults.window_days),
            limit: env
                .history_limit
                .or(file_history.limit)
                .unwrap_or(history_defaults.limit),
        };
        if history.limit > MAX_HISTORY_LIMIT {
            warnings.push(format!(
                "history limit {} clamped to {MAX_HISTORY_LIMIT}",
                history.limit
            ));
            history.limit = MAX_HISTORY_LIMIT;
        }

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_default(),
        };

        let config = Config {
            server,
            database,
            policy,
            tmdb,
            artwork,
            history,
            cors,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        (config, warnings)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Relative policy paths resolve against the config file's directory.
fn resolve_relative(path: &Path, config_path: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
