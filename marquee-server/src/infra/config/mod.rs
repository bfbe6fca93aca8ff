//! Server configuration: `marquee.toml`, environment, then CLI overrides.

pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    ArtworkConfig, Config, ConfigMetadata, ConfigWarning, ConfigWarnings,
    CorsConfig, DatabaseConfig, HistoryConfig, PolicyConfig, ServerConfig,
    TmdbSettings,
};
