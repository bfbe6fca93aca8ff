use std::{sync::Arc, time::Duration};

use anyhow::Context;
use marquee_core::hero::{ArtworkResolver, HeroPoolService};
use marquee_core::infra::{InMemoryCatalog, InMemoryHeroPoolStore};
use marquee_core::policy::{PolicySource, PolicyStore};
use marquee_core::ports::{CatalogReader, HeroPoolStore, MetadataProvider};
use marquee_core::providers::{DisabledProvider, TmdbConfig, TmdbProvider};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::infra::config::{Config, TmdbSettings};

/// Metadata provider for the given settings, disabled when unusable.
pub fn build_provider(
    settings: &TmdbSettings,
) -> anyhow::Result<Arc<dyn MetadataProvider>> {
    if !settings.is_usable() {
        info!("TMDB enrichment disabled");
        return Ok(Arc::new(DisabledProvider));
    }

    let defaults = TmdbConfig::default();
    let config = TmdbConfig {
        api_key: settings.api_key.clone().unwrap_or_default(),
        enabled: settings.enabled,
        base_url: settings.base_url.clone().unwrap_or(defaults.base_url),
        image_base: defaults.image_base,
        timeout: Duration::from_secs(settings.timeout_secs),
    };
    let provider =
        TmdbProvider::new(config).context("failed to build TMDB client")?;
    info!(base_url = ?settings.base_url, "TMDB enrichment enabled");
    Ok(Arc::new(provider))
}

pub fn build_policy_store(config: &Config) -> PolicyStore {
    match &config.policy.path {
        Some(path) => {
            info!(path = %path.display(), "hero policy file configured");
            PolicyStore::new(PolicySource::File(path.clone()))
        }
        None => PolicyStore::builtin(),
    }
}

/// Wire the pool service from configuration.
///
/// Without a database URL the catalog is empty and pools live in memory.
pub async fn build_hero_service(
    config: &Config,
) -> anyhow::Result<HeroPoolService> {
    let (catalog, store): (Arc<dyn CatalogReader>, Arc<dyn HeroPoolStore>) =
        match &config.database.url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(8)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(url)
                    .await
                    .context("failed to connect to database")?;
                marquee_core::MIGRATOR
                    .run(&pool)
                    .await
                    .context("failed to run database migrations")?;
                info!("database migrations applied");
                (
                    Arc::new(marquee_core::database::PostgresCatalogReader::new(
                        pool.clone(),
                    )),
                    Arc::new(marquee_core::database::PostgresHeroPoolStore::new(
                        pool,
                    )),
                )
            }
            None => {
                warn!("running without a database; catalog is empty");
                (
                    Arc::new(InMemoryCatalog::default()),
                    Arc::new(InMemoryHeroPoolStore::new()),
                )
            }
        };

    let provider = build_provider(&config.tmdb)?;
    let policies = Arc::new(build_policy_store(config));

    Ok(HeroPoolService::new(catalog, store, policies, provider)
        .with_artwork(ArtworkResolver::new(
            config.artwork.thumbnail_route.clone(),
        ))
        .with_history(config.history.tracker()))
}
