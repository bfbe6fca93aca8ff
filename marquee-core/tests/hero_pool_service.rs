use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use marquee_core::error::{HeroError, Result};
use marquee_core::hero::{HeroPoolService, PoolRequest};
use marquee_core::infra::{InMemoryCatalog, InMemoryHeroPoolStore};
use marquee_core::policy::{PolicySource, PolicyStore};
use marquee_core::ports::{
    CatalogReader, CatalogRecord, ExternalRef, HeroPoolStore,
    MetadataProvider, ProviderDetails, ProviderError, ProviderIds,
    StoredHeroPool,
};
use marquee_core::providers::DisabledProvider;
use marquee_model::{ItemSource, MediaKind, RateLimitState};
use tokio_util::sync::CancellationToken;

fn movie(index: usize) -> CatalogRecord {
    let mut record = CatalogRecord::new(
        format!("m{index:02}"),
        MediaKind::Movie,
        format!("Movie {index}"),
    );
    record.year = Some((1980 + index).to_string());
    record.provider_ids = ProviderIds {
        tmdb: Some((1000 + index).to_string()),
        ..ProviderIds::default()
    };
    record
}

fn catalog(count: usize) -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new((0..count).map(movie).collect()))
}

fn inline_policy(json: &str) -> Arc<PolicyStore> {
    Arc::new(PolicyStore::new(PolicySource::Inline(json.to_string())))
}

fn ids(items: &[marquee_model::HeroPoolItem]) -> HashSet<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

/// Answers from a per-language script.
#[derive(Debug, Default)]
struct ScriptedProvider {
    by_language: HashMap<String, ProviderDetails>,
    rate_limited: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn with(mut self, language: &str, details: ProviderDetails) -> Self {
        self.by_language.insert(language.to_string(), details);
        self
    }

    fn rate_limited() -> Self {
        Self {
            rate_limited: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MetadataProvider for ScriptedProvider {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn fetch_details_by_id(
        &self,
        _kind: MediaKind,
        tmdb_id: &str,
        language: &str,
    ) -> std::result::Result<Option<ProviderDetails>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        Ok(self.by_language.get(language).map(|details| ProviderDetails {
            tmdb_id: Some(tmdb_id.to_string()),
            ..details.clone()
        }))
    }

    async fn fetch_details_by_external_id(
        &self,
        _kind: MediaKind,
        _external: &ExternalRef,
        _language: &str,
    ) -> std::result::Result<Option<ProviderDetails>, ProviderError> {
        Ok(None)
    }

    fn rate_limit_state(&self) -> RateLimitState {
        RateLimitState::default()
    }
}

struct FailingCatalog;

#[async_trait]
impl CatalogReader for FailingCatalog {
    async fn list_all_media_records(&self) -> Result<Vec<CatalogRecord>> {
        Err(HeroError::Catalog("catalog offline".into()))
    }

    async fn list_thumbnails_by_media_ids(
        &self,
        _ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        Err(HeroError::Catalog("catalog offline".into()))
    }
}

struct ReadOnlyStore;

#[async_trait]
impl HeroPoolStore for ReadOnlyStore {
    async fn load(&self, _kind: MediaKind) -> Result<Option<StoredHeroPool>> {
        Ok(None)
    }

    async fn upsert(&self, _row: &StoredHeroPool) -> Result<()> {
        Err(HeroError::Storage("read-only".into()))
    }
}

fn service(
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn HeroPoolStore>,
    policies: Arc<PolicyStore>,
    provider: Arc<dyn MetadataProvider>,
) -> HeroPoolService {
    HeroPoolService::new(catalog, store, policies, provider)
}

#[tokio::test]
async fn cached_pool_is_served_until_forced() {
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let svc = service(
        catalog(20),
        store.clone(),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let built = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(!built.from_cache);
    assert_eq!(built.items.len(), 10);
    assert_eq!(built.slots.total(), 10);

    let cached = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.items, built.items);
    assert_eq!(cached.generated_at, built.generated_at);

    let forced = svc
        .get_pool(MediaKind::Movie, PoolRequest::forced())
        .await
        .unwrap();
    assert!(!forced.from_cache);
    assert!(forced.generated_at >= built.generated_at);
    assert!(store.snapshot(MediaKind::Series).is_none());
}

#[tokio::test]
async fn policy_change_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hero-policy.json");
    std::fs::write(&path, r#"{"poolSizeMovies": 6}"#).unwrap();

    let svc = service(
        catalog(20),
        Arc::new(InMemoryHeroPoolStore::new()),
        Arc::new(PolicyStore::new(PolicySource::File(path.clone()))),
        Arc::new(DisabledProvider),
    );

    let first = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert_eq!(first.items.len(), 6);

    std::fs::write(&path, r#"{"poolSizeMovies": 4}"#).unwrap();

    let second = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.items.len(), 4);
    assert_ne!(second.policy_fingerprint, first.policy_fingerprint);
}

#[tokio::test]
async fn history_steers_the_next_build_away_from_recent_items() {
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let svc = service(
        catalog(20),
        store.clone(),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let first = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    let second = svc
        .get_pool(MediaKind::Movie, PoolRequest::forced())
        .await
        .unwrap();

    assert_eq!(second.meta.history_size, 10);
    assert!(ids(&first.items).is_disjoint(&ids(&second.items)));

    let row = store.snapshot(MediaKind::Movie).unwrap();
    assert_eq!(row.history.len(), 20);
    assert!(
        row.history
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp)
    );
}

#[tokio::test]
async fn disabled_provider_serves_local_items() {
    let svc = service(
        catalog(12),
        Arc::new(InMemoryHeroPoolStore::new()),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let pool = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();

    assert!(!pool.meta.enrichment.provider_enabled);
    assert_eq!(pool.meta.enrichment.enriched, 0);
    assert!(pool.items.iter().all(|item| item.source == ItemSource::Local));
    assert!(pool.items.iter().all(|item| item.cta.label == "Watch now"));
}

#[tokio::test]
async fn rate_limit_is_reported_and_items_stay_local() {
    let provider = Arc::new(ScriptedProvider::rate_limited());
    let svc = service(
        catalog(12),
        Arc::new(InMemoryHeroPoolStore::new()),
        Arc::new(PolicyStore::builtin()),
        provider.clone(),
    );

    let pool = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();

    assert!(pool.meta.enrichment.rate_limited);
    assert!(pool.meta.enrichment.rate_limit.is_some());
    assert_eq!(pool.items.len(), 10);
    assert!(pool.items.iter().all(|item| item.source == ItemSource::Local));
    assert!(provider.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn fallback_language_fills_missing_backdrops() {
    let provider = ScriptedProvider::default()
        .with(
            "fr-FR",
            ProviderDetails {
                language: "fr-FR".into(),
                title: Some("Titre".into()),
                ..ProviderDetails::default()
            },
        )
        .with(
            "en-US",
            ProviderDetails {
                language: "en-US".into(),
                title: Some("Title".into()),
                backdrops: vec!["https://img.example/en.jpg".into()],
                poster: Some("https://img.example/en-poster.jpg".into()),
                ..ProviderDetails::default()
            },
        );

    let svc = service(
        catalog(3),
        Arc::new(InMemoryHeroPoolStore::new()),
        inline_policy(
            r#"{"poolSizeMovies": 3, "language": {"preferred": "fr-FR", "fallback": "en-US"}}"#,
        ),
        Arc::new(provider),
    );

    let pool = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();

    assert_eq!(pool.meta.enrichment.enriched, 3);
    for item in &pool.items {
        assert_eq!(item.source, ItemSource::Tmdb);
        assert_eq!(item.title, "Titre");
        assert_eq!(item.backdrops, vec!["https://img.example/en.jpg"]);
        assert_eq!(
            item.poster.as_deref(),
            Some("https://img.example/en-poster.jpg")
        );
        assert_eq!(item.cta.label, "Watch now");
    }
}

#[tokio::test]
async fn cancelled_build_is_returned_but_not_cached() {
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let provider = ScriptedProvider::default().with(
        "en-US",
        ProviderDetails {
            language: "en-US".into(),
            ..ProviderDetails::default()
        },
    );
    let svc = service(
        catalog(12),
        store.clone(),
        Arc::new(PolicyStore::builtin()),
        Arc::new(provider),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let pool = svc
        .get_pool(
            MediaKind::Movie,
            PoolRequest {
                force: false,
                cancel: Some(cancel),
            },
        )
        .await
        .unwrap();

    assert!(pool.meta.enrichment.cancelled);
    assert_eq!(pool.items.len(), 10);
    assert!(store.snapshot(MediaKind::Movie).is_none());
}

#[tokio::test]
async fn store_write_failure_still_returns_the_pool() {
    let svc = service(
        catalog(12),
        Arc::new(ReadOnlyStore),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let pool = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert_eq!(pool.items.len(), 10);
    assert!(!pool.from_cache);
}

#[tokio::test]
async fn catalog_outage_serves_stale_pool_within_grace() {
    let policies = Arc::new(PolicyStore::builtin());
    let fingerprint = policies.current().await.fingerprint.clone();
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let now = Utc::now();

    let seed = service(
        catalog(12),
        store.clone(),
        policies.clone(),
        Arc::new(DisabledProvider),
    );
    let seeded = seed
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();

    let mut row = store.snapshot(MediaKind::Movie).unwrap();
    assert_eq!(row.policy_fingerprint, fingerprint);
    row.expires_at = now - Duration::minutes(5);
    store.upsert(&row).await.unwrap();

    let svc = service(
        Arc::new(FailingCatalog),
        store.clone(),
        policies,
        Arc::new(DisabledProvider),
    );

    let stale = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(stale.meta.stale);
    assert!(stale.from_cache);
    assert_eq!(stale.items, seeded.items);

    row.expires_at = now - Duration::hours(2);
    store.upsert(&row).await.unwrap();

    let err = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HeroError::Catalog(_)));
}

#[tokio::test]
async fn zero_pool_size_skips_the_catalog() {
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let svc = service(
        Arc::new(FailingCatalog),
        store.clone(),
        inline_policy(r#"{"poolSizeSeries": 0}"#),
        Arc::new(DisabledProvider),
    );

    let pool = svc
        .get_pool(MediaKind::Series, PoolRequest::default())
        .await
        .unwrap();

    assert!(pool.is_empty());
    assert_eq!(pool.slots.total(), 0);
    assert!(store.snapshot(MediaKind::Series).is_some());
}

#[tokio::test]
async fn empty_catalog_yields_empty_pool() {
    let svc = service(
        catalog(0),
        Arc::new(InMemoryHeroPoolStore::new()),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let pool = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(pool.is_empty());
    assert_eq!(pool.meta.candidate_count, 0);
}

#[tokio::test]
async fn rebound_provider_is_used_by_the_next_build() {
    let svc = service(
        catalog(12),
        Arc::new(InMemoryHeroPoolStore::new()),
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    );

    let local = svc
        .get_pool(MediaKind::Movie, PoolRequest::default())
        .await
        .unwrap();
    assert!(local.items.iter().all(|item| item.source == ItemSource::Local));

    svc.rebind_provider(Arc::new(ScriptedProvider::default().with(
        "en-US",
        ProviderDetails {
            language: "en-US".into(),
            backdrops: vec!["https://img.example/b.jpg".into()],
            ..ProviderDetails::default()
        },
    )));
    assert!(svc.provider().is_enabled());

    let enriched = svc
        .get_pool(MediaKind::Movie, PoolRequest::forced())
        .await
        .unwrap();
    assert!(enriched.meta.enrichment.provider_enabled);
    assert!(
        enriched
            .items
            .iter()
            .all(|item| item.source == ItemSource::Tmdb)
    );
}

#[tokio::test]
async fn concurrent_requests_share_one_build() {
    let store = Arc::new(InMemoryHeroPoolStore::new());
    let svc = Arc::new(service(
        catalog(20),
        store,
        Arc::new(PolicyStore::builtin()),
        Arc::new(DisabledProvider),
    ));

    let (a, b) = tokio::join!(
        svc.get_pool(MediaKind::Movie, PoolRequest::default()),
        svc.get_pool(MediaKind::Movie, PoolRequest::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.generated_at, b.generated_at);
    assert_eq!(a.items, b.items);
    assert!(a.from_cache != b.from_cache);
}
