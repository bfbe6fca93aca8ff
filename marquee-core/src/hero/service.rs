use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use marquee_model::{
    EnrichmentMeta, HeroPoolPayload, HistoryEntry, MediaKind, PoolMeta,
};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::artwork::ArtworkResolver;
use super::candidate::prepare_candidates;
use super::enrichment::enrich_selection;
use super::history::{HistoryTracker, history_ids};
use super::item::build_item;
use super::selection::{DiversityCaps, RandomShuffle, select_pool};
use super::slots::plan_slots;
use crate::error::Result;
use crate::policy::{EffectivePolicy, PolicyStore};
use crate::ports::{
    CatalogReader, CatalogRecord, HeroPoolStore, MetadataProvider,
    StoredHeroPool,
};

/// Options for a single pool request.
#[derive(Debug, Clone, Default)]
pub struct PoolRequest {
    /// Skip the cache and rebuild.
    pub force: bool,
    /// Stops enrichment early; the build then returns local-only items.
    pub cancel: Option<CancellationToken>,
}

impl PoolRequest {
    pub fn forced() -> Self {
        Self {
            force: true,
            cancel: None,
        }
    }
}

/// Serves hero pools per media kind, rebuilding on cache miss.
pub struct HeroPoolService {
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn HeroPoolStore>,
    policies: Arc<PolicyStore>,
    provider: RwLock<Arc<dyn MetadataProvider>>,
    artwork: ArtworkResolver,
    history: HistoryTracker,
    build_locks: HashMap<MediaKind, Mutex<()>>,
}

impl std::fmt::Debug for HeroPoolService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeroPoolService")
            .field("policies", &self.policies)
            .field("provider", &*self.provider.read())
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

struct BuildResult {
    payload: HeroPoolPayload,
    history: Vec<HistoryEntry>,
    cancelled: bool,
}

impl HeroPoolService {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        store: Arc<dyn HeroPoolStore>,
        policies: Arc<PolicyStore>,
        provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            catalog,
            store,
            policies,
            provider: RwLock::new(provider),
            artwork: ArtworkResolver::default(),
            history: HistoryTracker::default(),
            build_locks: MediaKind::ALL
                .into_iter()
                .map(|kind| (kind, Mutex::new(())))
                .collect(),
        }
    }

    pub fn with_artwork(mut self, artwork: ArtworkResolver) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn with_history(mut self, history: HistoryTracker) -> Self {
        self.history = history;
        self
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    /// Swap the metadata provider used by subsequent builds.
    pub fn rebind_provider(&self, provider: Arc<dyn MetadataProvider>) {
        info!(enabled = provider.is_enabled(), "hero metadata provider rebound");
        *self.provider.write() = provider;
    }

    pub fn provider(&self) -> Arc<dyn MetadataProvider> {
        Arc::clone(&self.provider.read())
    }

    /// The hero pool for `kind`, from cache when still valid.
    #[instrument(skip(self, request), fields(force = request.force))]
    pub async fn get_pool(
        &self,
        kind: MediaKind,
        request: PoolRequest,
    ) -> Result<HeroPoolPayload> {
        let effective = self.policies.current().await;

        if !request.force
            && let Some(hit) = self.cached_payload(kind, &effective).await
        {
            return Ok(hit);
        }

        let _guard = match self.build_locks.get(&kind) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        // Another request may have finished a build while we waited.
        let stored = self.load_row(kind).await;
        let now = Utc::now();
        if !request.force
            && let Some(row) = stored.as_ref()
            && row.is_servable(&effective.fingerprint, now)
        {
            debug!(kind = %kind, "hero pool built by concurrent request");
            return Ok(Self::served_from_cache(row.payload.clone()));
        }

        let prior_history =
            stored.as_ref().map(|row| row.history.clone()).unwrap_or_default();
        let cancel = request.cancel.unwrap_or_default();

        let built = if effective.policy.pool_size(kind) == 0 {
            self.empty_build(kind, &effective, prior_history, now)
        } else {
            let records = match self.catalog.list_all_media_records().await {
                Ok(records) => records,
                Err(err) => {
                    return self.stale_or_error(kind, &effective, stored, now, err);
                }
            };
            self.build(kind, &effective, records, prior_history, &cancel, now)
                .await
        };

        if built.cancelled {
            warn!(kind = %kind, "hero pool build cancelled; serving local data without caching");
            return Ok(built.payload);
        }

        self.persist(kind, &effective, &built, now).await;

        info!(
            kind = %kind,
            items = built.payload.items.len(),
            new = built.payload.slots.new,
            top_rated = built.payload.slots.top_rated,
            old_but_gold = built.payload.slots.old_but_gold,
            random = built.payload.slots.random,
            enriched = built.payload.meta.enrichment.enriched,
            "hero pool rebuilt"
        );

        Ok(built.payload)
    }

    async fn load_row(&self, kind: MediaKind) -> Option<StoredHeroPool> {
        match self.store.load(kind).await {
            Ok(row) => row,
            Err(err) => {
                warn!(kind = %kind, error = %err, "hero pool cache read failed; rebuilding");
                None
            }
        }
    }

    async fn cached_payload(
        &self,
        kind: MediaKind,
        effective: &EffectivePolicy,
    ) -> Option<HeroPoolPayload> {
        let row = self.load_row(kind).await?;
        if row.is_servable(&effective.fingerprint, Utc::now()) {
            debug!(kind = %kind, "hero pool cache hit");
            return Some(Self::served_from_cache(row.payload));
        }
        debug!(
            kind = %kind,
            expired = row.expires_at <= Utc::now(),
            fingerprint_changed = row.policy_fingerprint != effective.fingerprint,
            "hero pool cache miss"
        );
        None
    }

    fn served_from_cache(mut payload: HeroPoolPayload) -> HeroPoolPayload {
        payload.from_cache = true;
        payload
    }

    fn stale_or_error(
        &self,
        kind: MediaKind,
        effective: &EffectivePolicy,
        stored: Option<StoredHeroPool>,
        now: DateTime<Utc>,
        err: crate::error::HeroError,
    ) -> Result<HeroPoolPayload> {
        let grace = effective.policy.cache.grace();
        match stored {
            Some(row)
                if row.policy_fingerprint == effective.fingerprint
                    && row.expires_at + grace > now =>
            {
                warn!(kind = %kind, error = %err, "catalog unavailable; serving stale hero pool");
                let mut payload = Self::served_from_cache(row.payload);
                payload.meta.stale = true;
                Ok(payload)
            }
            _ => Err(err),
        }
    }

    fn empty_build(
        &self,
        kind: MediaKind,
        effective: &EffectivePolicy,
        prior_history: Vec<HistoryEntry>,
        now: DateTime<Utc>,
    ) -> BuildResult {
        let history = self.history.snapshot(&prior_history, now);
        let meta = PoolMeta {
            policy_version: effective.policy.version,
            history_size: history.len(),
            enrichment: EnrichmentMeta {
                provider_enabled: self.provider.read().is_enabled(),
                ..EnrichmentMeta::default()
            },
            ..PoolMeta::default()
        };
        BuildResult {
            payload: HeroPoolPayload::empty(
                kind,
                effective.fingerprint.clone(),
                now,
                now + effective.policy.cache.ttl(),
                meta,
            ),
            history,
            cancelled: false,
        }
    }

    async fn build(
        &self,
        kind: MediaKind,
        effective: &EffectivePolicy,
        records: Vec<CatalogRecord>,
        prior_history: Vec<HistoryEntry>,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> BuildResult {
        let policy = &effective.policy;
        let pool_size = policy.pool_size(kind);

        let candidates = prepare_candidates(
            records.into_iter().filter(|record| record.kind == kind),
            now,
        );
        let plan = plan_slots(pool_size, &policy.slots);
        let caps = DiversityCaps::for_pool(pool_size, &policy.diversity);
        let snapshot = self.history.snapshot(&prior_history, now);
        let suppressed = if policy.diversity.anti_repeat > 0.0 {
            history_ids(&snapshot)
        } else {
            Default::default()
        };

        let outcome = select_pool(
            &candidates,
            &plan,
            caps,
            &suppressed,
            &mut RandomShuffle::from_os_rng(),
        );
        debug!(
            kind = %kind,
            candidates = candidates.len(),
            genre_cap = caps.genre,
            year_cap = caps.year,
            topped_up = outcome.topped_up,
            "hero selection complete"
        );

        let selected_ids: Vec<String> =
            outcome.ids().map(str::to_string).collect();
        let thumbnails = match self
            .catalog
            .list_thumbnails_by_media_ids(&selected_ids)
            .await
        {
            Ok(map) => map,
            Err(err) => {
                warn!(kind = %kind, error = %err, "thumbnail lookup failed");
                HashMap::new()
            }
        };

        let provider = self.provider();
        let enrichment = enrich_selection(
            provider.as_ref(),
            kind,
            &outcome.selected,
            &policy.language,
            cancel,
        )
        .await;

        let items = outcome
            .selected
            .iter()
            .map(|entry| {
                build_item(
                    kind,
                    entry,
                    enrichment.details.get(&entry.candidate.id),
                    thumbnails
                        .get(&entry.candidate.id)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]),
                    &self.artwork,
                )
            })
            .collect();

        let history = self.history.update(
            &snapshot,
            outcome.ids(),
            now,
        );

        let cancelled = enrichment.meta.cancelled;
        let payload = HeroPoolPayload {
            kind,
            items,
            generated_at: now,
            expires_at: now + policy.cache.ttl(),
            policy_fingerprint: effective.fingerprint.clone(),
            slots: outcome.slots,
            from_cache: false,
            meta: PoolMeta {
                policy_version: policy.version,
                plan,
                candidate_count: candidates.len(),
                history_size: snapshot.len(),
                enrichment: enrichment.meta,
                stale: false,
            },
        };

        BuildResult {
            payload,
            history,
            cancelled,
        }
    }

    async fn persist(
        &self,
        kind: MediaKind,
        effective: &EffectivePolicy,
        built: &BuildResult,
        now: DateTime<Utc>,
    ) {
        let row = StoredHeroPool {
            kind,
            policy_fingerprint: effective.fingerprint.clone(),
            payload: built.payload.clone(),
            history: built.history.clone(),
            expires_at: built.payload.expires_at,
            updated_at: now,
        };
        if let Err(err) = self.store.upsert(&row).await {
            warn!(kind = %kind, error = %err, "failed to persist hero pool");
        }
    }
}
