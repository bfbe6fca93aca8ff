use std::collections::{HashMap, HashSet};

use chrono::Utc;
use marquee_model::{EnrichmentMeta, MediaKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::selection::SelectedCandidate;
use crate::policy::LanguagePolicy;
use crate::ports::{
    CatalogRecord, ExternalRef, MetadataProvider, ProviderDetails,
    ProviderError,
};

/// How a candidate can be looked up at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderLookup {
    Native(String),
    External(ExternalRef),
}

impl ProviderLookup {
    pub fn for_record(record: &CatalogRecord) -> Option<Self> {
        let ids = &record.provider_ids;
        let present =
            |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        present(&ids.tmdb)
            .map(ProviderLookup::Native)
            .or_else(|| {
                present(&ids.imdb)
                    .map(|id| ProviderLookup::External(ExternalRef::Imdb(id)))
            })
            .or_else(|| {
                present(&ids.tvdb)
                    .map(|id| ProviderLookup::External(ExternalRef::Tvdb(id)))
            })
    }
}

/// Details per candidate id plus the batch summary.
#[derive(Debug, Default)]
pub struct EnrichmentBatch {
    pub details: HashMap<String, ProviderDetails>,
    pub meta: EnrichmentMeta,
}

/// Combine a preferred-language result with a fallback-language one.
///
/// Descriptive fields come from the first result that exists. Backdrops are
/// the order-preserving union, preferred language first; the poster falls
/// back only when the preferred result has none.
pub fn merge_details(
    primary: Option<ProviderDetails>,
    fallback: Option<ProviderDetails>,
) -> Option<ProviderDetails> {
    match (primary, fallback) {
        (None, None) => None,
        (Some(primary), None) => Some(primary),
        (None, Some(fallback)) => Some(fallback),
        (Some(mut primary), Some(fallback)) => {
            let mut seen: HashSet<String> =
                primary.backdrops.iter().cloned().collect();
            for url in fallback.backdrops {
                if seen.insert(url.clone()) {
                    primary.backdrops.push(url);
                }
            }
            if primary.poster.as_deref().is_none_or(str::is_empty) {
                primary.poster = fallback.poster;
            }
            primary.tmdb_id = primary.tmdb_id.or(fallback.tmdb_id);
            primary.imdb_id = primary.imdb_id.or(fallback.imdb_id);
            primary.tvdb_id = primary.tvdb_id.or(fallback.tvdb_id);
            Some(primary)
        }
    }
}

enum Fetch {
    Done(Result<Option<ProviderDetails>, ProviderError>),
    Cancelled,
}

async fn fetch_one(
    provider: &dyn MetadataProvider,
    kind: MediaKind,
    lookup: &ProviderLookup,
    language: &str,
    cancel: &CancellationToken,
) -> Fetch {
    let request = async {
        match lookup {
            ProviderLookup::Native(id) => {
                provider.fetch_details_by_id(kind, id, language).await
            }
            ProviderLookup::External(external) => {
                provider
                    .fetch_details_by_external_id(kind, external, language)
                    .await
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Fetch::Cancelled,
        result = request => Fetch::Done(result),
    }
}

/// Enrich each selected candidate, one provider call sequence at a time.
///
/// Failures only affect the candidate they happen on; the item is then
/// served from local data. Rate limiting is reported once in the batch
/// meta.
///
/// Cancellation stops the batch without further provider calls. Details
/// fetched before the signal are kept, so a cancelled build serves those
/// candidates enriched and only the rest from local data.
pub async fn enrich_selection(
    provider: &dyn MetadataProvider,
    kind: MediaKind,
    selected: &[SelectedCandidate],
    languages: &LanguagePolicy,
    cancel: &CancellationToken,
) -> EnrichmentBatch {
    let mut batch = EnrichmentBatch::default();
    batch.meta.provider_enabled = provider.is_enabled();
    if !batch.meta.provider_enabled {
        return batch;
    }

    let preferred = languages.preferred.trim();
    let secondary = languages.secondary();

    for entry in selected {
        if cancel.is_cancelled() {
            batch.meta.cancelled = true;
            break;
        }

        let candidate = &entry.candidate;
        let Some(lookup) = ProviderLookup::for_record(&candidate.record) else {
            continue;
        };

        batch.meta.attempted += 1;
        if provider.rate_limit_state().is_active_at(Utc::now()) {
            batch.meta.rate_limited = true;
            debug!(id = %candidate.id, "provider backing off; keeping local data");
            continue;
        }

        let primary =
            match fetch_one(provider, kind, &lookup, preferred, cancel).await {
                Fetch::Cancelled => {
                    batch.meta.cancelled = true;
                    break;
                }
                Fetch::Done(Ok(details)) => details,
                Fetch::Done(Err(err)) => {
                    note_failure(&mut batch.meta, &candidate.id, &err);
                    continue;
                }
            };

        let needs_fallback = primary
            .as_ref()
            .map(|details| details.backdrops.is_empty())
            .unwrap_or(true);

        let fallback = match secondary.filter(|_| needs_fallback) {
            Some(language) => {
                match fetch_one(provider, kind, &lookup, language, cancel).await
                {
                    Fetch::Cancelled => {
                        batch.meta.cancelled = true;
                        if let Some(details) = primary {
                            batch.details.insert(candidate.id.clone(), details);
                            batch.meta.enriched += 1;
                        }
                        break;
                    }
                    Fetch::Done(Ok(details)) => details,
                    Fetch::Done(Err(err)) => {
                        note_failure(&mut batch.meta, &candidate.id, &err);
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(details) = merge_details(primary, fallback) {
            batch.details.insert(candidate.id.clone(), details);
            batch.meta.enriched += 1;
        }
    }

    if batch.meta.rate_limited {
        let state = provider.rate_limit_state();
        warn!(
            kind = %kind,
            strikes = state.strikes,
            until = ?state.until,
            "metadata provider rate limit hit during hero enrichment"
        );
        batch.meta.rate_limit = Some(state);
    }

    batch
}

fn note_failure(meta: &mut EnrichmentMeta, id: &str, err: &ProviderError) {
    if err.is_rate_limit() {
        meta.rate_limited = true;
    } else {
        warn!(id = %id, error = %err, "hero enrichment failed; keeping local data");
    }
}
