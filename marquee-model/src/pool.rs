use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{MediaKind, RateLimitState, SlotCounts};
use crate::slot::HeroSlot;

/// Where the descriptive fields of a hero item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ItemSource {
    /// Enriched from TMDB
    Tmdb,
    /// Local catalog data only
    Local,
}

/// Identifiers known for a hero item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExternalIds {
    /// Catalog-native identifier
    pub catalog: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub imdb: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub tmdb: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub tvdb: Option<String>,
}

/// Clickable target rendered on the banner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CallToAction {
    pub kind: MediaKind,
    pub target_id: String,
    pub label: String,
}

/// Public, enriched representation of one selected item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct HeroPoolItem {
    pub id: String,
    pub slot: HeroSlot,
    pub kind: MediaKind,
    pub title: String,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub rating: f64,
    pub vote_count: u32,
    pub genres: Vec<String>,
    pub certification: Option<String>,
    pub backdrops: Vec<String>,
    pub poster: Option<String>,
    pub cta: CallToAction,
    pub ids: ExternalIds,
    pub source: ItemSource,
}

/// Outcome of the enrichment step for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EnrichmentMeta {
    pub provider_enabled: bool,
    pub attempted: usize,
    pub enriched: usize,
    /// Set once if any fetch in the batch hit the provider's rate limit.
    pub rate_limited: bool,
    pub rate_limit: Option<RateLimitState>,
    pub cancelled: bool,
}

/// Diagnostic block attached to every payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PoolMeta {
    pub policy_version: u32,
    /// Slot allocation the selection ran against.
    pub plan: SlotCounts,
    pub candidate_count: usize,
    pub history_size: usize,
    pub enrichment: EnrichmentMeta,
    /// Served from an expired row because the catalog was unavailable.
    pub stale: bool,
}

/// The persisted and served unit for one media kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct HeroPoolPayload {
    pub kind: MediaKind,
    pub items: Vec<HeroPoolItem>,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub policy_fingerprint: String,
    pub slots: SlotCounts,
    pub from_cache: bool,
    pub meta: PoolMeta,
}

impl HeroPoolPayload {
    /// A valid payload with no items.
    pub fn empty(
        kind: MediaKind,
        policy_fingerprint: impl Into<String>,
        generated_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        meta: PoolMeta,
    ) -> Self {
        Self {
            kind,
            items: Vec::new(),
            generated_at,
            expires_at,
            policy_fingerprint: policy_fingerprint.into(),
            slots: SlotCounts::default(),
            from_cache: false,
            meta,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
