use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{HeroPoolPayload, HistoryEntry, MediaKind};

use crate::error::Result;

/// The single persisted row per pool kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHeroPool {
    pub kind: MediaKind,
    pub policy_fingerprint: String,
    pub payload: HeroPoolPayload,
    pub history: Vec<HistoryEntry>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredHeroPool {
    /// Whether the row can be served as-is for `fingerprint` at `now`.
    pub fn is_servable(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.expires_at > now && self.policy_fingerprint == fingerprint
    }
}

/// Repository port for hero pool rows, keyed by kind.
#[async_trait]
pub trait HeroPoolStore: Send + Sync {
    async fn load(&self, kind: MediaKind) -> Result<Option<StoredHeroPool>>;

    /// Insert or replace the row for `row.kind`.
    async fn upsert(&self, row: &StoredHeroPool) -> Result<()>;
}
