use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{HeroPoolPayload, HistoryEntry, MediaKind};
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::{HeroError, Result};
use crate::ports::{HeroPoolStore, StoredHeroPool};

#[derive(Debug, Clone)]
pub struct PostgresHeroPoolStore {
    pool: PgPool,
}

impl PostgresHeroPoolStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn decode_payload(value: Value) -> Result<HeroPoolPayload> {
        serde_json::from_value(value).map_err(|e| {
            HeroError::Storage(format!("Invalid hero pool payload: {e}"))
        })
    }

    fn decode_history(value: Value) -> Result<Vec<HistoryEntry>> {
        serde_json::from_value(value).map_err(|e| {
            HeroError::Storage(format!("Invalid hero pool history: {e}"))
        })
    }
}

#[async_trait]
impl HeroPoolStore for PostgresHeroPoolStore {
    async fn load(&self, kind: MediaKind) -> Result<Option<StoredHeroPool>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT policy_fingerprint, payload, history, expires_at, updated_at
            FROM hero_pools
            WHERE kind = $1
            "#,
        )
        .bind(kind.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            HeroError::Storage(format!("Failed to load {kind} hero pool: {e}"))
        })?
        else {
            return Ok(None);
        };

        let read = |column: &str, e: sqlx::Error| {
            HeroError::Storage(format!("Failed to read {column}: {e}"))
        };

        let policy_fingerprint: String = row
            .try_get("policy_fingerprint")
            .map_err(|e| read("policy_fingerprint", e))?;
        let payload: Value =
            row.try_get("payload").map_err(|e| read("payload", e))?;
        let history: Value =
            row.try_get("history").map_err(|e| read("history", e))?;
        let expires_at: DateTime<Utc> =
            row.try_get("expires_at").map_err(|e| read("expires_at", e))?;
        let updated_at: DateTime<Utc> =
            row.try_get("updated_at").map_err(|e| read("updated_at", e))?;

        Ok(Some(StoredHeroPool {
            kind,
            policy_fingerprint,
            payload: Self::decode_payload(payload)?,
            history: Self::decode_history(history)?,
            expires_at,
            updated_at,
        }))
    }

    async fn upsert(&self, row: &StoredHeroPool) -> Result<()> {
        let payload = serde_json::to_value(&row.payload)?;
        let history = serde_json::to_value(&row.history)?;

        sqlx::query(
            r#"
            INSERT INTO hero_pools
                (kind, policy_fingerprint, payload, history, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kind) DO UPDATE SET
                policy_fingerprint = EXCLUDED.policy_fingerprint,
                payload = EXCLUDED.payload,
                history = EXCLUDED.history,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.kind.as_str())
        .bind(&row.policy_fingerprint)
        .bind(payload)
        .bind(history)
        .bind(row.expires_at)
        .bind(row.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            HeroError::Storage(format!(
                "Failed to upsert {} hero pool: {e}",
                row.kind
            ))
        })?;

        Ok(())
    }
}
