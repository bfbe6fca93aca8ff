use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::MediaKind;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::error::{HeroError, Result};
use crate::ports::{CatalogReader, CatalogRecord, ProviderIds};

/// Reads the mirrored catalog from `catalog_items` and `catalog_thumbnails`.
#[derive(Debug, Clone)]
pub struct PostgresCatalogReader {
    pool: PgPool,
}

impl PostgresCatalogReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Option<CatalogRecord>> {
        let get_err = |e: sqlx::Error| {
            HeroError::Catalog(format!("Failed to read catalog row: {e}"))
        };

        let kind_raw: String = row.try_get("kind").map_err(get_err)?;
        let Ok(kind) = kind_raw.parse::<MediaKind>() else {
            warn!(kind = %kind_raw, "skipping catalog row with unknown kind");
            return Ok(None);
        };

        let vote_count: Option<i32> =
            row.try_get("vote_count").map_err(get_err)?;
        let runtime: Option<i32> =
            row.try_get("runtime_minutes").map_err(get_err)?;
        let added_at: Option<DateTime<Utc>> =
            row.try_get("added_at").map_err(get_err)?;

        Ok(Some(CatalogRecord {
            id: row.try_get("id").map_err(get_err)?,
            kind,
            title: row.try_get("title").map_err(get_err)?,
            tagline: row.try_get("tagline").map_err(get_err)?,
            overview: row.try_get("overview").map_err(get_err)?,
            added_at,
            year: row.try_get("year").map_err(get_err)?,
            premiere_date: row.try_get("premiere_date").map_err(get_err)?,
            release_date: row.try_get("release_date").map_err(get_err)?,
            first_air_date: row.try_get("first_air_date").map_err(get_err)?,
            community_rating: row
                .try_get("community_rating")
                .map_err(get_err)?,
            vote_average: row.try_get("vote_average").map_err(get_err)?,
            vote_count: vote_count.and_then(|v| u32::try_from(v).ok()),
            genres: row.try_get("genres").map_err(get_err)?,
            runtime_minutes: runtime.and_then(|v| u32::try_from(v).ok()),
            certification: row.try_get("certification").map_err(get_err)?,
            poster: row.try_get("poster").map_err(get_err)?,
            backdrop: row.try_get("backdrop").map_err(get_err)?,
            provider_ids: ProviderIds {
                tmdb: row.try_get("tmdb_id").map_err(get_err)?,
                imdb: row.try_get("imdb_id").map_err(get_err)?,
                tvdb: row.try_get("tvdb_id").map_err(get_err)?,
            },
        }))
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalogReader {
    async fn list_all_media_records(&self) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, kind, title, tagline, overview, added_at,
                year, premiere_date, release_date, first_air_date,
                community_rating, vote_average, vote_count, genres,
                runtime_minutes, certification, poster, backdrop,
                tmdb_id, imdb_id, tvdb_id
            FROM catalog_items
            ORDER BY added_at DESC NULLS LAST, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            HeroError::Catalog(format!("Failed to list catalog items: {e}"))
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = Self::map_row(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn list_thumbnails_by_media_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT media_id, path
            FROM catalog_thumbnails
            WHERE media_id = ANY($1)
            ORDER BY media_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            HeroError::Catalog(format!("Failed to list thumbnails: {e}"))
        })?;

        let mut thumbnails: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let media_id: String = row.try_get("media_id").map_err(|e| {
                HeroError::Catalog(format!("Failed to read media_id: {e}"))
            })?;
            let path: String = row.try_get("path").map_err(|e| {
                HeroError::Catalog(format!("Failed to read path: {e}"))
            })?;
            thumbnails.entry(media_id).or_default().push(path);
        }
        Ok(thumbnails)
    }
}
