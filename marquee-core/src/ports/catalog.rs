use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::MediaKind;

use crate::error::Result;

/// External identifiers a catalog record may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderIds {
    pub tmdb: Option<String>,
    pub imdb: Option<String>,
    pub tvdb: Option<String>,
}

/// One row of the locally mirrored media catalog.
///
/// Dates and years are kept as the raw text the upstream server reported;
/// the candidate preparer is responsible for interpreting them.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub year: Option<String>,
    pub premiere_date: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub community_rating: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u32>,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub certification: Option<String>,
    pub poster: Option<String>,
    pub backdrop: Option<String>,
    pub provider_ids: ProviderIds,
}

impl CatalogRecord {
    /// A record with only identity fields populated.
    pub fn new(
        id: impl Into<String>,
        kind: MediaKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            tagline: None,
            overview: None,
            added_at: None,
            year: None,
            premiere_date: None,
            release_date: None,
            first_air_date: None,
            community_rating: None,
            vote_average: None,
            vote_count: None,
            genres: Vec::new(),
            runtime_minutes: None,
            certification: None,
            poster: None,
            backdrop: None,
            provider_ids: ProviderIds::default(),
        }
    }

    /// Raw date-like fields in the order the year parser consults them.
    pub fn date_fields(&self) -> [Option<&str>; 4] {
        [
            self.year.as_deref(),
            self.premiere_date.as_deref(),
            self.release_date.as_deref(),
            self.first_air_date.as_deref(),
        ]
    }
}

/// Read model over the mirrored catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn list_all_media_records(&self) -> Result<Vec<CatalogRecord>>;

    /// Cached thumbnail paths per media id, in display order.
    async fn list_thumbnails_by_media_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;
}
