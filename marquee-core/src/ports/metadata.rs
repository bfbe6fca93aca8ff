use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use marquee_model::{MediaKind, RateLimitState};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Provider disabled")]
    Disabled,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// A non-native identifier the provider can resolve to its own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalRef {
    Imdb(String),
    Tvdb(String),
}

impl ExternalRef {
    /// Source name understood by TMDB's `/find` endpoint.
    pub fn source(&self) -> &'static str {
        match self {
            ExternalRef::Imdb(_) => "imdb_id",
            ExternalRef::Tvdb(_) => "tvdb_id",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ExternalRef::Imdb(value) | ExternalRef::Tvdb(value) => value,
        }
    }
}

/// Detail record returned by the metadata provider for one language.
///
/// Image fields hold absolute URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderDetails {
    pub language: String,
    pub tmdb_id: Option<String>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub title: Option<String>,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub certification: Option<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<u32>,
    pub backdrops: Vec<String>,
    pub poster: Option<String>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync + fmt::Debug {
    fn is_enabled(&self) -> bool;

    async fn fetch_details_by_id(
        &self,
        kind: MediaKind,
        tmdb_id: &str,
        language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError>;

    async fn fetch_details_by_external_id(
        &self,
        kind: MediaKind,
        external: &ExternalRef,
        language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError>;

    fn rate_limit_state(&self) -> RateLimitState;
}
