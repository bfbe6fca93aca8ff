use std::{collections::HashSet, fmt, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use marquee_model::{MediaKind, RateLimitState};
use parking_lot::Mutex;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::ports::{
    ExternalRef, MetadataProvider, ProviderDetails, ProviderError,
};

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const TMDB_V3_BASE: &str = "https://api.themoviedb.org/3";

const BACKDROP_SIZE: &str = "w1280";
const POSTER_SIZE: &str = "w780";
const MAX_BACKDROPS: usize = 8;
const MAX_BACKOFF_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub enabled: bool,
    pub base_url: String,
    pub image_base: String,
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            enabled: true,
            base_url: TMDB_V3_BASE.to_string(),
            image_base: TMDB_IMAGE_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// TMDB v3 client tracking its own rate-limit backoff.
pub struct TmdbProvider {
    http: reqwest::Client,
    config: TmdbConfig,
    rate_limit: Mutex<RateLimitState>,
}

impl fmt::Debug for TmdbProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbProvider")
            .field("base_url", &self.config.base_url)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TmdbProvider {
    pub fn new(config: TmdbConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            rate_limit: Mutex::new(RateLimitState::default()),
        })
    }

    async fn get_tmdb_json<T>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        self.ensure_not_backing_off()?;

        let response = self
            .http
            .get(url)
            .query(&[("api_key", self.config.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            self.record_success();
            return response.json::<T>().await.map_err(|err| {
                if err.is_decode() {
                    ProviderError::ParseError(err.to_string())
                } else {
                    ProviderError::NetworkError(err)
                }
            });
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let wait = self.record_rate_limit(retry_after);
            return Err(ProviderError::RateLimited {
                retry_after: Some(wait),
            });
        }

        #[derive(Debug, Deserialize)]
        struct TmdbErrorBody {
            #[serde(default)]
            status_message: Option<String>,
        }

        let message = response
            .json::<TmdbErrorBody>()
            .await
            .ok()
            .and_then(|body| body.status_message)
            .unwrap_or_else(|| {
                format!("TMDB request failed with status {}", status)
            });

        match status.as_u16() {
            401 => Err(ProviderError::InvalidApiKey),
            404 => Err(ProviderError::NotFound),
            _ => Err(ProviderError::ApiError(message)),
        }
    }

    fn ensure_not_backing_off(&self) -> Result<(), ProviderError> {
        let mut state = self.rate_limit.lock();
        let now = Utc::now();
        if state.is_active_at(now) {
            let remaining = state
                .until
                .and_then(|until| (until - now).to_std().ok());
            return Err(ProviderError::RateLimited {
                retry_after: remaining,
            });
        }
        state.active = false;
        Ok(())
    }

    fn record_success(&self) {
        let mut state = self.rate_limit.lock();
        if state.strikes > 0 {
            debug!(strikes = state.strikes, "TMDB rate limit cleared");
        }
        *state = RateLimitState::default();
    }

    fn record_rate_limit(&self, retry_after: Option<Duration>) -> Duration {
        let mut state = self.rate_limit.lock();
        state.strikes = state.strikes.saturating_add(1);
        let wait = backoff_for(state.strikes, retry_after);
        state.active = true;
        state.until = chrono::Duration::from_std(wait)
            .ok()
            .map(|wait| Utc::now() + wait);
        state.retry_after_ms = Some(wait.as_millis() as u64);
        warn!(
            strikes = state.strikes,
            wait_ms = wait.as_millis() as u64,
            "TMDB rate limit hit"
        );
        wait
    }

    fn image_url(&self, size: &str, path: Option<&str>) -> Option<String> {
        let path = path.map(str::trim).filter(|p| p.starts_with('/'))?;
        Some(format!("{}/{}{}", self.config.image_base, size, path))
    }

    fn backdrop_urls(
        &self,
        primary: Option<&str>,
        images: &TmdbImages,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        primary
            .into_iter()
            .chain(images.backdrops.iter().map(|image| image.file_path.as_str()))
            .filter_map(|path| self.image_url(BACKDROP_SIZE, Some(path)))
            .filter(|url| seen.insert(url.clone()))
            .take(MAX_BACKDROPS)
            .collect()
    }

    fn details_query<'a>(
        language: &'a str,
        append: &'a str,
        image_languages: &'a str,
    ) -> [(&'static str, &'a str); 3] {
        [
            ("language", language),
            ("append_to_response", append),
            ("include_image_language", image_languages),
        ]
    }

    fn map_movie(
        &self,
        movie: MovieDetailsResponse,
        language: &str,
    ) -> ProviderDetails {
        let region = region_for(language);
        let certification = pick_region(&movie.release_dates.results, &region, |c| {
            c.release_dates
                .iter()
                .map(|d| d.certification.trim())
                .find(|c| !c.is_empty())
                .map(str::to_string)
        });

        ProviderDetails {
            language: language.to_string(),
            tmdb_id: Some(movie.id.to_string()),
            imdb_id: movie
                .imdb_id
                .or(movie.external_ids.imdb_id)
                .filter(|id| !id.is_empty()),
            tvdb_id: movie.external_ids.tvdb_id.map(|id| id.to_string()),
            title: movie.title,
            tagline: movie.tagline.filter(|t| !t.is_empty()),
            overview: movie.overview.filter(|o| !o.is_empty()),
            year: year_of(movie.release_date.as_deref()),
            runtime_minutes: movie.runtime.filter(|r| *r > 0),
            genres: movie.genres.into_iter().map(|g| g.name).collect(),
            certification,
            rating: movie.vote_average,
            vote_count: movie.vote_count,
            backdrops: self
                .backdrop_urls(movie.backdrop_path.as_deref(), &movie.images),
            poster: self.image_url(POSTER_SIZE, movie.poster_path.as_deref()),
        }
    }

    fn map_series(
        &self,
        series: TvDetailsResponse,
        language: &str,
    ) -> ProviderDetails {
        let region = region_for(language);
        let certification =
            pick_region(&series.content_ratings.results, &region, |c| {
                Some(c.rating.trim().to_string()).filter(|r| !r.is_empty())
            });

        ProviderDetails {
            language: language.to_string(),
            tmdb_id: Some(series.id.to_string()),
            imdb_id: series.external_ids.imdb_id.filter(|id| !id.is_empty()),
            tvdb_id: series.external_ids.tvdb_id.map(|id| id.to_string()),
            title: series.name,
            tagline: series.tagline.filter(|t| !t.is_empty()),
            overview: series.overview.filter(|o| !o.is_empty()),
            year: year_of(series.first_air_date.as_deref()),
            runtime_minutes: series
                .episode_run_time
                .into_iter()
                .find(|minutes| *minutes > 0),
            genres: series.genres.into_iter().map(|g| g.name).collect(),
            certification,
            rating: series.vote_average,
            vote_count: series.vote_count,
            backdrops: self
                .backdrop_urls(series.backdrop_path.as_deref(), &series.images),
            poster: self.image_url(POSTER_SIZE, series.poster_path.as_deref()),
        }
    }
}

/// Wait before the next call after `strikes` consecutive 429s.
fn backoff_for(strikes: u32, retry_after: Option<Duration>) -> Duration {
    let exponential =
        Duration::from_secs((1u64 << strikes.min(16)).min(MAX_BACKOFF_SECS));
    retry_after
        .map(|hint| hint.max(exponential))
        .unwrap_or(exponential)
}

/// `de-AT` -> `AT`; defaults to `US`.
fn region_for(language: &str) -> String {
    language
        .split(['-', '_'])
        .nth(1)
        .filter(|region| region.len() == 2)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "US".to_string())
}

fn image_languages(language: &str) -> String {
    let primary = language.split(['-', '_']).next().unwrap_or("en");
    format!("{},null", primary.to_ascii_lowercase())
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn pick_region<T: HasRegion>(
    entries: &[T],
    region: &str,
    value: impl Fn(&T) -> Option<String>,
) -> Option<String> {
    let lookup = |wanted: &str| {
        entries
            .iter()
            .filter(|entry| entry.region().eq_ignore_ascii_case(wanted))
            .find_map(&value)
    };
    lookup(region).or_else(|| lookup("US"))
}

trait HasRegion {
    fn region(&self) -> &str;
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.trim().is_empty()
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_details_by_id(
        &self,
        kind: MediaKind,
        tmdb_id: &str,
        language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError> {
        if !self.is_enabled() {
            return Err(ProviderError::Disabled);
        }

        let url = format!(
            "{}/{}/{}",
            self.config.base_url,
            kind.tmdb_segment(),
            tmdb_id.trim()
        );
        let image_languages = image_languages(language);

        let result = match kind {
            MediaKind::Movie => {
                let query = Self::details_query(
                    language,
                    "images,external_ids,release_dates",
                    &image_languages,
                );
                self.get_tmdb_json::<MovieDetailsResponse>(&url, &query)
                    .await
                    .map(|movie| self.map_movie(movie, language))
            }
            MediaKind::Series => {
                let query = Self::details_query(
                    language,
                    "images,external_ids,content_ratings",
                    &image_languages,
                );
                self.get_tmdb_json::<TvDetailsResponse>(&url, &query)
                    .await
                    .map(|series| self.map_series(series, language))
            }
        };

        match result {
            Ok(details) => Ok(Some(details)),
            Err(ProviderError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_details_by_external_id(
        &self,
        kind: MediaKind,
        external: &ExternalRef,
        language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError> {
        if !self.is_enabled() {
            return Err(ProviderError::Disabled);
        }

        let url =
            format!("{}/find/{}", self.config.base_url, external.value().trim());
        let found = match self
            .get_tmdb_json::<FindResponse>(
                &url,
                &[("external_source", external.source()), ("language", language)],
            )
            .await
        {
            Ok(found) => found,
            Err(ProviderError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        let Some(tmdb_id) = found.first_id(kind) else {
            debug!(external = ?external, "no TMDB match for external id");
            return Ok(None);
        };

        self.fetch_details_by_id(kind, &tmdb_id.to_string(), language)
            .await
    }

    fn rate_limit_state(&self) -> RateLimitState {
        let mut state = self.rate_limit.lock().clone();
        state.active = state.is_active_at(Utc::now());
        state
    }
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbImages {
    #[serde(default)]
    backdrops: Vec<TmdbImage>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResultsBlock<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

impl<T> Default for ResultsBlock<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MovieReleaseCountry {
    iso_3166_1: String,
    #[serde(default)]
    release_dates: Vec<MovieReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct MovieReleaseDate {
    #[serde(default)]
    certification: String,
}

impl HasRegion for MovieReleaseCountry {
    fn region(&self) -> &str {
        &self.iso_3166_1
    }
}

#[derive(Debug, Deserialize)]
struct TvContentRating {
    iso_3166_1: String,
    #[serde(default)]
    rating: String,
}

impl HasRegion for TvContentRating {
    fn region(&self) -> &str {
        &self.iso_3166_1
    }
}

#[derive(Debug, Deserialize)]
struct MovieDetailsResponse {
    id: u64,
    title: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    runtime: Option<u32>,
    release_date: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    vote_average: Option<f64>,
    vote_count: Option<u32>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    imdb_id: Option<String>,
    #[serde(default)]
    images: TmdbImages,
    #[serde(default)]
    external_ids: TmdbExternalIds,
    #[serde(default)]
    release_dates: ResultsBlock<MovieReleaseCountry>,
}

#[derive(Debug, Deserialize)]
struct TvDetailsResponse {
    id: u64,
    name: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    first_air_date: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    vote_average: Option<f64>,
    vote_count: Option<u32>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    images: TmdbImages,
    #[serde(default)]
    external_ids: TmdbExternalIds,
    #[serde(default)]
    content_ratings: ResultsBlock<TvContentRating>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

impl FindResponse {
    fn first_id(&self, kind: MediaKind) -> Option<u64> {
        match kind {
            MediaKind::Movie => self.movie_results.first(),
            MediaKind::Series => self.tv_results.first(),
        }
        .map(|result| result.id)
    }
}
