use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Datelike, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ports::CatalogRecord;

/// Items added within this window count as new.
pub const NEW_WINDOW_DAYS: i64 = 90;

/// Minimum age in years for the old-but-gold slot.
pub const OLD_AGE_YEARS: i32 = 12;

pub const MAX_GENRES: usize = 3;

const MIN_YEAR: i32 = 1870;

static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Normalized, immutable view of one catalog record for a single build.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub record: Arc<CatalogRecord>,
    /// Milliseconds since the epoch, `0` when unknown.
    pub added_at_ms: i64,
    pub year: Option<i32>,
    /// 0 to 10, one decimal.
    pub rating: f64,
    pub vote_count: u32,
    pub genres: Vec<String>,
    pub is_new: bool,
    pub is_old: bool,
}

/// Convert catalog records into de-duplicated candidates.
///
/// The first record seen for an id wins; records without an id are dropped.
pub fn prepare_candidates(
    records: impl IntoIterator<Item = CatalogRecord>,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| !record.id.trim().is_empty())
        .filter(|record| seen.insert(record.id.clone()))
        .map(|record| build_candidate(record, now))
        .collect()
}

fn build_candidate(record: CatalogRecord, now: DateTime<Utc>) -> Candidate {
    let current_year = now.year();
    let year = parse_year(record.date_fields(), current_year);
    let added_at_ms = record
        .added_at
        .map(|added| added.timestamp_millis())
        .unwrap_or(0);
    let is_new = record
        .added_at
        .map(|added| now - added <= Duration::days(NEW_WINDOW_DAYS))
        .unwrap_or(false);
    let is_old = year
        .map(|year| current_year - year >= OLD_AGE_YEARS)
        .unwrap_or(false);

    Candidate {
        id: record.id.clone(),
        added_at_ms,
        year,
        rating: normalize_rating(record.community_rating, record.vote_average),
        vote_count: record.vote_count.unwrap_or(0),
        genres: dedupe_genres(&record.genres),
        is_new,
        is_old,
        record: Arc::new(record),
    }
}

/// First plausible four-digit year across the given fields.
pub fn parse_year<'a>(
    fields: impl IntoIterator<Item = Option<&'a str>>,
    current_year: i32,
) -> Option<i32> {
    fields.into_iter().flatten().find_map(|raw| {
        DIGIT_RUN
            .find_iter(raw)
            .map(|run| run.as_str())
            .filter(|run| run.len() == 4)
            .filter_map(|run| run.parse::<i32>().ok())
            .find(|year| (MIN_YEAR..=current_year + 1).contains(year))
    })
}

pub fn normalize_rating(primary: Option<f64>, secondary: Option<f64>) -> f64 {
    let Some(raw) = primary
        .filter(|value| value.is_finite())
        .or(secondary.filter(|value| value.is_finite()))
    else {
        return 0.0;
    };
    ((raw * 10.0).round() / 10.0).clamp(0.0, 10.0)
}

fn dedupe_genres(genres: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_GENRES);
    for genre in genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
        if out.len() == MAX_GENRES {
            break;
        }
        if !out.iter().any(|existing| existing == genre) {
            out.push(genre.to_string());
        }
    }
    out
}
