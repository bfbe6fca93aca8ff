use marquee_model::{
    CallToAction, ExternalIds, HeroPoolItem, ItemSource, MediaKind,
};
use uuid::Uuid;

use super::artwork::ArtworkResolver;
use super::candidate::{MAX_GENRES, normalize_rating};
use super::selection::SelectedCandidate;
use crate::ports::{CatalogRecord, ProviderDetails};

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Identifier the banner's call to action points at.
///
/// Catalog id, then imdb, tmdb and tvdb ids; a random id as a last resort
/// so the UI always has a target.
pub fn resolve_cta_target(
    record: &CatalogRecord,
    details: Option<&ProviderDetails>,
) -> String {
    let ids = &record.provider_ids;
    non_empty(Some(&record.id))
        .or_else(|| non_empty(ids.imdb.as_deref()))
        .or_else(|| non_empty(details.and_then(|d| d.imdb_id.as_deref())))
        .or_else(|| non_empty(ids.tmdb.as_deref()))
        .or_else(|| non_empty(details.and_then(|d| d.tmdb_id.as_deref())))
        .or_else(|| non_empty(ids.tvdb.as_deref()))
        .or_else(|| non_empty(details.and_then(|d| d.tvdb_id.as_deref())))
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn cta_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "Watch now",
        MediaKind::Series => "Start watching",
    }
}

fn merge_genres(provider: &[String], local: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_GENRES);
    for genre in provider.iter().chain(local).map(|g| g.trim()) {
        if out.len() == MAX_GENRES {
            break;
        }
        if !genre.is_empty() && !out.iter().any(|g| g == genre) {
            out.push(genre.to_string());
        }
    }
    out
}

/// Assemble the public item for one selection.
pub fn build_item(
    kind: MediaKind,
    entry: &SelectedCandidate,
    details: Option<&ProviderDetails>,
    thumbnails: &[String],
    artwork: &ArtworkResolver,
) -> HeroPoolItem {
    let candidate = &entry.candidate;
    let record = candidate.record.as_ref();
    let local_ids = &record.provider_ids;

    let rating = if candidate.rating > 0.0 {
        candidate.rating
    } else {
        details
            .and_then(|d| d.rating)
            .map(|r| normalize_rating(Some(r), None))
            .unwrap_or(0.0)
    };
    let vote_count = if candidate.vote_count > 0 {
        candidate.vote_count
    } else {
        details.and_then(|d| d.vote_count).unwrap_or(0)
    };

    let provider_backdrops = details.map(|d| d.backdrops.as_slice()).unwrap_or(&[]);
    let provider_genres = details.map(|d| d.genres.as_slice()).unwrap_or(&[]);

    let ids = ExternalIds {
        catalog: record.id.clone(),
        imdb: non_empty(local_ids.imdb.as_deref())
            .or_else(|| non_empty(details.and_then(|d| d.imdb_id.as_deref()))),
        tmdb: non_empty(local_ids.tmdb.as_deref())
            .or_else(|| non_empty(details.and_then(|d| d.tmdb_id.as_deref()))),
        tvdb: non_empty(local_ids.tvdb.as_deref())
            .or_else(|| non_empty(details.and_then(|d| d.tvdb_id.as_deref()))),
    };

    HeroPoolItem {
        id: candidate.id.clone(),
        slot: entry.slot,
        kind,
        title: non_empty(details.and_then(|d| d.title.as_deref()))
            .unwrap_or_else(|| record.title.clone()),
        tagline: non_empty(details.and_then(|d| d.tagline.as_deref()))
            .or_else(|| non_empty(record.tagline.as_deref())),
        overview: non_empty(details.and_then(|d| d.overview.as_deref()))
            .or_else(|| non_empty(record.overview.as_deref())),
        year: candidate.year.or(details.and_then(|d| d.year)),
        runtime_minutes: details
            .and_then(|d| d.runtime_minutes)
            .or(record.runtime_minutes),
        rating,
        vote_count,
        genres: merge_genres(provider_genres, &candidate.genres),
        certification: non_empty(details.and_then(|d| d.certification.as_deref()))
            .or_else(|| non_empty(record.certification.as_deref())),
        backdrops: artwork.resolve_backdrops(
            provider_backdrops,
            thumbnails,
            record,
        ),
        poster: artwork.resolve_poster(
            details.and_then(|d| d.poster.as_deref()),
            thumbnails,
            record,
        ),
        cta: CallToAction {
            kind,
            target_id: resolve_cta_target(record, details),
            label: cta_label(kind).to_string(),
        },
        ids,
        source: if details.is_some() {
            ItemSource::Tmdb
        } else {
            ItemSource::Local
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hero::candidate::prepare_candidates;
    use chrono::Utc;
    use marquee_model::HeroSlot;

    fn selected(record: CatalogRecord) -> SelectedCandidate {
        let candidate = prepare_candidates(vec![record], Utc::now())
            .pop()
            .expect("candidate");
        SelectedCandidate {
            candidate,
            slot: HeroSlot::TopRated,
        }
    }

    #[test]
    fn local_only_item_keeps_catalog_fields() {
        let mut record = CatalogRecord::new("m1", MediaKind::Movie, "Heat");
        record.overview = Some("LA crime saga".into());
        record.community_rating = Some(8.3);
        record.genres = vec!["Crime".into(), "Drama".into()];
        record.poster = Some("/posters/heat.jpg".into());
        record.provider_ids.imdb = Some("tt0113277".into());

        let item = build_item(
            MediaKind::Movie,
            &selected(record),
            None,
            &[],
            &ArtworkResolver::default(),
        );

        assert_eq!(item.source, ItemSource::Local);
        assert_eq!(item.title, "Heat");
        assert_eq!(item.rating, 8.3);
        assert_eq!(item.genres, vec!["Crime", "Drama"]);
        assert_eq!(item.backdrops, vec!["/posters/heat.jpg"]);
        assert_eq!(item.poster.as_deref(), Some("/posters/heat.jpg"));
        assert_eq!(item.cta.target_id, "m1");
        assert_eq!(item.cta.label, "Watch now");
        assert_eq!(item.ids.imdb.as_deref(), Some("tt0113277"));
        assert_eq!(item.ids.tmdb, None);
        assert_eq!(item.slot, HeroSlot::TopRated);
    }

    #[test]
    fn enriched_item_prefers_provider_fields() {
        let mut record = CatalogRecord::new("s1", MediaKind::Series, "Local");
        record.genres = vec!["Drama".into()];
        let details = ProviderDetails {
            language: "en-US".into(),
            tmdb_id: Some("1396".into()),
            title: Some("Breaking Bad".into()),
            overview: Some("Chemistry teacher".into()),
            runtime_minutes: Some(47),
            genres: vec!["Crime".into(), "Drama".into(), "Thriller".into()],
            certification: Some("TV-MA".into()),
            rating: Some(8.94),
            backdrops: vec!["https://cdn/b.jpg".into()],
            poster: Some("https://cdn/p.jpg".into()),
            ..ProviderDetails::default()
        };

        let item = build_item(
            MediaKind::Series,
            &selected(record),
            Some(&details),
            &[],
            &ArtworkResolver::default(),
        );

        assert_eq!(item.source, ItemSource::Tmdb);
        assert_eq!(item.title, "Breaking Bad");
        assert_eq!(item.rating, 8.9);
        assert_eq!(item.genres, vec!["Crime", "Drama", "Thriller"]);
        assert_eq!(item.certification.as_deref(), Some("TV-MA"));
        assert_eq!(item.backdrops, vec!["https://cdn/b.jpg"]);
        assert_eq!(item.ids.tmdb.as_deref(), Some("1396"));
        assert_eq!(item.cta.label, "Start watching");
    }

    #[test]
    fn cta_target_falls_back_through_external_ids() {
        let mut record = CatalogRecord::new("", MediaKind::Movie, "t");
        record.provider_ids.tvdb = Some("81189".into());
        assert_eq!(resolve_cta_target(&record, None), "81189");

        record.provider_ids.tmdb = Some("550".into());
        assert_eq!(resolve_cta_target(&record, None), "550");

        record.provider_ids.imdb = Some("tt0137523".into());
        assert_eq!(resolve_cta_target(&record, None), "tt0137523");

        let bare = CatalogRecord::new(" ", MediaKind::Movie, "t");
        let generated = resolve_cta_target(&bare, None);
        assert!(Uuid::parse_str(&generated).is_ok());
    }
}
