use std::collections::HashSet;

use url::Url;

use crate::ports::CatalogRecord;

/// Route local thumbnails are served from.
pub const DEFAULT_THUMBNAIL_ROUTE: &str = "/api/v1/thumbnails";

/// Where an artwork reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkOrigin {
    /// Absolute URL from the metadata provider
    Provider,
    /// Path inside the local thumbnail cache; served through the proxy route
    Thumbnail,
    /// Field of the catalog record
    Catalog,
}

/// Normalizes artwork references and picks backdrops and posters.
#[derive(Debug, Clone)]
pub struct ArtworkResolver {
    thumbnail_route: String,
}

impl Default for ArtworkResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_ROUTE)
    }
}

impl ArtworkResolver {
    pub fn new(thumbnail_route: impl Into<String>) -> Self {
        let route = thumbnail_route.into();
        let trimmed = route.trim().trim_end_matches('/');
        let thumbnail_route = if trimmed.starts_with('/')
            || trimmed.starts_with("http://")
            || trimmed.starts_with("https://")
        {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self { thumbnail_route }
    }

    /// Turn a raw reference into something a browser can load.
    ///
    /// Data URIs and absolute http(s) URLs pass through; thumbnail cache
    /// paths are rewritten onto the proxy route; other relative references
    /// become root-relative. Anything with a `..` segment is rejected.
    pub fn normalize(&self, raw: &str, origin: ArtworkOrigin) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        if value.starts_with("data:") {
            return Some(value.to_string());
        }

        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Url::parse(value).ok().map(String::from);
        }
        if lower.contains("://") {
            return None;
        }

        let path = value.replace('\\', "/");
        if path.split('/').any(|segment| segment == "..") {
            return None;
        }

        match origin {
            ArtworkOrigin::Thumbnail => {
                if self.is_proxied(&path) {
                    return Some(path);
                }
                let key = path.trim_start_matches('/');
                Some(format!("{}/{}", self.thumbnail_route, key))
            }
            ArtworkOrigin::Provider | ArtworkOrigin::Catalog => {
                if path.starts_with('/') {
                    Some(path)
                } else {
                    Some(format!("/{path}"))
                }
            }
        }
    }

    /// Whether `path` already sits below the proxy route.
    fn is_proxied(&self, path: &str) -> bool {
        path.strip_prefix(self.thumbnail_route.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn normalize_all<'a>(
        &self,
        raw: impl IntoIterator<Item = &'a str>,
        origin: ArtworkOrigin,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|value| self.normalize(value, origin))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// Backdrops from the first source that yields any:
    /// provider, thumbnails, catalog backdrop, catalog poster.
    pub fn resolve_backdrops(
        &self,
        provider: &[String],
        thumbnails: &[String],
        record: &CatalogRecord,
    ) -> Vec<String> {
        let sources: [(Vec<&str>, ArtworkOrigin); 4] = [
            (
                provider.iter().map(String::as_str).collect(),
                ArtworkOrigin::Provider,
            ),
            (
                thumbnails.iter().map(String::as_str).collect(),
                ArtworkOrigin::Thumbnail,
            ),
            (
                record.backdrop.as_deref().into_iter().collect(),
                ArtworkOrigin::Catalog,
            ),
            (
                record.poster.as_deref().into_iter().collect(),
                ArtworkOrigin::Catalog,
            ),
        ];

        sources
            .into_iter()
            .map(|(raw, origin)| self.normalize_all(raw, origin))
            .find(|urls| !urls.is_empty())
            .unwrap_or_default()
    }

    /// Poster: provider, then catalog poster, then first thumbnail.
    pub fn resolve_poster(
        &self,
        provider: Option<&str>,
        thumbnails: &[String],
        record: &CatalogRecord,
    ) -> Option<String> {
        provider
            .and_then(|url| self.normalize(url, ArtworkOrigin::Provider))
            .or_else(|| {
                record
                    .poster
                    .as_deref()
                    .and_then(|url| self.normalize(url, ArtworkOrigin::Catalog))
            })
            .or_else(|| {
                thumbnails.iter().find_map(|path| {
                    self.normalize(path, ArtworkOrigin::Thumbnail)
                })
            })
    }
}
