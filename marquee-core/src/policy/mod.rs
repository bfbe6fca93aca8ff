//! Versioned selection policy for hero pools.
//!
//! A policy decides pool sizes, slot quotas, diversity weights, cache
//! lifetime and enrichment languages. The effective policy is identified by
//! a content fingerprint; cached pools built under a different fingerprint
//! are never served.

mod store;

pub use store::{EffectivePolicy, PolicyOrigin, PolicySource, PolicyStore};

use chrono::Duration;
use marquee_model::MediaKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Largest pool a policy may request per kind.
pub const MAX_POOL_SIZE: i32 = 100;

/// Language used for the second enrichment attempt when none is configured.
pub const BASELINE_LANGUAGE: &str = "en-US";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid policy field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fractions of the pool assigned to each slot.
///
/// `random` is informational: the planner gives the random slot whatever
/// the budgeted slots leave over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotQuotas {
    pub new: f64,
    pub top_rated: f64,
    pub old_but_gold: f64,
    pub random: f64,
}

impl Default for SlotQuotas {
    fn default() -> Self {
        Self {
            new: 0.3,
            top_rated: 0.3,
            old_but_gold: 0.2,
            random: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiversityWeights {
    pub genre: f64,
    pub year: f64,
    /// `0` turns off history-based suppression.
    pub anti_repeat: f64,
}

impl Default for DiversityWeights {
    fn default() -> Self {
        Self {
            genre: 0.5,
            year: 0.5,
            anti_repeat: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachePolicy {
    pub ttl_hours: u32,
    pub grace_minutes: u32,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_hours: 6,
            grace_minutes: 30,
        }
    }
}

impl CachePolicy {
    pub fn ttl(&self) -> Duration {
        Duration::hours(i64::from(self.ttl_hours))
    }

    pub fn grace(&self) -> Duration {
        Duration::minutes(i64::from(self.grace_minutes))
    }
}

/// Enrichment languages.
///
/// Accepts either a bare tag (`"de-DE"`) or the full object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LanguageField")]
#[serde(rename_all = "camelCase")]
pub struct LanguagePolicy {
    pub preferred: String,
    pub fallback: Option<String>,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self {
            preferred: BASELINE_LANGUAGE.to_string(),
            fallback: Some(BASELINE_LANGUAGE.to_string()),
        }
    }
}

impl LanguagePolicy {
    /// Second language to try, if it differs from the preferred one.
    pub fn secondary(&self) -> Option<&str> {
        self.fallback
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .filter(|tag| !tag.eq_ignore_ascii_case(self.preferred.trim()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LanguageField {
    Tag(String),
    Full {
        preferred: String,
        #[serde(default = "default_fallback")]
        fallback: Option<String>,
    },
}

fn default_fallback() -> Option<String> {
    Some(BASELINE_LANGUAGE.to_string())
}

impl From<LanguageField> for LanguagePolicy {
    fn from(field: LanguageField) -> Self {
        match field {
            LanguageField::Tag(preferred) => Self {
                preferred,
                fallback: default_fallback(),
            },
            LanguageField::Full {
                preferred,
                fallback,
            } => Self {
                preferred,
                fallback,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroPolicy {
    pub version: u32,
    pub pool_size_movies: i32,
    pub pool_size_series: i32,
    pub slots: SlotQuotas,
    pub diversity: DiversityWeights,
    pub cache: CachePolicy,
    pub language: LanguagePolicy,
}

impl Default for HeroPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            pool_size_movies: 10,
            pool_size_series: 10,
            slots: SlotQuotas::default(),
            diversity: DiversityWeights::default(),
            cache: CachePolicy::default(),
            language: LanguagePolicy::default(),
        }
    }
}

impl HeroPolicy {
    /// Parse and validate a JSON policy document.
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let policy: HeroPolicy = serde_json::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Configured pool size for `kind`; negative sizes count as zero.
    pub fn pool_size(&self, kind: MediaKind) -> usize {
        let size = match kind {
            MediaKind::Movie => self.pool_size_movies,
            MediaKind::Series => self.pool_size_series,
        };
        usize::try_from(size).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, size) in [
            ("poolSizeMovies", self.pool_size_movies),
            ("poolSizeSeries", self.pool_size_series),
        ] {
            if size > MAX_POOL_SIZE {
                return Err(PolicyError::Invalid {
                    field,
                    reason: format!("{size} exceeds {MAX_POOL_SIZE}"),
                });
            }
        }

        let fractions = [
            ("slots.new", self.slots.new),
            ("slots.topRated", self.slots.top_rated),
            ("slots.oldButGold", self.slots.old_but_gold),
            ("slots.random", self.slots.random),
            ("diversity.genre", self.diversity.genre),
            ("diversity.year", self.diversity.year),
            ("diversity.antiRepeat", self.diversity.anti_repeat),
        ];
        for (field, value) in fractions {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::Invalid {
                    field,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }

        if self.cache.ttl_hours == 0 {
            return Err(PolicyError::Invalid {
                field: "cache.ttlHours",
                reason: "must be at least one hour".to_string(),
            });
        }

        if self.language.preferred.trim().is_empty() {
            return Err(PolicyError::Invalid {
                field: "language.preferred",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Lowercase hex SHA-256 of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&FingerprintView::from(self))
            .unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// Serialization used for fingerprinting.
///
/// `LanguagePolicy` deserializes through `LanguageField`, so it is spelled out
/// here to keep the hashed bytes independent of the input form.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintView<'a> {
    version: u32,
    pool_size_movies: i32,
    pool_size_series: i32,
    slots: &'a SlotQuotas,
    diversity: &'a DiversityWeights,
    cache: &'a CachePolicy,
    preferred_language: &'a str,
    fallback_language: Option<&'a str>,
}

impl<'a> From<&'a HeroPolicy> for FingerprintView<'a> {
    fn from(policy: &'a HeroPolicy) -> Self {
        Self {
            version: policy.version,
            pool_size_movies: policy.pool_size_movies,
            pool_size_series: policy.pool_size_series,
            slots: &policy.slots,
            diversity: &policy.diversity,
            cache: &policy.cache,
            preferred_language: &policy.language.preferred,
            fallback_language: policy.language.fallback.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let policy =
            HeroPolicy::from_json(r#"{"poolSizeMovies": 4, "language": "de-DE"}"#)
                .expect("valid policy");

        assert_eq!(policy.pool_size(MediaKind::Movie), 4);
        assert_eq!(policy.pool_size(MediaKind::Series), 10);
        assert_eq!(policy.slots, SlotQuotas::default());
        assert_eq!(policy.language.preferred, "de-DE");
        assert_eq!(policy.language.secondary(), Some(BASELINE_LANGUAGE));
    }

    #[test]
    fn full_language_object_is_accepted() {
        let policy = HeroPolicy::from_json(
            r#"{"language": {"preferred": "fr-FR", "fallback": null}}"#,
        )
        .expect("valid policy");

        assert_eq!(policy.language.preferred, "fr-FR");
        assert_eq!(policy.language.secondary(), None);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = HeroPolicy::from_json(r#"{"slots": {"new": 1.5}}"#)
            .expect_err("quota above one");
        assert!(matches!(
            err,
            PolicyError::Invalid {
                field: "slots.new",
                ..
            }
        ));

        assert!(HeroPolicy::from_json(r#"{"poolSizeSeries": 500}"#).is_err());
        assert!(HeroPolicy::from_json(r#"{"cache": {"ttlHours": 0}}"#).is_err());
        assert!(HeroPolicy::from_json("not json").is_err());
    }

    #[test]
    fn negative_pool_size_counts_as_empty() {
        let policy = HeroPolicy {
            pool_size_series: -3,
            ..HeroPolicy::default()
        };

        assert!(policy.validate().is_ok());
        assert_eq!(policy.pool_size(MediaKind::Series), 0);
    }

    #[test]
    fn fingerprint_tracks_content_not_input_form() {
        let tag = HeroPolicy::from_json(r#"{"language": "en-US"}"#).unwrap();
        let object = HeroPolicy::from_json(
            r#"{"language": {"preferred": "en-US", "fallback": "en-US"}}"#,
        )
        .unwrap();
        assert_eq!(tag.fingerprint(), object.fingerprint());
        assert_eq!(tag.fingerprint(), HeroPolicy::default().fingerprint());

        let bumped = HeroPolicy {
            version: 2,
            ..HeroPolicy::default()
        };
        assert_ne!(bumped.fingerprint(), HeroPolicy::default().fingerprint());
        assert_eq!(bumped.fingerprint().len(), 64);
    }
}
