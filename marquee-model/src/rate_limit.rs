use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of an external provider's rate-limit backoff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct RateLimitState {
    /// Whether calls are currently being refused.
    pub active: bool,
    /// When the current backoff ends.
    pub until: Option<DateTime<Utc>>,
    /// Last retry hint reported by the provider, in milliseconds.
    pub retry_after_ms: Option<u64>,
    /// Consecutive rate-limit responses since the last success.
    pub strikes: u32,
}

impl RateLimitState {
    /// Whether the backoff window is still open at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.until.map(|until| until > now).unwrap_or(true)
    }
}
