use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use marquee_model::HistoryEntry;

/// How long a featured item is remembered.
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 7;

/// Upper bound on remembered items per pool kind.
pub const DEFAULT_HISTORY_LIMIT: usize = 60;

/// Bounded, time-windowed log of previously featured ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTracker {
    window: Duration,
    limit: usize,
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self {
            window: Duration::days(DEFAULT_HISTORY_WINDOW_DAYS),
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl HistoryTracker {
    pub fn new(window: Duration, limit: usize) -> Self {
        Self { window, limit }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Live entries: inside the window, first occurrence per id, at most
    /// `limit` of them.
    pub fn snapshot(
        &self,
        entries: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Vec<HistoryEntry> {
        build_snapshot(entries, now, self.window, self.limit)
    }

    /// Record `selected_ids` as featured at `now`.
    ///
    /// Fresh entries replace older timestamps for the same id; the result is
    /// ordered most recent first.
    pub fn update<'a>(
        &self,
        entries: &[HistoryEntry],
        selected_ids: impl IntoIterator<Item = &'a str>,
        now: DateTime<Utc>,
    ) -> Vec<HistoryEntry> {
        let mut merged: Vec<HistoryEntry> = selected_ids
            .into_iter()
            .map(|id| HistoryEntry::new(id, now))
            .collect();
        merged.extend(entries.iter().cloned());
        // Stable: ties keep fresh entries ahead of older ones.
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        build_snapshot(&merged, now, self.window, self.limit)
    }
}

pub fn build_snapshot(
    entries: &[HistoryEntry],
    now: DateTime<Utc>,
    window: Duration,
    limit: usize,
) -> Vec<HistoryEntry> {
    let cutoff = now - window;
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| entry.timestamp >= cutoff)
        .filter(|entry| seen.insert(entry.id.as_str()))
        .take(limit)
        .cloned()
        .collect()
}

/// Membership set consulted by the selection engine.
pub fn history_ids(entries: &[HistoryEntry]) -> HashSet<String> {
    entries.iter().map(|entry| entry.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn snapshot_drops_expired_and_duplicate_entries() {
        let now = at(20);
        let entries = vec![
            HistoryEntry::new("a", at(19)),
            HistoryEntry::new("b", at(10)),
            HistoryEntry::new("a", at(15)),
            HistoryEntry::new("c", at(13)),
        ];

        let snapshot = build_snapshot(&entries, now, Duration::days(7), 60);
        assert_eq!(
            snapshot,
            vec![HistoryEntry::new("a", at(19)), HistoryEntry::new("c", at(13))]
        );
    }

    #[test]
    fn snapshot_truncates_to_limit() {
        let now = at(20);
        let entries: Vec<_> = (0..10)
            .map(|i| HistoryEntry::new(format!("id{i}"), now))
            .collect();

        assert_eq!(build_snapshot(&entries, now, Duration::days(7), 4).len(), 4);
    }

    #[test]
    fn update_refreshes_timestamps_and_orders_newest_first() {
        let tracker = HistoryTracker::default();
        let now = at(20);
        let prior = vec![
            HistoryEntry::new("old", at(18)),
            HistoryEntry::new("again", at(17)),
            HistoryEntry::new("expired", at(1)),
        ];

        let updated = tracker.update(&prior, ["again", "fresh"], now);
        assert_eq!(
            updated,
            vec![
                HistoryEntry::new("again", now),
                HistoryEntry::new("fresh", now),
                HistoryEntry::new("old", at(18)),
            ]
        );
    }

    #[test]
    fn update_keeps_the_most_recent_within_limit() {
        let tracker = HistoryTracker::new(Duration::days(7), 3);
        let now = at(20);
        let prior = vec![
            HistoryEntry::new("p1", at(19)),
            HistoryEntry::new("p2", at(18)),
        ];

        let updated = tracker.update(&prior, ["n1", "n2"], now);
        let ids: Vec<_> = updated.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2", "p1"]);
    }
}
