//! Diversity-capped, history-aware slot filling.
//!
//! Candidates are pre-sorted into one view per slot. Slots are filled in
//! [`HeroSlot::ORDER`], each through up to three passes:
//!
//! * pass A scans the slot view with the slot's eligibility filter, skipping
//!   anything already chosen, over a diversity cap, or present in history;
//! * pass B repeats the scan without the filter (only `new` has one, so
//!   other slots skip straight to pass C);
//! * pass C replays the candidates that were skipped only because of
//!   history, this time allowing them.
//!
//! If the pool is still short afterwards, a top-up pass appends unselected
//! candidates in catalog order, ignoring history, tagged `random`. It takes
//! candidates within the diversity caps first and only then the rest, so
//! top-up picks are the only ones allowed to exceed the caps, and only when
//! nothing else is left.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use marquee_model::{HeroSlot, SlotCounts};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::candidate::Candidate;
use crate::policy::DiversityWeights;

/// Ordering applied to the random slot's view.
pub trait Shuffle {
    fn shuffle<T>(&mut self, items: &mut [T]);
}

/// Uniform shuffle backed by a `rand` generator.
#[derive(Debug)]
pub struct RandomShuffle<R>(R);

impl<R: Rng> RandomShuffle<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RandomShuffle<StdRng> {
    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl<R: Rng> Shuffle for RandomShuffle<R> {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.0);
    }
}

/// Leaves the catalog order untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreserveOrder;

impl Shuffle for PreserveOrder {
    fn shuffle<T>(&mut self, _items: &mut [T]) {}
}

/// Per-genre and per-year ceilings for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiversityCaps {
    pub genre: usize,
    pub year: usize,
}

impl DiversityCaps {
    pub fn for_pool(pool_size: usize, weights: &DiversityWeights) -> Self {
        Self {
            genre: cap_for(pool_size, weights.genre),
            year: cap_for(pool_size, weights.year),
        }
    }
}

fn cap_for(pool_size: usize, weight: f64) -> usize {
    let weight = if weight.is_finite() { weight } else { 0.0 };
    let share = (weight * 0.5).clamp(0.1, 0.35);
    ((pool_size as f64 * share).round() as usize).max(1)
}

/// A candidate together with the slot that picked it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCandidate {
    pub candidate: Candidate,
    pub slot: HeroSlot,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub selected: Vec<SelectedCandidate>,
    pub slots: SlotCounts,
    pub caps: DiversityCaps,
    /// How many picks came from the cap-exempt top-up pass.
    pub topped_up: usize,
}

impl SelectionOutcome {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|s| s.candidate.id.as_str())
    }
}

/// Candidate views, one per slot.
struct SlotViews<'a> {
    new: Vec<&'a Candidate>,
    top_rated: Vec<&'a Candidate>,
    old_but_gold: Vec<&'a Candidate>,
    random: Vec<&'a Candidate>,
}

impl<'a> SlotViews<'a> {
    fn build(candidates: &'a [Candidate], shuffle: &mut impl Shuffle) -> Self {
        let mut new: Vec<&Candidate> = candidates.iter().collect();
        new.sort_by(|a, b| b.added_at_ms.cmp(&a.added_at_ms));

        let mut top_rated: Vec<&Candidate> = candidates.iter().collect();
        top_rated.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| b.added_at_ms.cmp(&a.added_at_ms))
        });

        let mut old_but_gold: Vec<&Candidate> =
            candidates.iter().filter(|c| c.is_old).collect();
        old_but_gold.sort_by(|a, b| {
            compare_years(a.year, b.year)
                .then_with(|| b.rating.total_cmp(&a.rating))
                .then_with(|| b.added_at_ms.cmp(&a.added_at_ms))
        });

        let mut random: Vec<&Candidate> = candidates.iter().collect();
        shuffle.shuffle(&mut random);

        Self {
            new,
            top_rated,
            old_but_gold,
            random,
        }
    }

    fn for_slot(&self, slot: HeroSlot) -> &[&'a Candidate] {
        match slot {
            HeroSlot::New => &self.new,
            HeroSlot::TopRated => &self.top_rated,
            HeroSlot::OldButGold => &self.old_but_gold,
            HeroSlot::Random => &self.random,
        }
    }
}

fn compare_years(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn is_new(candidate: &Candidate) -> bool {
    candidate.is_new
}

fn eligibility_filter(slot: HeroSlot) -> Option<fn(&Candidate) -> bool> {
    match slot {
        HeroSlot::New => Some(is_new as fn(&Candidate) -> bool),
        _ => None,
    }
}

#[derive(Clone, Copy)]
struct AttemptOptions {
    allow_history: bool,
    filter: Option<fn(&Candidate) -> bool>,
}

/// Accumulator state for one build.
struct SelectionContext<'a> {
    pool_size: usize,
    caps: DiversityCaps,
    selections: Vec<(&'a Candidate, HeroSlot)>,
    slot_counts: SlotCounts,
    genre_counts: HashMap<&'a str, usize>,
    year_counts: HashMap<i32, usize>,
    chosen: HashSet<&'a str>,
    history: &'a HashSet<String>,
}

impl<'a> SelectionContext<'a> {
    fn new(
        pool_size: usize,
        caps: DiversityCaps,
        history: &'a HashSet<String>,
    ) -> Self {
        Self {
            pool_size,
            caps,
            selections: Vec::with_capacity(pool_size),
            slot_counts: SlotCounts::default(),
            genre_counts: HashMap::new(),
            year_counts: HashMap::new(),
            chosen: HashSet::new(),
            history,
        }
    }

    fn is_full(&self) -> bool {
        self.selections.len() >= self.pool_size
    }

    fn slot_satisfied(&self, slot: HeroSlot, quota: usize) -> bool {
        self.slot_counts.get(slot) >= quota || self.is_full()
    }

    fn passes_caps(&self, candidate: &Candidate) -> bool {
        let genres_ok = candidate.genres.iter().all(|genre| {
            self.genre_counts.get(genre.as_str()).copied().unwrap_or(0)
                < self.caps.genre
        });
        let year_ok = candidate
            .year
            .map(|year| {
                self.year_counts.get(&year).copied().unwrap_or(0)
                    < self.caps.year
            })
            .unwrap_or(true);
        genres_ok && year_ok
    }

    fn select(&mut self, candidate: &'a Candidate, slot: HeroSlot) {
        self.selections.push((candidate, slot));
        self.chosen.insert(candidate.id.as_str());
        self.slot_counts.increment(slot);
        for genre in &candidate.genres {
            *self.genre_counts.entry(genre.as_str()).or_insert(0) += 1;
        }
        if let Some(year) = candidate.year {
            *self.year_counts.entry(year).or_insert(0) += 1;
        }
    }

    /// Scan `list` for `slot` until its quota or the pool is full.
    ///
    /// Candidates rejected only for being in history are pushed onto
    /// `deferred` for a later pass.
    fn attempt_selection(
        &mut self,
        list: &[&'a Candidate],
        quota: usize,
        slot: HeroSlot,
        options: AttemptOptions,
        deferred: &mut Vec<&'a Candidate>,
    ) {
        for &candidate in list {
            if self.slot_satisfied(slot, quota) {
                return;
            }
            if self.chosen.contains(candidate.id.as_str()) {
                continue;
            }
            if let Some(filter) = options.filter
                && !filter(candidate)
            {
                continue;
            }
            if !self.passes_caps(candidate) {
                continue;
            }
            if !options.allow_history && self.history.contains(&candidate.id) {
                deferred.push(candidate);
                continue;
            }
            self.select(candidate, slot);
        }
    }

    fn fill_slot(&mut self, views: &SlotViews<'a>, slot: HeroSlot, quota: usize) {
        let list = views.for_slot(slot);
        let mut deferred = Vec::new();
        let filter = eligibility_filter(slot);

        // Pass A
        self.attempt_selection(
            list,
            quota,
            slot,
            AttemptOptions {
                allow_history: false,
                filter,
            },
            &mut deferred,
        );

        // Pass B is only distinct from A when the slot has a filter.
        if filter.is_some() {
            self.attempt_selection(
                list,
                quota,
                slot,
                AttemptOptions {
                    allow_history: false,
                    filter: None,
                },
                &mut deferred,
            );
        }

        // Pass C
        let replay = std::mem::take(&mut deferred);
        self.attempt_selection(
            &replay,
            quota,
            slot,
            AttemptOptions {
                allow_history: true,
                filter: None,
            },
            &mut deferred,
        );
    }

    /// Append unselected candidates in catalog order until the pool is
    /// full: first those within the caps, then the cap-exempt rest.
    fn top_up(&mut self, candidates: &'a [Candidate]) -> usize {
        let mut added = 0;
        for respect_caps in [true, false] {
            for candidate in candidates {
                if self.is_full() {
                    return added;
                }
                if self.chosen.contains(candidate.id.as_str()) {
                    continue;
                }
                if respect_caps && !self.passes_caps(candidate) {
                    continue;
                }
                self.select(candidate, HeroSlot::Random);
                added += 1;
            }
        }
        added
    }
}

/// Fill `plan` from `candidates`.
///
/// Deterministic for identical inputs apart from the `random` view, whose
/// order is delegated to `shuffle`.
pub fn select_pool(
    candidates: &[Candidate],
    plan: &SlotCounts,
    caps: DiversityCaps,
    history: &HashSet<String>,
    shuffle: &mut impl Shuffle,
) -> SelectionOutcome {
    let pool_size = plan.total();
    let mut ctx = SelectionContext::new(pool_size, caps, history);

    if pool_size > 0 {
        let views = SlotViews::build(candidates, shuffle);
        for slot in HeroSlot::ORDER {
            if ctx.is_full() {
                break;
            }
            ctx.fill_slot(&views, slot, plan.get(slot));
        }
    }

    let topped_up = ctx.top_up(candidates);

    SelectionOutcome {
        selected: ctx
            .selections
            .into_iter()
            .map(|(candidate, slot)| SelectedCandidate {
                candidate: candidate.clone(),
                slot,
            })
            .collect(),
        slots: ctx.slot_counts,
        caps,
        topped_up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CatalogRecord;
    use marquee_model::MediaKind;
    use std::sync::Arc;

    struct Reverse;

    impl Shuffle for Reverse {
        fn shuffle<T>(&mut self, items: &mut [T]) {
            items.reverse();
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            record: Arc::new(CatalogRecord::new(id, MediaKind::Movie, id)),
            added_at_ms: 0,
            year: None,
            rating: 0.0,
            vote_count: 0,
            genres: Vec::new(),
            is_new: false,
            is_old: false,
        }
    }

    fn with(
        id: &str,
        added_at_ms: i64,
        rating: f64,
        year: Option<i32>,
        genre: &str,
    ) -> Candidate {
        Candidate {
            added_at_ms,
            rating,
            year,
            genres: vec![genre.to_string()],
            is_old: year.map(|y| 2025 - y >= 12).unwrap_or(false),
            ..candidate(id)
        }
    }

    fn wide_caps() -> DiversityCaps {
        DiversityCaps {
            genre: 100,
            year: 100,
        }
    }

    fn plan(new: usize, top: usize, old: usize, random: usize) -> SlotCounts {
        SlotCounts {
            new,
            top_rated: top,
            old_but_gold: old,
            random,
        }
    }

    fn picked(outcome: &SelectionOutcome) -> Vec<(&str, HeroSlot)> {
        outcome
            .selected
            .iter()
            .map(|s| (s.candidate.id.as_str(), s.slot))
            .collect()
    }

    #[test]
    fn caps_scale_with_pool_size_and_weight() {
        let weights = DiversityWeights {
            genre: 0.5,
            year: 1.0,
            anti_repeat: 0.5,
        };
        let caps = DiversityCaps::for_pool(10, &weights);
        assert_eq!(caps.genre, 3);
        assert_eq!(caps.year, 4);

        let tiny = DiversityWeights {
            genre: 0.0,
            year: 0.0,
            anti_repeat: 0.0,
        };
        assert_eq!(DiversityCaps::for_pool(10, &tiny).genre, 1);
        assert_eq!(DiversityCaps::for_pool(2, &tiny).year, 1);
    }

    #[test]
    fn slots_fill_in_order_with_exact_tie_breaks() {
        let mut fresh_a = with("fresh-a", 900, 5.0, Some(2024), "Drama");
        fresh_a.is_new = true;
        let mut fresh_b = with("fresh-b", 800, 6.0, Some(2023), "Comedy");
        fresh_b.is_new = true;
        let stale = with("stale", 700, 9.0, Some(2020), "Horror");
        let top_tie_old = with("tie-old", 100, 8.0, Some(2019), "Action");
        let top_tie_new = with("tie-new", 200, 8.0, Some(2018), "Sci-Fi");
        let oldest = with("oldest", 10, 6.0, Some(1950), "Western");
        let old_high = with("old-high", 20, 7.5, Some(1980), "Noir");
        let old_low = with("old-low", 30, 4.0, Some(1980), "Musical");

        let candidates = vec![
            fresh_a,
            fresh_b,
            stale,
            top_tie_old,
            top_tie_new,
            oldest,
            old_high,
            old_low,
        ];
        let outcome = select_pool(
            &candidates,
            &plan(2, 2, 2, 2),
            wide_caps(),
            &HashSet::new(),
            &mut Reverse,
        );

        assert_eq!(
            picked(&outcome),
            vec![
                ("fresh-a", HeroSlot::New),
                ("fresh-b", HeroSlot::New),
                ("stale", HeroSlot::TopRated),
                ("tie-new", HeroSlot::TopRated),
                ("oldest", HeroSlot::OldButGold),
                ("old-high", HeroSlot::OldButGold),
                ("old-low", HeroSlot::Random),
                ("tie-old", HeroSlot::Random),
            ]
        );
        assert_eq!(outcome.slots, plan(2, 2, 2, 2));
        assert_eq!(outcome.topped_up, 0);
    }

    #[test]
    fn new_slot_broadens_when_too_few_new_items() {
        let mut only_new = with("only-new", 10, 1.0, None, "A");
        only_new.is_new = true;
        let recent = with("recent", 500, 1.0, None, "B");
        let older = with("older", 400, 1.0, None, "C");

        let candidates = vec![older, recent, only_new];
        let outcome = select_pool(
            &candidates,
            &plan(2, 0, 0, 0),
            wide_caps(),
            &HashSet::new(),
            &mut PreserveOrder,
        );

        assert_eq!(
            picked(&outcome),
            vec![("only-new", HeroSlot::New), ("recent", HeroSlot::New)]
        );
    }

    #[test]
    fn history_items_are_skipped_when_alternatives_exist() {
        let candidates: Vec<Candidate> = (0..5)
            .map(|i| with(&format!("c{i}"), 0, 9.0 - i as f64, None, &format!("g{i}")))
            .collect();
        let history: HashSet<String> = ["c0".to_string()].into();

        let outcome = select_pool(
            &candidates,
            &plan(0, 2, 0, 0),
            wide_caps(),
            &history,
            &mut PreserveOrder,
        );

        assert_eq!(
            picked(&outcome),
            vec![("c1", HeroSlot::TopRated), ("c2", HeroSlot::TopRated)]
        );
    }

    #[test]
    fn history_items_are_replayed_when_nothing_else_qualifies() {
        let candidates = vec![
            with("seen", 0, 9.0, Some(1960), "Drama"),
            with("fresh", 0, 8.0, Some(2024), "Drama"),
        ];
        let history: HashSet<String> = ["seen".to_string()].into();

        let outcome = select_pool(
            &candidates,
            &plan(0, 0, 1, 0),
            wide_caps(),
            &history,
            &mut PreserveOrder,
        );

        assert_eq!(picked(&outcome), vec![("seen", HeroSlot::OldButGold)]);
        assert_eq!(outcome.topped_up, 0);
    }

    #[test]
    fn genre_cap_limits_capped_passes_and_top_up_fills_the_rest() {
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| with(&format!("d{i}"), i, 5.0, None, "Drama"))
            .collect();
        let caps = DiversityCaps { genre: 2, year: 100 };

        let outcome = select_pool(
            &candidates,
            &plan(3, 3, 2, 2),
            caps,
            &HashSet::new(),
            &mut PreserveOrder,
        );

        // Two capped picks from `new`, the remaining eight are cap-exempt
        // top-up picks in catalog order.
        assert_eq!(outcome.selected.len(), 10);
        assert_eq!(outcome.topped_up, 8);
        assert_eq!(outcome.slots.new, 2);
        assert_eq!(outcome.slots.random, 8);
        let capped: Vec<_> =
            outcome.selected[..2].iter().map(|s| s.candidate.id.as_str()).collect();
        assert_eq!(capped, vec!["d19", "d18"]);
        assert_eq!(outcome.selected[2].candidate.id, "d0");
    }

    #[test]
    fn genre_cap_holds_when_other_candidates_exist() {
        let mut candidates: Vec<Candidate> = (0..20)
            .map(|i| with(&format!("d{i}"), 100 + i, 5.0, None, "Drama"))
            .collect();
        candidates.extend(
            (0..10).map(|i| with(&format!("o{i}"), i, 5.0, None, &format!("G{i}"))),
        );
        let caps = DiversityCaps { genre: 2, year: 100 };

        let outcome = select_pool(
            &candidates,
            &plan(3, 3, 2, 2),
            caps,
            &HashSet::new(),
            &mut PreserveOrder,
        );

        let drama = outcome
            .selected
            .iter()
            .filter(|s| s.candidate.genres.iter().any(|g| g == "Drama"))
            .count();
        assert_eq!(outcome.selected.len(), 10);
        assert_eq!(drama, 2);

        // Nothing is old, so the top-up covers the old-but-gold quota with
        // in-cap candidates before touching the capped genre.
        assert_eq!(outcome.topped_up, 2);
        assert_eq!(outcome.slots.old_but_gold, 0);
        let topped: Vec<_> = outcome.selected[8..]
            .iter()
            .map(|s| (s.candidate.id.as_str(), s.slot))
            .collect();
        assert_eq!(
            topped,
            vec![("o2", HeroSlot::Random), ("o3", HeroSlot::Random)]
        );
    }

    #[test]
    fn year_cap_counts_sequential_picks() {
        let candidates: Vec<Candidate> = (0..4)
            .map(|i| with(&format!("y{i}"), 10 - i, 5.0, Some(2010), &format!("g{i}")))
            .chain(std::iter::once(with("other", 0, 5.0, Some(2011), "x")))
            .collect();
        let caps = DiversityCaps { genre: 100, year: 1 };

        let outcome = select_pool(
            &candidates,
            &plan(2, 0, 0, 0),
            caps,
            &HashSet::new(),
            &mut PreserveOrder,
        );

        assert_eq!(
            picked(&outcome),
            vec![("y0", HeroSlot::New), ("other", HeroSlot::New)]
        );
    }

    #[test]
    fn empty_plan_selects_nothing() {
        let candidates = vec![candidate("a"), candidate("b")];
        let outcome = select_pool(
            &candidates,
            &SlotCounts::default(),
            wide_caps(),
            &HashSet::new(),
            &mut PreserveOrder,
        );
        assert!(outcome.selected.is_empty());
    }

    #[test]
    fn short_catalog_returns_everything_once() {
        let candidates = vec![candidate("a"), candidate("b"), candidate("c")];
        let outcome = select_pool(
            &candidates,
            &plan(3, 3, 2, 2),
            wide_caps(),
            &HashSet::new(),
            &mut PreserveOrder,
        );

        let mut ids: Vec<_> = outcome.ids().collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
