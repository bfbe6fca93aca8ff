//! Hero pool curation pipeline.
//!
//! Leaves first: [`candidate`] normalizes catalog records, [`slots`] splits
//! the pool size into slot quotas, [`selection`] fills those quotas under
//! diversity caps and anti-repeat history ([`history`]), [`enrichment`]
//! pulls provider metadata, [`artwork`] and [`item`] shape the public items,
//! and [`service`] wraps it all behind a policy-aware cache.

pub mod artwork;
pub mod candidate;
pub mod enrichment;
pub mod history;
pub mod item;
pub mod selection;
pub mod service;
pub mod slots;

pub use artwork::{ArtworkOrigin, ArtworkResolver};
pub use candidate::{Candidate, prepare_candidates};
pub use enrichment::{EnrichmentBatch, enrich_selection, merge_details};
pub use history::HistoryTracker;
pub use selection::{
    DiversityCaps, PreserveOrder, RandomShuffle, SelectedCandidate,
    SelectionOutcome, Shuffle, select_pool,
};
pub use service::{HeroPoolService, PoolRequest};
pub use slots::plan_slots;
