//! Data model shared across Marquee crates.
//!
//! Everything that crosses the persistence or HTTP boundary lives here so the
//! server and the pool pipeline agree on one wire shape.
#![allow(missing_docs)]

pub use ::chrono;

pub mod error;
pub mod history;
pub mod media_kind;
pub mod pool;
pub mod rate_limit;
pub mod slot;

pub use error::{ModelError, Result as ModelResult};
pub use history::HistoryEntry;
pub use media_kind::MediaKind;
pub use pool::{
    CallToAction, EnrichmentMeta, ExternalIds, HeroPoolItem, HeroPoolPayload,
    ItemSource, PoolMeta,
};
pub use rate_limit::RateLimitState;
pub use slot::{HeroSlot, SlotCounts};
