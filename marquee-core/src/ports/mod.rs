//! Collaborator boundaries of the hero pool pipeline.
//!
//! Catalog mirroring, persistence and the metadata provider all live behind
//! these traits so the pipeline can run against Postgres in production and
//! plain in-memory fixtures in tests.

pub mod catalog;
pub mod metadata;
pub mod store;

pub use catalog::{CatalogReader, CatalogRecord, ProviderIds};
pub use metadata::{
    ExternalRef, MetadataProvider, ProviderDetails, ProviderError,
};
pub use store::{HeroPoolStore, StoredHeroPool};
