//! Postgres adapters.
//!
//! Run [`crate::MIGRATOR`] against the pool before constructing these.

pub mod catalog;
pub mod hero_pools;

pub use catalog::PostgresCatalogReader;
pub use hero_pools::PostgresHeroPoolStore;
