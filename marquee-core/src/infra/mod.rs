//! In-memory adapters for the pipeline ports.
//!
//! Used when the server runs without a database and as fixtures in tests.

pub mod memory;

pub use memory::{InMemoryCatalog, InMemoryHeroPoolStore};
