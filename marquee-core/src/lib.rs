//! # Marquee Core
//!
//! Curates the bounded, diverse, anti-repetitive "hero pool" of featured
//! movies or series shown in a homepage banner.
//!
//! ## Overview
//!
//! A pool request reads the current [`policy`], serves a cached pool when
//! one exists for the same policy fingerprint and has not expired, and
//! otherwise rebuilds it:
//!
//! - **Candidates**: catalog records are normalized and de-duplicated
//! - **Slots**: the pool size is split across `new`, `topRated`,
//!   `oldButGold` and `random`
//! - **Selection**: slots are filled under per-genre and per-year caps while
//!   steering away from recently featured items
//! - **Enrichment**: selected items are decorated with TMDB metadata, with a
//!   fallback language for artwork
//! - **Caching**: the finished payload and updated history are written as one
//!   row per media kind
//!
//! ## Feature Flags
//!
//! - `database`: Postgres-backed pool store and catalog reader (SQLx)

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Postgres adapters for the pool store and catalog
#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub mod database;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Error types and error handling utilities
pub mod error;

/// Hero pool pipeline
pub mod hero;

/// In-memory adapters
pub mod infra;

/// Selection policy and fingerprinting
pub mod policy;

/// Collaborator traits
pub mod ports;

/// External metadata providers (TMDB integration)
pub mod providers;

pub use error::{HeroError, Result};
pub use hero::{HeroPoolService, PoolRequest};
pub use marquee_model as model;
