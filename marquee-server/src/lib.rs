//! # Marquee Server
//!
//! Serves curated hero pools over HTTP.
//!
//! The router is built by [`create_app`] from an [`AppState`] holding the
//! pool service and the loaded configuration; `main.rs` wires real
//! collaborators (Postgres or in-memory, TMDB or disabled) into it.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};
pub use routes::create_app;
