pub mod disabled;
pub mod tmdb;

pub use disabled::DisabledProvider;
pub use tmdb::{TmdbConfig, TmdbProvider};
