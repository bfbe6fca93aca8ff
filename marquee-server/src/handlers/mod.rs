pub mod health;
pub mod hero;
