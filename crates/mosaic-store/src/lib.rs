//! # mosaic-store
//!
//! The only durable client state: the bearer token pair and the client
//! settings, kept in a small SQLite database in the platform data
//! directory. Everything else the client shows is fetched per page load.

pub mod database;
pub mod migrations;
pub mod settings;
pub mod tokens;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use settings::ClientSettings;
