//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations (edge tables, reactions, notifications)
//! - Row and read models

mod database;
mod models;

pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
