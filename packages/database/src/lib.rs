#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage boundaries for the client map.
//!
//! - [`visits`]: the read-only record source that supplies raw client
//!   visit rows (`PostgreSQL` via `switchy_database`).
//! - [`geocode_cache`]: the durable city-name to coordinates mapping,
//!   stored as a human-readable JSON file and rewritten atomically.
//! - [`paths`]: default file locations.

pub mod db;
pub mod geocode_cache;
pub mod paths;
pub mod visits;

/// Errors that can occur while reading visit records.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Connection could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// A configured table or column name is not a plain SQL identifier.
    #[error("Invalid SQL identifier: {identifier:?}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
