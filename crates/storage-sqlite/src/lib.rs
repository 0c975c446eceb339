//! SQLite storage implementation for LedgerLink.
//!
//! This crate provides all database-related functionality using Diesel ORM
//! with SQLite. It implements the repository traits defined in
//! `ledgerlink-core` and contains:
//! - Database connection pooling and the single-writer actor
//! - Repository implementations for all domain entities
//! - Database-specific model types (with Diesel derives)
//!
//! This crate is the only place in the application where Diesel dependencies
//! exist. All other crates (`core`, `connect`) are database-agnostic and
//! work with traits.

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod accounts;
pub mod connections;
pub mod transactions;

// Re-export database utilities
pub use db::{create_pool, get_connection, init_schema, spawn_writer, DbConnection, DbPool, WriteHandle};

// Re-export storage errors
pub use errors::StorageError;

// Re-export from ledgerlink-core for convenience
pub use ledgerlink_core::errors::{DatabaseError, Error, Result};
