//! LedgerLink Core - Domain entities, services, and traits.
//!
//! This crate contains the core business logic for LedgerLink.
//! It is database-agnostic and defines traits that are implemented
//! by the `storage-sqlite` crate.

pub mod accounts;
pub mod connections;
pub mod constants;
pub mod errors;
pub mod events;
pub mod locked;
pub mod transactions;

// Re-export error types
pub use errors::Error;
pub use errors::Result;

pub use locked::LockedAttributes;
