pub mod models;
pub mod service;

pub use models::{InstitutionSyncSummary, SyncAccountSummary, SyncConnectionSummary};
pub use service::{seed_providers, SyncService};
