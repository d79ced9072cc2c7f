//! SQLite song catalog for a karaoke library.
//!
//! The catalog is a persisted view of which media items live where in the
//! library, so the library can be browsed and searched without walking the
//! filesystem on every request. The files on disk are the source of truth;
//! a library scan reconciles the catalog against them.
//!
//! # Architecture
//! - [`Database`] owns the connection pool and bootstraps the schema
//!   (versioned through `PRAGMA user_version`).
//! - [`Repository`] serves reads and the enrichment write contract, and hands
//!   out scan [`Transaction`]s.
//! - [`recovery`] takes hot snapshots and restores the catalog from one.

mod db;
mod entry;
pub mod error;
mod models;
pub mod recovery;
mod repo;
mod tx;

pub use crate::db::{Database, SCHEMA_VERSION};
pub use crate::entry::{CatalogEntry, Enrichment, EnrichmentStatus, EntryId, Fingerprint, Format, NewEntry};
pub use crate::repo::Repository;
pub use crate::tx::Transaction;
