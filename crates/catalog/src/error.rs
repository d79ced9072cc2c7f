//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog file could not be opened or created. Fatal to the
    /// requested operation; never retried internally.
    #[display("catalog store unavailable")]
    StoreUnavailable,
    /// Bootstrapping the schema failed.
    #[display("catalog schema bootstrap failed")]
    Schema,
    #[display("database error")]
    Database,
    /// A scan's batched mutations failed and were rolled back. The catalog is
    /// exactly as it was before the scan started.
    #[display("catalog transaction failed")]
    Transaction,
    /// A stored value could not be converted into the typed model.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The restore candidate was rejected before anything live was touched.
    #[display("invalid restore source: {_0}")]
    InvalidRestoreSource(#[error(not(source))] String),
    /// The close/copy/reopen sequence failed part way through. The live
    /// store should be treated as suspect until verified.
    #[display("restore failed: {_0}")]
    RestoreSwap(#[error(not(source))] String),
    #[display("snapshot could not be written")]
    Snapshot,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transaction | Self::Snapshot)
    }
}
