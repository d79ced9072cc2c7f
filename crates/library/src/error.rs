//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a library failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Scan`]
/// - [`ErrorKind::RestoreRejected`]
/// - [`ErrorKind::RestoreFailed`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Config`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reconciling the catalog against the library root failed; the catalog
    /// is unchanged.
    #[display("library scan failed")]
    Scan,
    /// The catalog could not be opened or queried.
    #[display("catalog operation failed")]
    Catalog,
    /// The configuration handed to [`Library::open`](crate::Library::open)
    /// is unusable.
    #[display("invalid library configuration")]
    Config,
    /// The uploaded file was refused before the live catalog was touched.
    #[display("restore rejected: {_0}")]
    RestoreRejected(#[error(not(source))] String),
    /// Replacing the live catalog failed.
    #[display("restore failed")]
    RestoreFailed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan)
    }
}
