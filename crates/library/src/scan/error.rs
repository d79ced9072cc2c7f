//! Error types for the [`scan`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A directory under the library root could not be listed. The scan is
    /// aborted rather than treating its contents as deleted.
    #[display("could not list directory {}", _0.display())]
    Walk(#[error(not(source))] PathBuf),
    /// Reading the current catalog state failed.
    #[display("could not read catalog")]
    Catalog,
    /// Applying the reconciliation plan failed and was rolled back.
    #[display("catalog transaction failed")]
    Transaction,
}
