//! Error types for sheet operations

use thiserror::Error;

use crate::resolver::MergeError;

/// Result type for sheet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Spreadsheet`](crate::Spreadsheet) and [`SheetSyncer`](crate::SheetSyncer)
///
/// Formula problems are not errors here: they are carried as a cell's error state.
#[derive(Debug, Error)]
pub enum Error {
    /// Addressing, bounds or history failure
    #[error(transparent)]
    Core(#[from] cosheet_core::Error),

    /// A merge that could not complete
    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),
}

impl Error {
    /// Whether this error is the hard failure of addressing a cell outside the grid
    pub fn is_cell_not_found(&self) -> bool {
        matches!(self, Error::Core(cosheet_core::Error::CellNotFound(_)))
    }
}
