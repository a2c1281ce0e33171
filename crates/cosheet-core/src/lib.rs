//! # cosheet-core
//!
//! Core data structures for the cosheet collaborative spreadsheet engine.
//!
//! This crate provides the fundamental types used throughout cosheet:
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and the base-26 column codec
//! - [`Value`] - The computed value of a cell
//! - [`User`] - The author of an edit
//! - [`VersionHistory`] - The branching per-cell history of content changes
//!
//! ## Example
//!
//! ```rust
//! use cosheet_core::{CellAddress, User, VersionHistory};
//!
//! let addr: CellAddress = "C12".parse().unwrap();
//! assert_eq!((addr.column_number(), addr.row_number()), (3, 12));
//!
//! let alice = User::new("Alice", "alice@example.com");
//! let mut history = VersionHistory::new();
//! let first = history.add_entry("=1+1", &alice);
//! history.add_entry("=2+2", &alice);
//! history.revert(first).unwrap();
//! history.add_entry("=3+3", &alice);
//! assert_eq!(history.branch_count(), 2);
//! ```

pub mod cell;
pub mod error;
pub mod user;
pub mod version;

// Re-exports for convenience
pub use cell::{CellAddress, CellRange, CellRangeIterator, Value};
pub use error::{Error, Result};
pub use user::User;
pub use version::{Branch, BranchParent, ContentHash, EntryId, VersionEntry, VersionHistory};

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u16 = 16_384;
