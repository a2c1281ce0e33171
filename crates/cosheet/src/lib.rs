//! # cosheet
//!
//! The computation and consistency core of a multi-user spreadsheet.
//!
//! ## Features
//!
//! - Formula parsing and evaluation with reactive, cycle-safe recalculation
//! - Row and column insertion/deletion that rewrites references
//! - A branching version history per cell
//! - Merging of two independently edited sheets with conflict resolution
//! - An operation log for shipping edits between participants
//!
//! ## Example
//!
//! ```rust
//! use cosheet::prelude::*;
//!
//! let alice = User::new("Alice", "alice@example.com");
//! let mut sheet = Spreadsheet::new(5, 5);
//!
//! sheet.update_contents("A1", "1", &alice).unwrap();
//! sheet.update_contents("A2", "2", &alice).unwrap();
//! sheet.update_contents("A3", "3", &alice).unwrap();
//! sheet.update_contents("B1", "=SUM(A1:A3)", &alice).unwrap();
//! assert_eq!(sheet.cell("B1").unwrap().display(), "6");
//!
//! // Dependents follow their inputs
//! sheet.update_contents("A1", "10", &alice).unwrap();
//! assert_eq!(sheet.cell("B1").unwrap().display(), "15");
//!
//! // References move with the cells they point at
//! sheet.insert_row(0, &alice).unwrap();
//! assert_eq!(sheet.cell("B2").unwrap().input(), "=SUM(A2:A4)");
//! ```

pub mod cell;
pub mod error;
pub mod merge;
pub mod prelude;
pub mod resolver;
pub mod spreadsheet;
pub mod structure;
pub mod sync;

pub use cell::{Cell, CellEvent, SubscriptionId};
pub use error::{Error, Result};
pub use merge::{CellSnapshot, CollaborationManager, MergeConflict, MergePlan, SheetSnapshot};
pub use resolver::{ConflictRequest, MergeConflictResolver, MergeError};
pub use spreadsheet::{RecalcStats, SheetOptions, Spreadsheet};
pub use sync::{Operation, OperationKind, SheetSyncer};

// Re-export core types
pub use cosheet_core::{
    CellAddress, CellRange, EntryId, User, Value, VersionEntry, VersionHistory, MAX_COLS,
    MAX_ROWS,
};

// Re-export formula types
pub use cosheet_formula::{
    evaluate, parse_formula, parse_input, shift_references, Axis, Expression, FormulaError,
};
