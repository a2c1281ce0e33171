//! Prelude module - common imports for cosheet users
//!
//! ```rust
//! use cosheet::prelude::*;
//! ```

pub use crate::{
    CellAddress,
    CellRange,
    // Collaboration
    CollaborationManager,
    // Error types
    Error,
    FormulaError,
    MergeConflictResolver,
    MergeError,
    // Calculation types
    RecalcStats,
    Result,
    SheetSnapshot,
    SheetSyncer,
    // Main types
    Spreadsheet,
    User,
    Value,
};
