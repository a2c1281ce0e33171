//! # cosheet-formula
//!
//! Formula parser and evaluator for cosheet.
//!
//! This crate provides:
//! - Formula parsing (text → [`Expression`])
//! - Formula evaluation (expression → [`Value`](cosheet_core::Value)) against a [`CellLookup`]
//! - Dependency tracking for recalculation, with cycle detection
//! - Reference rewriting for row/column insertion and deletion
//!
//! ## Example
//!
//! ```rust
//! use cosheet_core::Value;
//! use cosheet_formula::{evaluate, parse_input, NoCells};
//!
//! let expr = parse_input("=2*3+4");
//! assert_eq!(evaluate(&expr, &NoCells), Ok(Value::Number(14.0)));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod rewrite;

pub use ast::{AggregateFunction, BinaryOperator, Expression};
pub use dependency::{DependencyGraph, RecalcOrder};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{display, evaluate, CellLookup, NoCells};
pub use parser::{is_formula, parse_formula, parse_input, MAX_NESTING};
pub use rewrite::{shift_references, Axis};
