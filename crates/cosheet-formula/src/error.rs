//! Formula error types
//!
//! These are typed error *values*: a cell whose expression fails carries one of them as its
//! error state and reads as null to its dependents.

use thiserror::Error;

/// Result type for formula evaluation
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FormulaError {
    /// Unmatched '(' or ')'
    #[error("Invalid use of parentheses")]
    WrongParentheses,

    /// Text that does not form a valid expression
    #[error("Invalid Expression")]
    InvalidExpression,

    /// An operand of a binary formula has no value
    #[error("Missing operand")]
    NullOperand,

    /// Operands of the wrong type for the operator or function
    #[error("Illegal operands")]
    IllegalOperands,

    /// A number combined with text
    #[error("Mixed values")]
    MixedValues,

    /// A range that covers a cell without a value, or leaves the grid
    #[error("Invalid Range")]
    InvalidRange,

    /// A reference to an address outside the grid
    #[error("Invalid reference")]
    InvalidReference,

    /// The cell takes part in a reference cycle
    #[error("Circular reference")]
    CircularReference,
}
