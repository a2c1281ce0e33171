//! Formula evaluator
//!
//! Evaluates expression trees against a grid exposed through [`CellLookup`].

use cosheet_core::{CellAddress, CellRange, Value};

use crate::ast::{AggregateFunction, BinaryOperator, Expression};
use crate::error::{FormulaError, FormulaResult};

/// Read access to the grid a formula is evaluated against
pub trait CellLookup {
    /// Whether the address lies inside the grid
    fn contains(&self, addr: &CellAddress) -> bool;

    /// Current value of a cell; an empty or erroring cell reads as [`Value::Null`]
    fn value(&self, addr: &CellAddress) -> Value;
}

/// A lookup with no cells, for formulas without references
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCells;

impl CellLookup for NoCells {
    fn contains(&self, _addr: &CellAddress) -> bool {
        false
    }

    fn value(&self, _addr: &CellAddress) -> Value {
        Value::Null
    }
}

/// Evaluate an expression
pub fn evaluate<L: CellLookup + ?Sized>(expr: &Expression, ctx: &L) -> FormulaResult<Value> {
    match expr {
        Expression::Empty => Ok(Value::Null),
        Expression::Number(n) => Ok(Value::Number(*n)),
        Expression::Text(s) => Ok(Value::Text(s.clone())),
        Expression::Error(e) => Err(*e),

        Expression::Reference(addr) => {
            if !ctx.contains(addr) {
                return Err(FormulaError::InvalidReference);
            }
            Ok(ctx.value(addr))
        }

        Expression::Aggregate { function, range } => evaluate_aggregate(*function, range, ctx),

        Expression::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            evaluate_binary(*op, left, right)
        }
    }
}

/// Evaluate an expression and render the result, or the error message, for display
pub fn display<L: CellLookup + ?Sized>(expr: &Expression, ctx: &L) -> String {
    match evaluate(expr, ctx) {
        Ok(value) => value.display(),
        Err(e) => e.to_string(),
    }
}

fn evaluate_binary(op: BinaryOperator, left: Value, right: Value) -> FormulaResult<Value> {
    if left.is_null() || right.is_null() {
        return Err(FormulaError::NullOperand);
    }

    match (op, left, right) {
        (BinaryOperator::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
        (BinaryOperator::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (BinaryOperator::Add, _, _) => Err(FormulaError::MixedValues),
        (op, Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
            BinaryOperator::Add => a + b,
            BinaryOperator::Subtract => a - b,
            BinaryOperator::Multiply => a * b,
            BinaryOperator::Divide => a / b,
            BinaryOperator::Power => a.powf(b),
        })),
        _ => Err(FormulaError::IllegalOperands),
    }
}

fn evaluate_aggregate<L: CellLookup + ?Sized>(
    function: AggregateFunction,
    range: &CellRange,
    ctx: &L,
) -> FormulaResult<Value> {
    // Spans are normalized, so two corners inside means every cell is
    if !ctx.contains(&range.start) || !ctx.contains(&range.end) {
        return Err(FormulaError::InvalidRange);
    }

    let (mut sum, mut min, mut max) = (0.0, f64::INFINITY, f64::NEG_INFINITY);
    for addr in range.cells() {
        match ctx.value(&addr) {
            Value::Null => return Err(FormulaError::InvalidRange),
            Value::Text(_) => return Err(FormulaError::IllegalOperands),
            Value::Number(n) => {
                sum += n;
                min = min.min(n);
                max = max.max(n);
            }
        }
    }

    let result = match function {
        AggregateFunction::Sum => sum,
        AggregateFunction::Avg => sum / range.cell_count() as f64,
        AggregateFunction::Min => min,
        AggregateFunction::Max => max,
    };
    Ok(Value::Number(result))
}
