//! Formula expression tree

use std::fmt;

use ahash::AHashSet;
use cosheet_core::{CellAddress, CellRange};

use crate::error::FormulaError;

/// Formula expression
///
/// A closed set of variants; every tree is immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expression {
    /// No content
    #[default]
    Empty,
    /// Numeric literal
    Number(f64),
    /// Text literal
    Text(String),
    /// Single cell reference
    Reference(CellAddress),
    /// Aggregate function over a rectangular span
    Aggregate {
        function: AggregateFunction,
        range: CellRange,
    },
    /// Binary operation
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Typed error produced while parsing
    Error(FormulaError),
}

impl Expression {
    /// Build a binary node
    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Every address inside a `rows` x `cols` grid that the expression reads, in tree order
    /// (duplicates removed)
    ///
    /// Aggregate spans are clipped to the grid before they are expanded, so an oversized span
    /// costs no more than the grid itself.
    pub fn references_within(&self, rows: u32, cols: u16) -> Vec<CellAddress> {
        let mut refs = Vec::new();
        self.collect_references(rows, cols, &mut refs);
        let mut seen = AHashSet::new();
        refs.retain(|addr| seen.insert(*addr));
        refs
    }

    fn collect_references(&self, rows: u32, cols: u16, out: &mut Vec<CellAddress>) {
        match self {
            Expression::Reference(addr) => {
                if addr.row < rows && addr.col < cols {
                    out.push(*addr);
                }
            }
            Expression::Aggregate { range, .. } => {
                if let Some(clipped) = clip(range, rows, cols) {
                    out.extend(clipped.cells());
                }
            }
            Expression::Binary { left, right, .. } => {
                left.collect_references(rows, cols, out);
                right.collect_references(rows, cols, out);
            }
            Expression::Empty
            | Expression::Number(_)
            | Expression::Text(_)
            | Expression::Error(_) => {}
        }
    }

    /// Whether every reference and span lies wholly inside a `rows` x `cols` grid
    pub fn fits_within(&self, rows: u32, cols: u16) -> bool {
        let inside = |addr: &CellAddress| addr.row < rows && addr.col < cols;
        match self {
            Expression::Reference(addr) => inside(addr),
            Expression::Aggregate { range, .. } => inside(&range.end),
            Expression::Binary { left, right, .. } => {
                left.fits_within(rows, cols) && right.fits_within(rows, cols)
            }
            Expression::Empty
            | Expression::Number(_)
            | Expression::Text(_)
            | Expression::Error(_) => true,
        }
    }

    /// The parse error, if this node is one
    pub fn error(&self) -> Option<FormulaError> {
        match self {
            Expression::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Expression::Empty)
    }
}

/// The part of `range` inside a `rows` x `cols` grid
fn clip(range: &CellRange, rows: u32, cols: u16) -> Option<CellRange> {
    if rows == 0 || cols == 0 || range.start.row >= rows || range.start.col >= cols {
        return None;
    }
    Some(CellRange::from_indices(
        range.start.row,
        range.start.col,
        range.end.row.min(rows - 1),
        range.end.col.min(cols - 1),
    ))
}

/// Renders the canonical formula text (without a leading '=')
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Empty => Ok(()),
            Expression::Number(n) => write!(f, "{}", n),
            Expression::Text(s) => f.write_str(s),
            Expression::Reference(addr) => write!(f, "REF({})", addr),
            Expression::Aggregate { function, range } => {
                write!(f, "{}({}:{})", function.name(), range.start, range.end)
            }
            Expression::Binary { op, left, right } => {
                // Parenthesize nested binaries on the left so re-parsing keeps the shape
                match left.as_ref() {
                    Expression::Binary { .. } => write!(f, "({})", left)?,
                    _ => write!(f, "{}", left)?,
                }
                write!(f, "{}{}", op.symbol(), right)
            }
            Expression::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOperator {
    /// Operator for a character, if it is one of `+ - * / ^`
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOperator::Add),
            '-' => Some(BinaryOperator::Subtract),
            '*' => Some(BinaryOperator::Multiply),
            '/' => Some(BinaryOperator::Divide),
            '^' => Some(BinaryOperator::Power),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            BinaryOperator::Add => '+',
            BinaryOperator::Subtract => '-',
            BinaryOperator::Multiply => '*',
            BinaryOperator::Divide => '/',
            BinaryOperator::Power => '^',
        }
    }
}

/// Aggregate functions over a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Look up a function by its upper-case name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_references_include_whole_span() {
        let expr = Expression::binary(
            BinaryOperator::Add,
            Expression::Reference(addr("C1")),
            Expression::Aggregate {
                function: AggregateFunction::Sum,
                range: CellRange::parse("A1:B2").unwrap(),
            },
        );
        assert_eq!(
            expr.references_within(5, 5),
            vec![addr("C1"), addr("A1"), addr("B1"), addr("A2"), addr("B2")]
        );
    }

    #[test]
    fn test_references_deduplicated() {
        let expr = Expression::binary(
            BinaryOperator::Multiply,
            Expression::Reference(addr("A1")),
            Expression::Reference(addr("A1")),
        );
        assert_eq!(expr.references_within(5, 5), vec![addr("A1")]);
    }

    #[test]
    fn test_references_clipped_to_grid() {
        let whole_sheet = Expression::Aggregate {
            function: AggregateFunction::Sum,
            range: CellRange::parse("A1:XFD1048576").unwrap(),
        };
        assert_eq!(
            whole_sheet.references_within(2, 2),
            vec![addr("A1"), addr("B1"), addr("A2"), addr("B2")]
        );
        assert!(!whole_sheet.fits_within(2, 2));

        let beyond = Expression::binary(
            BinaryOperator::Add,
            Expression::Reference(addr("C3")),
            Expression::Aggregate {
                function: AggregateFunction::Min,
                range: CellRange::parse("D4:E9").unwrap(),
            },
        );
        assert!(beyond.references_within(2, 2).is_empty());
        assert!(!beyond.fits_within(2, 2));
        assert!(beyond.fits_within(9, 5));
        assert!(whole_sheet.references_within(0, 0).is_empty());
    }

    #[test]
    fn test_display() {
        let expr = Expression::binary(
            BinaryOperator::Subtract,
            Expression::binary(
                BinaryOperator::Add,
                Expression::Number(1.0),
                Expression::Reference(addr("B2")),
            ),
            Expression::Aggregate {
                function: AggregateFunction::Max,
                range: CellRange::parse("A1:A3").unwrap(),
            },
        );
        assert_eq!(expr.to_string(), "(1+REF(B2))-MAX(A1:A3)");
    }

    #[test]
    fn test_operator_lookup() {
        assert_eq!(BinaryOperator::from_char('^'), Some(BinaryOperator::Power));
        assert_eq!(BinaryOperator::from_char('%'), None);
        assert_eq!(AggregateFunction::from_name("AVG"), Some(AggregateFunction::Avg));
        assert_eq!(AggregateFunction::from_name("avg"), None);
        assert_eq!(AggregateFunction::from_name("COUNT"), None);
    }
}
