//! Formula parser
//!
//! Operators group left to right: the *first* operator found at the top level (outside any
//! parentheses) splits the text, and each side is parsed recursively. There is no precedence
//! table, so `2*3+4` parses as `2*(3+4)`.

use cosheet_core::{CellAddress, CellRange};
use lazy_regex::regex;

use crate::ast::{AggregateFunction, BinaryOperator, Expression};
use crate::error::FormulaError;

/// Most operators and opening parentheses a formula may contain
///
/// Both parsing and evaluation recurse once per operator or group, so this bounds their depth.
pub const MAX_NESTING: usize = 256;

/// Parse a formula body (without the leading '=') into an expression tree
///
/// Parse failures do not return `Err`; they are encoded as [`Expression::Error`] so a cell can
/// carry them as its error state.
///
/// # Example
/// ```rust
/// use cosheet_formula::{parse_formula, Expression, FormulaError};
///
/// assert_eq!(parse_formula("42"), Expression::Number(42.0));
/// assert!(matches!(parse_formula("SUM(A1:A3)"), Expression::Aggregate { .. }));
/// assert_eq!(parse_formula("(1+2"), Expression::Error(FormulaError::WrongParentheses));
/// ```
pub fn parse_formula(text: &str) -> Expression {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return Expression::Empty;
    }
    if !parentheses_balanced(&text) {
        return Expression::Error(FormulaError::WrongParentheses);
    }
    let nesting = text
        .chars()
        .filter(|&c| c == '(' || BinaryOperator::from_char(c).is_some())
        .count();
    if nesting > MAX_NESTING {
        return Expression::Error(FormulaError::InvalidExpression);
    }
    parse_balanced(&text)
}

/// Parse raw cell input
///
/// Input whose first non-blank character is '=' is a formula. Anything else is a literal: blank
/// input is empty, a number is numeric and all other text is kept verbatim.
pub fn parse_input(raw: &str) -> Expression {
    if let Some(body) = raw.trim_start().strip_prefix('=') {
        return parse_formula(body);
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Expression::Empty
    } else if let Some(n) = parse_number(trimmed) {
        Expression::Number(n)
    } else {
        Expression::Text(raw.to_string())
    }
}

/// Whether the raw input is a formula
pub fn is_formula(raw: &str) -> bool {
    raw.trim_start().starts_with('=')
}

fn parentheses_balanced(text: &str) -> bool {
    let mut depth: usize = 0;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Parse text whose parentheses are known to balance
fn parse_balanced(text: &str) -> Expression {
    if let Some((pos, op)) = find_top_level_operator(text) {
        let left = parse_balanced(&text[..pos]);
        let right = parse_balanced(&text[pos + 1..]);
        return Expression::binary(op, left, right);
    }

    if text.starts_with('(') {
        return match matching_close(text) {
            // "()" has nothing to classify
            Some(1) => Expression::Error(FormulaError::InvalidExpression),
            Some(close) if close == text.len() - 1 => parse_balanced(&text[1..close]),
            _ => Expression::Error(FormulaError::InvalidExpression),
        };
    }

    classify_token(text)
}

fn find_top_level_operator(text: &str) -> Option<(usize, BinaryOperator)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                if let Some(op) = BinaryOperator::from_char(c) {
                    return Some((i, op));
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte index of the ')' closing the '(' at index 0
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn classify_token(token: &str) -> Expression {
    if token.is_empty() {
        return Expression::Empty;
    }

    if let Some(n) = parse_number(token) {
        return Expression::Number(n);
    }

    if let Some(caps) = regex!(r"^([A-Z]+)\(([A-Za-z]+\d+):([A-Za-z]+\d+)\)$").captures(token) {
        let Some(function) = AggregateFunction::from_name(&caps[1]) else {
            return Expression::Error(FormulaError::InvalidExpression);
        };
        return match (CellAddress::parse(&caps[2]), CellAddress::parse(&caps[3])) {
            (Ok(start), Ok(end)) => Expression::Aggregate {
                function,
                range: CellRange::new(start, end),
            },
            _ => Expression::Error(FormulaError::InvalidRange),
        };
    }

    if let Some(caps) = regex!(r"^REF\(([A-Za-z]+\d+)\)$").captures(token) {
        return match CellAddress::parse(&caps[1]) {
            Ok(addr) => Expression::Reference(addr),
            Err(_) => Expression::Error(FormulaError::InvalidReference),
        };
    }

    if regex!(r"^[A-Za-z]+\d+$").is_match(token) {
        if let Ok(addr) = CellAddress::parse(token) {
            return Expression::Reference(addr);
        }
    }

    if token.contains(['(', ')']) {
        return Expression::Error(FormulaError::InvalidExpression);
    }

    Expression::Text(token.to_string())
}

fn parse_number(token: &str) -> Option<f64> {
    if regex!(r"^-?\d*\.?\d+$").is_match(token) {
        token.parse().ok()
    } else {
        None
    }
}
