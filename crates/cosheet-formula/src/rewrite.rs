//! Reference rewriting for structural edits
//!
//! When a row or column is inserted or deleted, every reference at or beyond the pivot moves
//! with the cells it points at. The rewrite works on raw input text and must run against the
//! coordinates from before the relocation.

use cosheet_core::CellAddress;
use lazy_regex::regex;
use regex::Captures;

use crate::parser::is_formula;

/// Axis of a structural edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

/// Shift every reference in `input` whose coordinate on `axis` is at least `index` (0-based)
/// by `delta`, saturating at the first row/column
///
/// `REF(<addr>)` is rewritten in any input. Formula input (leading '=') additionally has its
/// bare references and aggregate spans rewritten. A span losing a line it covers shrinks: on a
/// delete its far edge pulls in while its near edge stays. Addresses that do not decode are left
/// as they are.
///
/// # Example
/// ```rust
/// use cosheet_formula::{shift_references, Axis};
///
/// assert_eq!(shift_references("=REF(A3)+REF(A1)", Axis::Row, 1, 1), "=REF(A4)+REF(A1)");
/// assert_eq!(shift_references("=SUM(B1:D1)", Axis::Column, 2, -1), "=SUM(B1:C1)");
/// assert_eq!(shift_references("=SUM(A2:A3)", Axis::Row, 1, -1), "=SUM(A2:A2)");
/// ```
pub fn shift_references(input: &str, axis: Axis, index: u32, delta: i64) -> String {
    if is_formula(input) {
        regex!(r"\b([A-Za-z]+\d+)(?::([A-Za-z]+\d+))?\b")
            .replace_all(input, |caps: &Captures| {
                let shifted = match caps.get(2) {
                    Some(end) => shift_span(&caps[1], end.as_str(), axis, index, delta),
                    None => shift_token(&caps[1], axis, index, delta),
                };
                shifted.unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    } else {
        regex!(r"REF\(([A-Za-z]+\d+)\)")
            .replace_all(input, |caps: &Captures| {
                match shift_token(&caps[1], axis, index, delta) {
                    Some(addr) => format!("REF({})", addr),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// An address token split into its column letters (as written) and decoded address
fn decode(token: &str) -> Option<(&str, CellAddress)> {
    let digits = token.find(|c: char| c.is_ascii_digit())?;
    let addr = CellAddress::parse(token).ok()?;
    Some((&token[..digits], addr))
}

fn coordinate(addr: CellAddress, axis: Axis) -> u32 {
    match axis {
        Axis::Row => addr.row,
        Axis::Column => u32::from(addr.col),
    }
}

fn shift_coordinate(coord: u32, index: u32, delta: i64) -> u32 {
    if coord < index {
        coord
    } else {
        (i64::from(coord) + delta).clamp(0, i64::from(u32::MAX)) as u32
    }
}

/// Render `addr` moved to `coord` on `axis`; row moves keep the column letters as written
fn render(letters: &str, addr: CellAddress, axis: Axis, coord: u32) -> Option<String> {
    match axis {
        Axis::Row => Some(format!("{}{}", letters, u64::from(coord) + 1)),
        Axis::Column => {
            let col = u16::try_from(coord).ok()?;
            Some(format!(
                "{}{}",
                CellAddress::column_to_letters(col),
                addr.row + 1
            ))
        }
    }
}

fn shift_token(token: &str, axis: Axis, index: u32, delta: i64) -> Option<String> {
    let (letters, addr) = decode(token)?;
    let coord = coordinate(addr, axis);
    if coord < index {
        return None;
    }
    render(letters, addr, axis, shift_coordinate(coord, index, delta))
}

fn shift_span(first: &str, second: &str, axis: Axis, index: u32, delta: i64) -> Option<String> {
    let (first_letters, first_addr) = decode(first)?;
    let (second_letters, second_addr) = decode(second)?;
    let (a, b) = (coordinate(first_addr, axis), coordinate(second_addr, axis));
    let (lo, hi) = (a.min(b), a.max(b));
    if hi < index {
        return None;
    }

    let (new_lo, new_hi) = if delta < 0 && lo < hi && (lo..=hi).contains(&index) {
        // Deleting a covered line: the near edge stays, the far edge pulls in
        (lo, shift_coordinate(hi, index, delta).max(lo))
    } else {
        (
            shift_coordinate(lo, index, delta),
            shift_coordinate(hi, index, delta),
        )
    };
    let (new_a, new_b) = if a <= b {
        (new_lo, new_hi)
    } else {
        (new_hi, new_lo)
    };

    Some(format!(
        "{}:{}",
        render(first_letters, first_addr, axis, new_a)?,
        render(second_letters, second_addr, axis, new_b)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_insert_shifts_at_and_after_pivot() {
        // Insert at index 1 (row 2)
        assert_eq!(
            shift_references("=REF(A1)+REF(A2)+REF(B7)", Axis::Row, 1, 1),
            "=REF(A1)+REF(A3)+REF(B8)"
        );
    }

    #[test]
    fn test_row_delete_saturates() {
        assert_eq!(shift_references("=REF(C1)", Axis::Row, 0, -1), "=REF(C1)");
        assert_eq!(shift_references("=REF(C5)", Axis::Row, 2, -1), "=REF(C4)");
    }

    #[test]
    fn test_column_shift() {
        assert_eq!(
            shift_references("=REF(A1)*REF(C1)", Axis::Column, 1, 1),
            "=REF(A1)*REF(D1)"
        );
        assert_eq!(shift_references("=REF(Z3)", Axis::Column, 0, 1), "=REF(AA3)");
        assert_eq!(shift_references("=REF(AA3)", Axis::Column, 0, -1), "=REF(Z3)");
    }

    #[test]
    fn test_formula_bare_and_aggregate_references() {
        assert_eq!(
            shift_references("=SUM(A1:A3)+B2", Axis::Row, 1, 1),
            "=SUM(A1:A4)+B3"
        );
        assert_eq!(shift_references("=AVG(A1:C1)", Axis::Column, 0, 2), "=AVG(C1:E1)");
    }

    #[test]
    fn test_delete_inside_span_shrinks_it() {
        // Deleting the first covered row keeps the start where it is
        assert_eq!(shift_references("=SUM(A2:A3)", Axis::Row, 1, -1), "=SUM(A2:A2)");
        // Deleting the last covered row pulls the end in
        assert_eq!(shift_references("=SUM(A2:A3)", Axis::Row, 2, -1), "=SUM(A2:A2)");
        // Endpoints written in reverse keep their order
        assert_eq!(shift_references("=MAX(A5:A2)", Axis::Row, 1, -1), "=MAX(A4:A2)");
        assert_eq!(shift_references("=MIN(B1:D4)", Axis::Column, 1, -1), "=MIN(B1:C4)");
        // Spans wholly past the pivot move, spans before it stay
        assert_eq!(shift_references("=SUM(A4:A6)", Axis::Row, 1, -1), "=SUM(A3:A5)");
        assert_eq!(shift_references("=SUM(A1:A2)", Axis::Row, 5, -1), "=SUM(A1:A2)");
    }

    #[test]
    fn test_delete_of_single_line_span() {
        assert_eq!(shift_references("=SUM(A3:A3)", Axis::Row, 2, -1), "=SUM(A2:A2)");
        assert_eq!(shift_references("=SUM(A1:B1)", Axis::Row, 0, -1), "=SUM(A1:B1)");
    }

    #[test]
    fn test_literal_text_only_rewrites_ref() {
        assert_eq!(shift_references("see A5", Axis::Row, 0, 1), "see A5");
        assert_eq!(shift_references("see REF(A5)", Axis::Row, 0, 1), "see REF(A6)");
    }

    #[test]
    fn test_unchanged_input() {
        let input = "=REF(A1)+hello";
        assert_eq!(shift_references(input, Axis::Row, 3, 1), input);
        assert_eq!(shift_references("42", Axis::Column, 0, 1), "42");
    }
}
