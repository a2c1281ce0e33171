//! Row and column insertion and deletion
//!
//! Each operation runs in three steps:
//! 1. rewrite references in every input, reading the coordinates from before the edit
//! 2. relocate cells (and dependency edges) past the pivot, adding or removing a frontier line
//! 3. resubmit rewritten inputs at their new addresses, which recalculates downstream cells

use std::collections::{BTreeMap, BTreeSet};

use cosheet_core::{CellAddress, Error as CoreError, User, MAX_COLS, MAX_ROWS};
use cosheet_formula::{shift_references, Axis};

use crate::cell::Cell;
use crate::error::Result;
use crate::spreadsheet::{RecalcStats, Spreadsheet};

impl Spreadsheet {
    /// Insert an empty row before `index` (0-based; `index == rows` appends)
    pub fn insert_row(&mut self, index: u32, author: &User) -> Result<RecalcStats> {
        if index > self.rows || self.rows >= MAX_ROWS {
            return Err(CoreError::RowOutOfBounds(index, self.rows).into());
        }
        self.insert_line(Axis::Row, index, author)
    }

    /// Insert an empty column before `index` (0-based; `index == cols` appends)
    pub fn insert_column(&mut self, index: u32, author: &User) -> Result<RecalcStats> {
        if index > u32::from(self.cols) || self.cols >= MAX_COLS {
            return Err(CoreError::ColumnOutOfBounds(index, self.cols).into());
        }
        self.insert_line(Axis::Column, index, author)
    }

    /// Delete the row at `index` (0-based)
    pub fn delete_row(&mut self, index: u32, author: &User) -> Result<RecalcStats> {
        if index >= self.rows {
            return Err(CoreError::RowOutOfBounds(index, self.rows).into());
        }
        self.delete_line(Axis::Row, index, author)
    }

    /// Delete the column at `index` (0-based)
    pub fn delete_column(&mut self, index: u32, author: &User) -> Result<RecalcStats> {
        if index >= u32::from(self.cols) {
            return Err(CoreError::ColumnOutOfBounds(index, self.cols).into());
        }
        self.delete_line(Axis::Column, index, author)
    }

    fn insert_line(&mut self, axis: Axis, index: u32, author: &User) -> Result<RecalcStats> {
        log::debug!("insert {:?} at {} by {}", axis, index, author);
        let rewrites = self.rewrites(axis, index, 1, |_| true);

        let relocate = |addr: CellAddress| Some(shift_address(addr, axis, index, 1));
        let old = std::mem::take(&mut self.cells);
        self.cells = old
            .into_iter()
            .filter_map(|(addr, cell)| relocate(addr).map(|a| (a, cell)))
            .collect();
        self.graph.remap(relocate);

        match axis {
            Axis::Row => {
                for col in 0..self.cols {
                    self.cells.insert(CellAddress::new(index, col), Cell::new());
                }
                self.rows += 1;
            }
            Axis::Column => {
                for row in 0..self.rows {
                    self.cells
                        .insert(CellAddress::new(row, index as u16), Cell::new());
                }
                self.cols += 1;
            }
        }

        self.resubmit(rewrites, BTreeSet::new(), relocate, author)
    }

    fn delete_line(&mut self, axis: Axis, index: u32, author: &User) -> Result<RecalcStats> {
        log::debug!("delete {:?} at {} by {}", axis, index, author);
        let rewrites = self.rewrites(axis, index, -1, |addr| coordinate(addr, axis) != index);

        // Cells that lose an edge to a deleted cell but whose text does not change
        let mut orphaned = BTreeSet::new();
        for (addr, _) in self.cells() {
            if coordinate(addr, axis) != index
                && self
                    .graph
                    .precedents(addr)
                    .any(|p| coordinate(p, axis) == index)
            {
                orphaned.insert(addr);
            }
        }

        let relocate = |addr: CellAddress| {
            if coordinate(addr, axis) == index {
                None
            } else {
                Some(shift_address(addr, axis, index, -1))
            }
        };
        let old = std::mem::take(&mut self.cells);
        self.cells = old
            .into_iter()
            .filter_map(|(addr, cell)| relocate(addr).map(|a| (a, cell)))
            .collect();
        self.graph.remap(relocate);

        match axis {
            Axis::Row => self.rows -= 1,
            Axis::Column => self.cols -= 1,
        }

        self.resubmit(rewrites, orphaned, relocate, author)
    }

    /// Rewritten inputs, keyed by pre-edit address, for cells whose text changes
    fn rewrites<F>(
        &self,
        axis: Axis,
        index: u32,
        delta: i64,
        keep: F,
    ) -> BTreeMap<CellAddress, String>
    where
        F: Fn(CellAddress) -> bool,
    {
        self.cells()
            .filter(|(addr, _)| keep(*addr))
            .filter_map(|(addr, cell)| {
                let rewritten = shift_references(cell.input(), axis, index, delta);
                (rewritten != cell.input()).then_some((addr, rewritten))
            })
            .collect()
    }

    fn resubmit<F>(
        &mut self,
        rewrites: BTreeMap<CellAddress, String>,
        orphaned: BTreeSet<CellAddress>,
        relocate: F,
        author: &User,
    ) -> Result<RecalcStats>
    where
        F: Fn(CellAddress) -> Option<CellAddress>,
    {
        let mut stats = RecalcStats::default();
        for (old, text) in &rewrites {
            if let Some(addr) = relocate(*old) {
                stats.absorb(self.update_contents_at(addr, text, author)?);
            }
        }
        for old in orphaned {
            if rewrites.contains_key(&old) {
                continue;
            }
            if let Some(addr) = relocate(old) {
                stats.absorb(self.refresh(addr));
            }
        }
        Ok(stats)
    }
}

fn coordinate(addr: CellAddress, axis: Axis) -> u32 {
    match axis {
        Axis::Row => addr.row,
        Axis::Column => u32::from(addr.col),
    }
}

/// Move an address at or past `index` by `delta` along `axis`
fn shift_address(addr: CellAddress, axis: Axis, index: u32, delta: i32) -> CellAddress {
    if coordinate(addr, axis) < index {
        return addr;
    }
    match axis {
        Axis::Row => CellAddress::new(addr.row.saturating_add_signed(delta), addr.col),
        Axis::Column => CellAddress::new(
            addr.row,
            addr.col.saturating_add_signed(delta as i16),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet_with(rows: u32, cols: u16, inputs: &[(&str, &str)]) -> Spreadsheet {
        let alice = User::from_id("alice");
        Spreadsheet::from_inputs(
            rows,
            cols,
            inputs
                .iter()
                .map(|(a, t)| (CellAddress::parse(a).unwrap(), *t)),
            &alice,
        )
        .unwrap()
    }

    fn input(sheet: &Spreadsheet, addr: &str) -> String {
        sheet.cell(addr).unwrap().input().to_string()
    }

    #[test]
    fn test_insert_row_moves_cells_and_references() {
        let alice = User::from_id("alice");
        let mut sheet = sheet_with(
            3,
            2,
            &[("A1", "1"), ("A2", "2"), ("B1", "=REF(A2)*10")],
        );

        sheet.insert_row(1, &alice).unwrap();

        assert_eq!(sheet.dimensions(), (4, 2));
        assert_eq!(input(&sheet, "A1"), "1");
        assert_eq!(input(&sheet, "A2"), "");
        assert_eq!(input(&sheet, "A3"), "2");
        assert_eq!(input(&sheet, "B1"), "=REF(A3)*10");
        assert_eq!(sheet.value("B1").unwrap().as_number(), Some(20.0));
        assert!(sheet.graph().is_consistent());
    }

    #[test]
    fn test_insert_column_at_end_appends() {
        let alice = User::from_id("alice");
        let mut sheet = sheet_with(1, 2, &[("B1", "x")]);
        sheet.insert_column(2, &alice).unwrap();
        assert_eq!(sheet.dimensions(), (1, 3));
        assert_eq!(input(&sheet, "B1"), "x");
        assert_eq!(input(&sheet, "C1"), "");
    }

    #[test]
    fn test_delete_column_moves_cells_left() {
        let alice = User::from_id("alice");
        let mut sheet = sheet_with(
            1,
            3,
            &[("A1", "=REF(C1)+1"), ("B1", "9"), ("C1", "4")],
        );

        sheet.delete_column(1, &alice).unwrap();

        assert_eq!(sheet.dimensions(), (1, 2));
        assert_eq!(input(&sheet, "B1"), "4");
        assert_eq!(input(&sheet, "A1"), "=REF(B1)+1");
        assert_eq!(sheet.value("A1").unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_delete_first_row_refreshes_saturated_reference() {
        let alice = User::from_id("alice");
        let mut sheet = sheet_with(
            3,
            2,
            &[("A1", "5"), ("A2", "7"), ("B2", "=REF(A1)")],
        );

        sheet.delete_row(0, &alice).unwrap();

        // B2 moved to B1; its reference saturates at row 1, which now holds the old A2
        assert_eq!(input(&sheet, "B1"), "=REF(A1)");
        assert_eq!(input(&sheet, "A1"), "7");
        assert_eq!(sheet.value("B1").unwrap().as_number(), Some(7.0));
        assert_eq!(
            sheet.dependencies(CellAddress::new(0, 1)),
            vec![CellAddress::new(0, 0)]
        );
        assert!(sheet.graph().is_consistent());
    }

    #[test]
    fn test_out_of_bounds() {
        let alice = User::from_id("alice");
        let mut sheet = Spreadsheet::new(2, 2);
        assert!(sheet.insert_row(3, &alice).is_err());
        assert!(sheet.delete_row(2, &alice).is_err());
        assert!(sheet.delete_column(2, &alice).is_err());
        assert_eq!(sheet.dimensions(), (2, 2));
    }
}
