//! Two-sheet merge
//!
//! A [`CollaborationManager`] reconciles two independently edited snapshots. Addresses where
//! both sides hold different non-empty input become [`MergeConflict`]s and are settled by a
//! [`MergeConflictResolver`]; everything else merges directly.

use std::collections::{BTreeMap, BTreeSet};

use cosheet_core::{CellAddress, Error as CoreError, User, Value};

use crate::error::Result;
use crate::resolver::{MergeConflictResolver, MergeError};
use crate::spreadsheet::{RecalcStats, Spreadsheet};

/// Input and value of one cell at snapshot time
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellSnapshot {
    pub input: String,
    pub value: Value,
}

impl CellSnapshot {
    /// Snapshot carrying only an input
    pub fn input<S: Into<String>>(input: S) -> Self {
        Self {
            input: input.into(),
            value: Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.trim().is_empty()
    }
}

/// The non-empty cells of a grid plus its dimensions
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetSnapshot {
    pub rows: u32,
    pub cols: u16,
    pub cells: BTreeMap<CellAddress, CellSnapshot>,
}

impl SheetSnapshot {
    /// An empty snapshot of the given size
    pub fn new(rows: u32, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of an input; grows the dimensions to cover the address
    pub fn with_input<S: Into<String>>(mut self, addr: CellAddress, input: S) -> Self {
        self.rows = self.rows.max(addr.row + 1);
        self.cols = self.cols.max(addr.col + 1);
        self.cells.insert(addr, CellSnapshot::input(input));
        self
    }

    pub fn get(&self, addr: &CellAddress) -> Option<&CellSnapshot> {
        self.cells.get(addr)
    }

    /// Move every cell by the pivot's row and column
    ///
    /// Returns `None` when a cell would leave the addressable area.
    pub fn offset(&self, pivot: CellAddress) -> Option<SheetSnapshot> {
        let mut cells = BTreeMap::new();
        for (addr, cell) in &self.cells {
            let moved = addr.offset(i64::from(pivot.row), i64::from(pivot.col))?;
            cells.insert(moved, cell.clone());
        }
        Some(SheetSnapshot {
            rows: self.rows.checked_add(pivot.row)?,
            cols: self.cols.checked_add(pivot.col)?,
            cells,
        })
    }
}

/// An address where both sides hold different non-empty input
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeConflict {
    pub address: CellAddress,
    pub left: CellSnapshot,
    pub right: CellSnapshot,
}

impl MergeConflict {
    /// The side chosen by a decision
    pub fn take(&self, keep_left: bool) -> CellSnapshot {
        if keep_left {
            self.left.clone()
        } else {
            self.right.clone()
        }
    }
}

/// Partition of a merge into settled cells and conflicts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergePlan {
    /// Cells that merge without a decision
    pub merged: BTreeMap<CellAddress, CellSnapshot>,
    /// Cells that need a decision, in address order
    pub conflicts: Vec<MergeConflict>,
    /// Rows of the merged grid
    pub rows: u32,
    /// Columns of the merged grid
    pub cols: u16,
}

/// Reconciles two snapshots into one
#[derive(Debug, Clone)]
pub struct CollaborationManager {
    left: SheetSnapshot,
    right: SheetSnapshot,
}

impl CollaborationManager {
    pub fn new(left: SheetSnapshot, right: SheetSnapshot) -> Self {
        Self { left, right }
    }

    /// Split the union of both sides into merged cells and conflicts
    pub fn plan(&self) -> MergePlan {
        let addresses: BTreeSet<CellAddress> = self
            .left
            .cells
            .keys()
            .chain(self.right.cells.keys())
            .copied()
            .collect();

        let mut plan = MergePlan {
            rows: self.left.rows.max(self.right.rows),
            cols: self.left.cols.max(self.right.cols),
            ..MergePlan::default()
        };

        for address in addresses {
            let left = self.left.get(&address).filter(|c| !c.is_empty());
            let right = self.right.get(&address).filter(|c| !c.is_empty());
            match (left, right) {
                (Some(l), Some(r)) if l.input != r.input => plan.conflicts.push(MergeConflict {
                    address,
                    left: l.clone(),
                    right: r.clone(),
                }),
                (Some(cell), _) | (None, Some(cell)) => {
                    plan.merged.insert(address, cell.clone());
                }
                (None, None) => {}
            }
        }
        plan
    }

    /// Merge both sides, handing conflicts to `resolver`
    pub fn merge(
        &self,
        resolver: &mut MergeConflictResolver,
    ) -> std::result::Result<SheetSnapshot, MergeError> {
        let plan = self.plan();
        log::debug!(
            "merging {} cells with {} conflicts",
            plan.merged.len(),
            plan.conflicts.len()
        );

        resolver.add_conflicts(plan.conflicts);
        let resolved = resolver.resolve()?;

        let mut cells = plan.merged;
        cells.extend(resolved);
        Ok(SheetSnapshot {
            rows: plan.rows,
            cols: plan.cols,
            cells,
        })
    }
}

impl Spreadsheet {
    /// Merge another sheet's content into this one, with its top-left cell placed at `pivot`
    ///
    /// Inputs are copied verbatim. The grid grows to cover the incoming cells, conflicts go to
    /// `resolver`, and nothing changes unless every conflict is decided.
    pub fn import(
        &mut self,
        source: &SheetSnapshot,
        pivot: CellAddress,
        author: &User,
        resolver: &mut MergeConflictResolver,
    ) -> Result<RecalcStats> {
        let incoming = source
            .offset(pivot)
            .ok_or_else(|| CoreError::InvalidAddress(format!("cannot place sheet at {}", pivot)))?;
        let merged = CollaborationManager::new(self.snapshot(), incoming).merge(resolver)?;

        let mut stats = self.ensure_size(merged.rows, merged.cols);
        for (addr, cell) in &merged.cells {
            stats.absorb(self.update_contents_at(*addr, &cell.input, author)?);
        }
        log::debug!("imported {} cells at {} by {}", source.cells.len(), pivot, author);
        Ok(stats)
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
    fn test_plan_disjoint() {
        let left = SheetSnapshot::new(2, 2).with_input(addr("A1"), "1");
        let right = SheetSnapshot::new(3, 1).with_input(addr("A3"), "3");

        let plan = CollaborationManager::new(left, right).plan();

        assert!(plan.conflicts.is_empty());
        assert_eq!(plan.merged.len(), 2);
        assert_eq!((plan.rows, plan.cols), (3, 2));
    }

    #[test]
    fn test_plan_identical_and_empty_sides() {
        let left = SheetSnapshot::new(1, 2)
            .with_input(addr("A1"), "same")
            .with_input(addr("B1"), "");
        let right = SheetSnapshot::new(1, 2)
            .with_input(addr("A1"), "same")
            .with_input(addr("B1"), "kept");

        let plan = CollaborationManager::new(left, right).plan();

        assert!(plan.conflicts.is_empty());
        assert_eq!(plan.merged[&addr("A1")].input, "same");
        assert_eq!(plan.merged[&addr("B1")].input, "kept");
    }

    #[test]
    fn test_plan_conflict() {
        let left = SheetSnapshot::default()
            .with_input(addr("A1"), "left")
            .with_input(addr("A2"), "x");
        let right = SheetSnapshot::default()
            .with_input(addr("A1"), "right")
            .with_input(addr("A2"), "x");

        let plan = CollaborationManager::new(left, right).plan();

        assert_eq!(plan.conflicts.len(), 1);
        let conflict = &plan.conflicts[0];
        assert_eq!(conflict.address, addr("A1"));
        assert_eq!(conflict.take(true).input, "left");
        assert_eq!(conflict.take(false).input, "right");
    }

    #[test]
    fn test_offset() {
        let snapshot = SheetSnapshot::new(2, 2).with_input(addr("B2"), "x");
        let moved = snapshot.offset(addr("C3")).unwrap();
        assert_eq!((moved.rows, moved.cols), (4, 4));
        assert_eq!(moved.get(&addr("D4")).map(|c| c.input.as_str()), Some("x"));
    }
}
