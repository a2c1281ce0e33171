//! The spreadsheet grid
//!
//! Cells live in an arena keyed by address; dependency edges live in a
//! [`DependencyGraph`] beside it. Every edit goes through
//! [`Spreadsheet::update_contents_at`], which re-derives the cell's edges and recalculates
//! everything downstream in dependency order.

use std::collections::BTreeMap;

use cosheet_core::{CellAddress, EntryId, Error as CoreError, User, Value, MAX_COLS, MAX_ROWS};
use cosheet_formula::{evaluate, parse_input, CellLookup, DependencyGraph, FormulaError};

use crate::cell::{Cell, CellEvent, SubscriptionId};
use crate::error::Result;
use crate::merge::{CellSnapshot, SheetSnapshot};

/// Options for creating a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetOptions {
    /// Number of rows (default: 10)
    pub rows: u32,
    /// Number of columns (default: 10)
    pub cols: u16,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self { rows: 10, cols: 10 }
    }
}

/// Statistics from a recalculation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Number of cells evaluated
    pub cells_calculated: usize,
    /// Number of cells found on a reference cycle
    pub circular_references: usize,
    /// Number of cells left in an error state
    pub errors: usize,
}

impl RecalcStats {
    pub(crate) fn absorb(&mut self, other: RecalcStats) {
        self.cells_calculated += other.cells_calculated;
        self.circular_references += other.circular_references;
        self.errors += other.errors;
    }
}

/// A rectangular grid of cells
#[derive(Debug)]
pub struct Spreadsheet {
    pub(crate) cells: BTreeMap<CellAddress, Cell>,
    pub(crate) graph: DependencyGraph,
    pub(crate) rows: u32,
    pub(crate) cols: u16,
    next_subscription: u64,
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::with_options(SheetOptions::default())
    }
}

impl Spreadsheet {
    /// Create an empty grid; dimensions are capped at [`MAX_ROWS`] x [`MAX_COLS`]
    pub fn new(rows: u32, cols: u16) -> Self {
        let mut sheet = Self {
            cells: BTreeMap::new(),
            graph: DependencyGraph::new(),
            rows: 0,
            cols: 0,
            next_subscription: 1,
        };
        sheet.ensure_size(rows, cols);
        sheet
    }

    /// Create an empty grid from options
    pub fn with_options(options: SheetOptions) -> Self {
        Self::new(options.rows, options.cols)
    }

    /// Create a grid and enter the given inputs, in order
    pub fn from_inputs<I, S>(rows: u32, cols: u16, inputs: I, author: &User) -> Result<Self>
    where
        I: IntoIterator<Item = (CellAddress, S)>,
        S: AsRef<str>,
    {
        let mut sheet = Self::new(rows, cols);
        for (addr, input) in inputs {
            sheet.update_contents_at(addr, input.as_ref(), author)?;
        }
        Ok(sheet)
    }

    /// Rebuild a grid from a snapshot, backfilling addresses it does not cover with empty cells
    pub fn from_snapshot(snapshot: &SheetSnapshot, author: &User) -> Result<Self> {
        Self::from_inputs(
            snapshot.rows,
            snapshot.cols,
            snapshot
                .cells
                .iter()
                .map(|(addr, cell)| (*addr, cell.input.as_str())),
            author,
        )
    }

    /// Number of rows and columns
    pub fn dimensions(&self) -> (u32, u16) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Whether an address is inside the grid
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row < self.rows && addr.col < self.cols
    }

    // === Cell Access ===

    /// Get a cell by address string
    ///
    /// Addressing outside the grid is a hard failure ([`CoreError::CellNotFound`]).
    pub fn cell(&self, address: &str) -> Result<&Cell> {
        let addr = CellAddress::parse(address)?;
        self.cell_at(addr)
    }

    /// Get a cell by address
    pub fn cell_at(&self, addr: CellAddress) -> Result<&Cell> {
        self.cells
            .get(&addr)
            .ok_or_else(|| CoreError::CellNotFound(addr.to_string()).into())
    }

    fn cell_mut(&mut self, addr: CellAddress) -> Result<&mut Cell> {
        self.cells
            .get_mut(&addr)
            .ok_or_else(|| CoreError::CellNotFound(addr.to_string()).into())
    }

    /// Current value of a cell by address string
    pub fn value(&self, address: &str) -> Result<Value> {
        Ok(self.cell(address)?.value().clone())
    }

    /// Iterate over all cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.cells.iter().map(|(addr, cell)| (*addr, cell))
    }

    /// Cells the given cell reads
    pub fn dependencies(&self, addr: CellAddress) -> Vec<CellAddress> {
        self.graph.precedents(addr).collect()
    }

    /// Cells that read the given cell
    pub fn dependents(&self, addr: CellAddress) -> Vec<CellAddress> {
        self.graph.dependents(addr).collect()
    }

    /// The dependency graph
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    // === Cell Modification ===

    /// Set a cell's input by address string
    pub fn update_contents(
        &mut self,
        address: &str,
        text: &str,
        author: &User,
    ) -> Result<RecalcStats> {
        let addr = CellAddress::parse(address)?;
        self.update_contents_at(addr, text, author)
    }

    /// Set a cell's input
    ///
    /// A no-op when `text` equals the current input. Otherwise the input is reparsed, the cell's
    /// edges are replaced, a version entry is recorded, and the cell plus everything downstream
    /// is recalculated.
    pub fn update_contents_at(
        &mut self,
        addr: CellAddress,
        text: &str,
        author: &User,
    ) -> Result<RecalcStats> {
        let cell = self.cell_mut(addr)?;
        if cell.input() == text {
            return Ok(RecalcStats::default());
        }
        cell.history_mut().add_entry(text, author);
        log::debug!("{} set to {:?} by {}", addr, text, author);
        Ok(self.apply_input(addr, text))
    }

    /// Clear a cell's input
    pub fn clear_cell(&mut self, addr: CellAddress, author: &User) -> Result<RecalcStats> {
        self.update_contents_at(addr, "", author)
    }

    /// Restore a cell to an earlier version
    ///
    /// The cell shows the entry's content again without recording a new entry; the next edit
    /// forks a branch from that entry.
    pub fn revert(&mut self, addr: CellAddress, entry: EntryId) -> Result<RecalcStats> {
        let cell = self.cell_mut(addr)?;
        cell.history_mut().revert(entry)?;
        let content = cell
            .history()
            .entry(entry)
            .map(|e| e.content().to_string())
            .unwrap_or_default();
        log::debug!("{} reverted to {}", addr, entry);
        if cell.input() == content {
            return Ok(RecalcStats::default());
        }
        Ok(self.apply_input(addr, &content))
    }

    /// Force an error state onto a cell and recalculate its dependents
    pub fn catch_error(&mut self, addr: CellAddress, error: FormulaError) -> Result<RecalcStats> {
        self.cell_mut(addr)?.store(addr, Err(error));
        let dependents = self.dependents(addr);
        let mut stats = self.propagate(&dependents);
        stats.errors += 1;
        Ok(stats)
    }

    /// Recalculate every cell
    pub fn recalculate(&mut self) -> RecalcStats {
        let all: Vec<CellAddress> = self.cells.keys().copied().collect();
        self.propagate(&all)
    }

    // === Subscriptions ===

    /// Observe every recalculation of a cell
    pub fn subscribe<F>(&mut self, addr: CellAddress, observer: F) -> Result<SubscriptionId>
    where
        F: FnMut(&CellEvent<'_>) + 'static,
    {
        let id = self.next_subscription_id();
        self.cell_mut(addr)?.subscribe(id, Box::new(observer));
        Ok(id)
    }

    /// Observe changes to a cell's value
    pub fn subscribe_to_value<F>(
        &mut self,
        addr: CellAddress,
        callback: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&Value) + 'static,
    {
        let id = self.next_subscription_id();
        self.cell_mut(addr)?.subscribe_to_value(id, Box::new(callback));
        Ok(id)
    }

    /// Drop a subscription; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.cells.values_mut().any(|cell| cell.unsubscribe(id))
    }

    fn next_subscription_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    // === Snapshots ===

    /// Copy of every non-empty cell's input and value
    pub fn snapshot(&self) -> SheetSnapshot {
        let cells = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(addr, cell)| {
                (
                    *addr,
                    CellSnapshot {
                        input: cell.input().to_string(),
                        value: cell.value().clone(),
                    },
                )
            })
            .collect();
        SheetSnapshot {
            rows: self.rows,
            cols: self.cols,
            cells,
        }
    }

    // === Internals ===

    /// Grow the grid to at least `rows` x `cols`
    ///
    /// Formulas that reached past the old edge are refreshed against the new one.
    pub(crate) fn ensure_size(&mut self, rows: u32, cols: u16) -> RecalcStats {
        let (old_rows, old_cols) = (self.rows, self.cols);
        let rows = rows.min(MAX_ROWS).max(old_rows);
        let cols = cols.min(MAX_COLS).max(old_cols);
        if rows == old_rows && cols == old_cols {
            return RecalcStats::default();
        }
        for row in 0..rows {
            for col in 0..cols {
                if row >= old_rows || col >= old_cols {
                    self.cells.insert(CellAddress::new(row, col), Cell::new());
                }
            }
        }
        self.rows = rows;
        self.cols = cols;

        let reaching: Vec<CellAddress> = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.expression().fits_within(old_rows, old_cols))
            .map(|(addr, _)| *addr)
            .collect();
        if !reaching.is_empty() {
            log::debug!(
                "grid grew to {}x{}, refreshing {} formulas",
                rows,
                cols,
                reaching.len()
            );
        }
        let mut stats = RecalcStats::default();
        for addr in reaching {
            stats.absorb(self.refresh(addr));
        }
        stats
    }

    /// Replace a cell's input without touching its history, then recalculate
    pub(crate) fn apply_input(&mut self, addr: CellAddress, text: &str) -> RecalcStats {
        let expression = parse_input(text);
        if let Some(cell) = self.cells.get_mut(&addr) {
            cell.set_input(text, expression);
        }
        self.refresh(addr)
    }

    /// Re-derive a cell's edges from its expression and recalculate from it
    pub(crate) fn refresh(&mut self, addr: CellAddress) -> RecalcStats {
        let targets: Vec<CellAddress> = match self.cells.get(&addr) {
            Some(cell) => cell
                .expression()
                .references_within(self.rows, self.cols),
            None => return RecalcStats::default(),
        };
        self.graph.set_dependencies(addr, targets);
        self.propagate(&[addr])
    }

    /// Evaluate `changed` and everything downstream, in dependency order
    pub(crate) fn propagate(&mut self, changed: &[CellAddress]) -> RecalcStats {
        let plan = self.graph.recalc_order(changed);
        if !plan.cycles.is_empty() {
            log::warn!(
                "Circular reference through {}",
                plan.cycles
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let mut stats = RecalcStats {
            circular_references: plan.cycles.len(),
            ..RecalcStats::default()
        };

        for addr in plan.order {
            let outcome = if plan.cycles.contains(&addr) {
                Err(FormulaError::CircularReference)
            } else {
                match self.cells.get(&addr) {
                    Some(cell) => evaluate(cell.expression(), self),
                    None => continue,
                }
            };
            log::trace!("recalculated {}: {:?}", addr, outcome);

            stats.cells_calculated += 1;
            if outcome.is_err() {
                stats.errors += 1;
            }
            if let Some(cell) = self.cells.get_mut(&addr) {
                cell.store(addr, outcome);
            }
        }
        stats
    }
}

impl CellLookup for Spreadsheet {
    fn contains(&self, addr: &CellAddress) -> bool {
        Spreadsheet::contains(self, addr)
    }

    fn value(&self, addr: &CellAddress) -> Value {
        self.cells
            .get(addr)
            .map(|cell| cell.value().clone())
            .unwrap_or_default()
    }
}
