//! Operation log for sharing edits between participants
//!
//! A [`SheetSyncer`] wraps a local [`Spreadsheet`]. Local edits are applied immediately, queued
//! as pending [`Operation`]s and handed to subscribers for a transport to ship. Remote
//! operations are applied as they arrive and supersede pending local edits to the same cell.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use cosheet_core::{CellAddress, User};

use crate::error::Result;
use crate::spreadsheet::{RecalcStats, Spreadsheet};

/// Kind of edit carried by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperationKind {
    UpdateCell,
    DeleteCell,
}

/// A single edit, as shipped between participants
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    pub kind: OperationKind,
    pub address: CellAddress,
    /// New input; empty for deletions
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub user: User,
}

impl Operation {
    /// Input the operation leaves in its cell
    pub fn input(&self) -> &str {
        match self.kind {
            OperationKind::UpdateCell => &self.value,
            OperationKind::DeleteCell => "",
        }
    }
}

type OperationListener = Box<dyn FnMut(&Operation)>;

/// Local sheet plus the operations not yet acknowledged by the other participants
pub struct SheetSyncer {
    sheet: Spreadsheet,
    user: User,
    pending: Vec<Operation>,
    listeners: Vec<OperationListener>,
}

impl SheetSyncer {
    pub fn new(sheet: Spreadsheet, user: User) -> Self {
        Self {
            sheet,
            user,
            pending: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn sheet(&self) -> &Spreadsheet {
        &self.sheet
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn into_sheet(self) -> Spreadsheet {
        self.sheet
    }

    /// Apply a local edit and queue it for shipping
    pub fn update_cell(&mut self, address: CellAddress, input: &str) -> Result<Operation> {
        let kind = if input.trim().is_empty() {
            OperationKind::DeleteCell
        } else {
            OperationKind::UpdateCell
        };
        self.local(kind, address, input)
    }

    /// Clear a cell locally and queue the deletion
    pub fn delete_cell(&mut self, address: CellAddress) -> Result<Operation> {
        self.local(OperationKind::DeleteCell, address, "")
    }

    fn local(
        &mut self,
        kind: OperationKind,
        address: CellAddress,
        input: &str,
    ) -> Result<Operation> {
        self.sheet.update_contents_at(address, input, &self.user)?;
        let op = Operation {
            kind,
            address,
            value: input.to_string(),
            timestamp: Utc::now(),
            user: self.user.clone(),
        };
        self.pending.push(op.clone());
        for listener in self.listeners.iter_mut() {
            listener(&op);
        }
        Ok(op)
    }

    /// Apply an operation from another participant
    pub fn handle_remote(&mut self, op: &Operation) -> Result<RecalcStats> {
        log::debug!("remote {:?} on {} from {}", op.kind, op.address, op.user);
        self.pending.retain(|pending| pending.address != op.address);
        self.sheet.update_contents_at(op.address, op.input(), &op.user)
    }

    /// Drop a pending operation once the transport has delivered it
    pub fn acknowledge(&mut self, op: &Operation) {
        self.pending.retain(|pending| pending != op);
    }

    /// Local operations not yet acknowledged or superseded
    pub fn pending_operations(&self) -> &[Operation] {
        &self.pending
    }

    /// Listen for local operations
    pub fn subscribe_to_operations<F>(&mut self, listener: F)
    where
        F: FnMut(&Operation) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Every non-empty input, for a participant joining the session
    pub fn current_state(&self) -> BTreeMap<CellAddress, String> {
        self.sheet
            .cells()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(addr, cell)| (addr, cell.input().to_string()))
            .collect()
    }

    /// Load the state sent by another participant, growing the grid to fit
    pub fn apply_state(&mut self, state: &BTreeMap<CellAddress, String>) -> Result<RecalcStats> {
        let mut stats = RecalcStats::default();
        if let Some(rows) = state.keys().map(|a| a.row + 1).max() {
            let cols = state.keys().map(|a| a.col + 1).max().unwrap_or(0);
            stats.absorb(self.sheet.ensure_size(rows, cols));
        }
        for (addr, input) in state {
            stats.absorb(self.sheet.update_contents_at(*addr, input, &self.user)?);
        }
        Ok(stats)
    }
}

impl fmt::Debug for SheetSyncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetSyncer")
            .field("user", &self.user)
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_local_edit_is_pending() {
        let mut syncer = SheetSyncer::new(Spreadsheet::new(2, 2), User::from_id("alice"));
        let op = syncer.update_cell(a("A1"), "5").unwrap();

        assert_eq!(op.kind, OperationKind::UpdateCell);
        assert_eq!(syncer.pending_operations(), &[op.clone()]);

        syncer.acknowledge(&op);
        assert!(syncer.pending_operations().is_empty());
    }

    #[test]
    fn test_blank_update_is_delete() {
        let mut syncer = SheetSyncer::new(Spreadsheet::new(1, 1), User::from_id("alice"));
        syncer.update_cell(a("A1"), "x").unwrap();
        let op = syncer.update_cell(a("A1"), " ").unwrap();
        assert_eq!(op.kind, OperationKind::DeleteCell);
    }

    #[test]
    fn test_remote_supersedes_pending() {
        let mut syncer = SheetSyncer::new(Spreadsheet::new(2, 2), User::from_id("alice"));
        syncer.update_cell(a("A1"), "local").unwrap();
        syncer.update_cell(a("B1"), "other").unwrap();

        let remote = Operation {
            kind: OperationKind::UpdateCell,
            address: a("A1"),
            value: "remote".into(),
            timestamp: Utc::now(),
            user: User::from_id("bob"),
        };
        syncer.handle_remote(&remote).unwrap();

        assert_eq!(syncer.sheet().cell("A1").unwrap().input(), "remote");
        assert_eq!(syncer.pending_operations().len(), 1);
        assert_eq!(syncer.pending_operations()[0].address, a("B1"));
    }
}
