//! Tests for exchanging edits between participants

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use cosheet::prelude::*;
use cosheet::{Operation, OperationKind};
use pretty_assertions::assert_eq;

fn addr(s: &str) -> CellAddress {
    CellAddress::parse(s).unwrap()
}

fn participant(id: &str) -> SheetSyncer {
    SheetSyncer::new(Spreadsheet::new(3, 3), User::from_id(id))
}

/// Operations shipped from one participant reproduce its edits on another
#[test]
fn test_two_participants_converge() {
    let mut alice = participant("alice");
    let mut bob = participant("bob");

    let outbox = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&outbox);
    alice.subscribe_to_operations(move |op: &Operation| sink.borrow_mut().push(op.clone()));

    alice.update_cell(addr("A1"), "2").unwrap();
    alice.update_cell(addr("A2"), "=REF(A1)*21").unwrap();

    for op in outbox.borrow().iter() {
        bob.handle_remote(op).unwrap();
        alice.acknowledge(op);
    }

    assert!(alice.pending_operations().is_empty());
    assert_eq!(bob.sheet().cell("A2").unwrap().display(), "42");
    assert_eq!(bob.current_state(), alice.current_state());

    // Remote edits are recorded under the sender's name
    let head = bob.sheet().cell("A1").unwrap().history().head().cloned().unwrap();
    assert_eq!(head.author(), &User::from_id("alice"));
}

/// Deletions travel as their own operation kind
#[test]
fn test_delete_operation() {
    let mut alice = participant("alice");
    let mut bob = participant("bob");

    let set = alice.update_cell(addr("B2"), "x").unwrap();
    let delete = alice.delete_cell(addr("B2")).unwrap();
    assert_eq!(delete.kind, OperationKind::DeleteCell);
    assert_eq!(delete.input(), "");

    bob.handle_remote(&set).unwrap();
    bob.handle_remote(&delete).unwrap();

    assert!(bob.sheet().cell("B2").unwrap().is_empty());
    assert!(bob.current_state().is_empty());
}

/// A joining participant loads the current state and grows to fit it
#[test]
fn test_join_with_current_state() {
    let mut host = SheetSyncer::new(Spreadsheet::new(6, 4), User::from_id("host"));
    host.update_cell(addr("A1"), "1").unwrap();
    host.update_cell(addr("D6"), "=REF(A1)+1").unwrap();

    let mut guest = SheetSyncer::new(Spreadsheet::new(1, 1), User::from_id("guest"));
    guest.apply_state(&host.current_state()).unwrap();

    assert_eq!(guest.sheet().dimensions(), (6, 4));
    assert_eq!(guest.sheet().cell("D6").unwrap().display(), "2");
    assert!(guest.pending_operations().is_empty());
}

/// Loading a state that grows the grid resolves references that pointed past the old edge
#[test]
fn test_state_fills_reference_past_the_edge() {
    let mut guest = SheetSyncer::new(Spreadsheet::new(2, 2), User::from_id("guest"));
    guest.update_cell(addr("A1"), "=REF(C3)").unwrap();
    assert_eq!(
        guest.sheet().cell("A1").unwrap().error(),
        Some(FormulaError::InvalidReference)
    );

    let state: BTreeMap<_, _> = [(addr("C3"), "5".to_string())].into_iter().collect();
    guest.apply_state(&state).unwrap();

    assert_eq!(guest.sheet().dimensions(), (3, 3));
    assert_eq!(guest.sheet().cell("A1").unwrap().display(), "5");
}

/// A remote edit supersedes the local pending edit to the same cell
#[test]
fn test_remote_wins_over_pending() {
    let mut alice = participant("alice");
    let mut bob = participant("bob");

    alice.update_cell(addr("A1"), "alice's").unwrap();
    let theirs = bob.update_cell(addr("A1"), "bob's").unwrap();

    alice.handle_remote(&theirs).unwrap();

    assert!(alice.pending_operations().is_empty());
    assert_eq!(alice.sheet().cell("A1").unwrap().input(), "bob's");
    assert_eq!(alice.into_sheet().cell("A1").unwrap().history().len(), 2);
}

/// Operations address cells outside the grid only by mistake
#[test]
fn test_out_of_grid_edit_fails() {
    let mut alice = participant("alice");
    assert!(alice.update_cell(addr("Z99"), "1").is_err());
    assert!(alice.pending_operations().is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn test_operation_json() {
    let mut alice = participant("alice");
    let op = alice.update_cell(addr("C3"), "=1+1").unwrap();

    let json = serde_json::to_string(&op).unwrap();
    let back: Operation = serde_json::from_str(&json).unwrap();

    assert_eq!(back, op);
}
