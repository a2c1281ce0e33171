//! Cells of a spreadsheet
//!
//! A cell owns its raw input, the expression parsed from it, the cached result and its version
//! history. Dependency edges are not stored here; the owning [`Spreadsheet`](crate::Spreadsheet)
//! keeps them in a [`DependencyGraph`](cosheet_formula::DependencyGraph).

use std::fmt;

use cosheet_core::{CellAddress, Value, VersionHistory};
use cosheet_formula::{Expression, FormulaError};

/// Handle returned by the subscribe calls, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// What a general observer sees after a cell is recalculated
#[derive(Debug, Clone, Copy)]
pub struct CellEvent<'a> {
    pub address: CellAddress,
    pub input: &'a str,
    pub value: &'a Value,
    pub error: Option<FormulaError>,
}

pub(crate) type Observer = Box<dyn FnMut(&CellEvent<'_>)>;
pub(crate) type ValueObserver = Box<dyn FnMut(&Value)>;

/// A single cell
#[derive(Default)]
pub struct Cell {
    input: String,
    expression: Expression,
    value: Value,
    error: Option<FormulaError>,
    history: VersionHistory,
    observers: Vec<(SubscriptionId, Observer)>,
    value_observers: Vec<(SubscriptionId, ValueObserver)>,
}

impl Cell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raw input as typed
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Parsed expression
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Cached value; null while the cell is in an error state
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Current error state
    pub fn error(&self) -> Option<FormulaError> {
        self.error
    }

    /// Text shown for the cell: the error message, or the rendered value
    pub fn display(&self) -> String {
        match self.error {
            Some(e) => e.to_string(),
            None => self.value.display(),
        }
    }

    /// Version history of this cell's input
    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.input.trim().is_empty()
    }

    pub(crate) fn history_mut(&mut self) -> &mut VersionHistory {
        &mut self.history
    }

    pub(crate) fn set_input(&mut self, input: &str, expression: Expression) {
        self.input = input.to_string();
        self.expression = expression;
    }

    /// Store a result, notifying subscribers
    ///
    /// Value subscribers hear only about changes; general observers hear about every store.
    pub(crate) fn store(&mut self, address: CellAddress, outcome: Result<Value, FormulaError>) {
        let (value, error) = match outcome {
            Ok(value) => (value, None),
            Err(e) => (Value::Null, Some(e)),
        };
        let changed = !self.value.same_as(&value);
        self.value = value;
        self.error = error;

        if changed {
            for (_, callback) in self.value_observers.iter_mut() {
                callback(&self.value);
            }
        }

        let event = CellEvent {
            address,
            input: &self.input,
            value: &self.value,
            error: self.error,
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    pub(crate) fn subscribe(&mut self, id: SubscriptionId, observer: Observer) {
        self.observers.push((id, observer));
    }

    pub(crate) fn subscribe_to_value(&mut self, id: SubscriptionId, callback: ValueObserver) {
        self.value_observers.push((id, callback));
    }

    /// Drop a subscription; returns whether it belonged to this cell
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len() + self.value_observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.value_observers.retain(|(sid, _)| *sid != id);
        before != self.observers.len() + self.value_observers.len()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("input", &self.input)
            .field("value", &self.value)
            .field("error", &self.error)
            .field("history_len", &self.history.len())
            .field("observers", &(self.observers.len() + self.value_observers.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_store_notifies_value_observers_only_on_change() {
        let mut cell = Cell::new();
        let values = Rc::new(RefCell::new(Vec::new()));
        let events = Rc::new(RefCell::new(0));

        let sink = Rc::clone(&values);
        cell.subscribe_to_value(
            SubscriptionId(1),
            Box::new(move |v: &Value| sink.borrow_mut().push(v.clone())),
        );
        let counter = Rc::clone(&events);
        cell.subscribe(
            SubscriptionId(2),
            Box::new(move |_: &CellEvent<'_>| *counter.borrow_mut() += 1),
        );

        let addr = CellAddress::new(0, 0);
        cell.store(addr, Ok(Value::Number(1.0)));
        cell.store(addr, Ok(Value::Number(1.0)));
        cell.store(addr, Err(FormulaError::NullOperand));

        assert_eq!(*values.borrow(), vec![Value::Number(1.0), Value::Null]);
        assert_eq!(*events.borrow(), 3);
        assert_eq!(cell.display(), "Missing operand");
    }

    #[test]
    fn test_nan_stored_twice_is_not_a_change() {
        let mut cell = Cell::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        cell.subscribe_to_value(
            SubscriptionId(1),
            Box::new(move |_: &Value| *counter.borrow_mut() += 1),
        );

        let addr = CellAddress::new(0, 0);
        cell.store(addr, Ok(Value::Number(f64::NAN)));
        cell.store(addr, Ok(Value::Number(f64::NAN)));

        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut cell = Cell::new();
        cell.subscribe(SubscriptionId(7), Box::new(|_: &CellEvent<'_>| {}));
        assert!(cell.unsubscribe(SubscriptionId(7)));
        assert!(!cell.unsubscribe(SubscriptionId(7)));
    }
}
