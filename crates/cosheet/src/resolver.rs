//! Conflict resolution for merges
//!
//! The resolver holds one pending decision per conflicting address. Decisions come from a
//! handler registered with [`MergeConflictResolver::on_conflict`], or from a caller-owned loop
//! that pulls [`ConflictRequest`]s with [`MergeConflictResolver::next_request`] and answers them
//! with [`MergeConflictResolver::resolve_conflict`]. [`MergeConflictResolver::resolve`] joins
//! all of them; it reports what is missing instead of waiting.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use cosheet_core::CellAddress;
use thiserror::Error;

use crate::merge::{CellSnapshot, MergeConflict};

/// Reasons a merge did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The resolver was cancelled
    #[error("merge cancelled")]
    Cancelled,

    /// Decisions were still missing when the timeout elapsed
    #[error("timed out with {0} unresolved conflicts")]
    TimedOut(usize),

    /// Decisions are still missing; supply them and resolve again
    #[error("{} unresolved conflicts: {}", .0.len(), list(.0))]
    Incomplete(Vec<CellAddress>),

    /// A decision was supplied for an address that is not in conflict
    #[error("no conflict at {0}")]
    UnknownConflict(CellAddress),
}

fn list(addresses: &[CellAddress]) -> String {
    addresses
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A decision the resolver is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRequest {
    pub address: CellAddress,
    /// Input on the left (local) side
    pub left: String,
    /// Input on the right (incoming) side
    pub right: String,
}

type ConflictHandler = Box<dyn FnMut(&MergeConflict) -> Option<bool>>;

/// Collects a keep-left/take-right decision for every conflict
#[derive(Default)]
pub struct MergeConflictResolver {
    conflicts: BTreeMap<CellAddress, MergeConflict>,
    decisions: BTreeMap<CellAddress, bool>,
    requested: BTreeSet<CellAddress>,
    handler: Option<ConflictHandler>,
    timeout: Option<Duration>,
    started: Option<Instant>,
    cancelled: bool,
}

impl MergeConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up with [`MergeError::TimedOut`] once `timeout` has passed since conflicts arrived
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a handler consulted for every undecided conflict
    ///
    /// Returning `None` leaves the conflict pending.
    pub fn on_conflict<F>(&mut self, handler: F)
    where
        F: FnMut(&MergeConflict) -> Option<bool> + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Add conflicts to settle
    ///
    /// A decision already recorded for an address is kept if that address is added again.
    pub fn add_conflicts<I>(&mut self, conflicts: I)
    where
        I: IntoIterator<Item = MergeConflict>,
    {
        for conflict in conflicts {
            self.conflicts.insert(conflict.address, conflict);
        }
        if !self.conflicts.is_empty() && self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Next undecided conflict that has not been handed out yet
    pub fn next_request(&mut self) -> Option<ConflictRequest> {
        let conflict = self.conflicts.values().find(|c| {
            !self.decisions.contains_key(&c.address) && !self.requested.contains(&c.address)
        })?;
        let request = ConflictRequest {
            address: conflict.address,
            left: conflict.left.input.clone(),
            right: conflict.right.input.clone(),
        };
        self.requested.insert(request.address);
        Some(request)
    }

    /// Supply the decision for one address
    pub fn resolve_conflict(
        &mut self,
        address: CellAddress,
        keep_left: bool,
    ) -> Result<(), MergeError> {
        if !self.conflicts.contains_key(&address) {
            return Err(MergeError::UnknownConflict(address));
        }
        self.decisions.insert(address, keep_left);
        Ok(())
    }

    /// Addresses still waiting for a decision
    pub fn pending(&self) -> Vec<CellAddress> {
        self.conflicts
            .keys()
            .filter(|addr| !self.decisions.contains_key(addr))
            .copied()
            .collect()
    }

    /// Abandon the merge
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Join every decision
    ///
    /// On success the settled cells are returned and the resolver is emptied for reuse.
    pub fn resolve(&mut self) -> Result<BTreeMap<CellAddress, CellSnapshot>, MergeError> {
        if self.cancelled {
            log::warn!("merge cancelled with {} conflicts", self.conflicts.len());
            return Err(MergeError::Cancelled);
        }

        if let Some(handler) = self.handler.as_mut() {
            for conflict in self.conflicts.values() {
                if self.decisions.contains_key(&conflict.address) {
                    continue;
                }
                if let Some(keep_left) = handler(conflict) {
                    self.decisions.insert(conflict.address, keep_left);
                }
            }
        }

        let pending = self.pending();
        if !pending.is_empty() {
            let expired = match (self.timeout, self.started) {
                (Some(timeout), Some(started)) => started.elapsed() >= timeout,
                _ => false,
            };
            if expired {
                log::warn!("merge timed out with {} unresolved conflicts", pending.len());
                return Err(MergeError::TimedOut(pending.len()));
            }
            return Err(MergeError::Incomplete(pending));
        }

        let resolved = self
            .conflicts
            .values()
            .filter_map(|c| {
                self.decisions
                    .get(&c.address)
                    .map(|&keep_left| (c.address, c.take(keep_left)))
            })
            .collect();

        self.conflicts.clear();
        self.decisions.clear();
        self.requested.clear();
        self.started = None;
        Ok(resolved)
    }
}

impl fmt::Debug for MergeConflictResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeConflictResolver")
            .field("conflicts", &self.conflicts.len())
            .field("decisions", &self.decisions.len())
            .field("has_handler", &self.handler.is_some())
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conflict(addr: &str, left: &str, right: &str) -> MergeConflict {
        MergeConflict {
            address: CellAddress::parse(addr).unwrap(),
            left: CellSnapshot::input(left),
            right: CellSnapshot::input(right),
        }
    }

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_without_conflicts() {
        let mut resolver = MergeConflictResolver::new();
        assert_eq!(resolver.resolve(), Ok(BTreeMap::new()));
    }

    #[test]
    fn test_incomplete_then_complete() {
        let mut resolver = MergeConflictResolver::new();
        resolver.add_conflicts([conflict("A1", "l1", "r1"), conflict("B2", "l2", "r2")]);

        resolver.resolve_conflict(a("A1"), true).unwrap();
        assert_eq!(resolver.resolve(), Err(MergeError::Incomplete(vec![a("B2")])));

        resolver.resolve_conflict(a("B2"), false).unwrap();
        let resolved = resolver.resolve().unwrap();
        assert_eq!(resolved[&a("A1")].input, "l1");
        assert_eq!(resolved[&a("B2")].input, "r2");
        assert!(resolver.pending().is_empty());
    }

    #[test]
    fn test_handler_decides() {
        let mut resolver = MergeConflictResolver::new();
        resolver.on_conflict(|c| Some(c.left.input.len() >= c.right.input.len()));
        resolver.add_conflicts([conflict("A1", "long", "s"), conflict("A2", "s", "long")]);

        let resolved = resolver.resolve().unwrap();
        assert_eq!(resolved[&a("A1")].input, "long");
        assert_eq!(resolved[&a("A2")].input, "long");
    }

    #[test]
    fn test_pull_requests() {
        let mut resolver = MergeConflictResolver::new();
        resolver.add_conflicts([conflict("A1", "x", "y"), conflict("A2", "p", "q")]);

        let mut seen = Vec::new();
        while let Some(request) = resolver.next_request() {
            seen.push(request.address);
            resolver.resolve_conflict(request.address, false).unwrap();
        }

        assert_eq!(seen, vec![a("A1"), a("A2")]);
        assert_eq!(resolver.resolve().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_conflict() {
        let mut resolver = MergeConflictResolver::new();
        assert_eq!(
            resolver.resolve_conflict(a("C3"), true),
            Err(MergeError::UnknownConflict(a("C3")))
        );
    }

    #[test]
    fn test_cancel() {
        let mut resolver = MergeConflictResolver::new();
        resolver.add_conflicts([conflict("A1", "x", "y")]);
        resolver.cancel();
        assert_eq!(resolver.resolve(), Err(MergeError::Cancelled));
    }

    #[test]
    fn test_timeout() {
        let mut resolver = MergeConflictResolver::new().with_timeout(Duration::ZERO);
        resolver.add_conflicts([conflict("A1", "x", "y")]);
        assert_eq!(resolver.resolve(), Err(MergeError::TimedOut(1)));
    }
}
