//! Dependency tracking for formula calculation
//!
//! Edges live outside the cells: two adjacency maps keyed by address, kept mutual after every
//! public call (if `b` is among the precedents of `a`, then `a` is among the dependents of `b`).

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use cosheet_core::CellAddress;

/// Dependency graph for formula cells
///
/// Tracks which cells depend on which other cells,
/// enabling ordered recalculation.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → Cells that read it (dependents)
    dependents: AHashMap<CellAddress, BTreeSet<CellAddress>>,
    /// Cell → Cells it reads (precedents)
    precedents: AHashMap<CellAddress, BTreeSet<CellAddress>>,
}

/// Result of planning a recalculation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecalcOrder {
    /// Cells to evaluate, each after everything it reads (except along a cycle)
    pub order: Vec<CellAddress>,
    /// Cells found on a reference cycle during the pass
    pub cycles: BTreeSet<CellAddress>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `dependent` reads `precedent`
    pub fn add_dependency(&mut self, precedent: CellAddress, dependent: CellAddress) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace everything `cell` reads with `targets`
    pub fn set_dependencies<I>(&mut self, cell: CellAddress, targets: I)
    where
        I: IntoIterator<Item = CellAddress>,
    {
        self.clear_dependencies(cell);
        for target in targets {
            self.add_dependency(target, cell);
        }
    }

    /// Remove the outgoing edges of a cell; cells that read it are untouched
    pub fn clear_dependencies(&mut self, cell: CellAddress) {
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Remove every edge touching a cell
    pub fn remove_cell(&mut self, cell: CellAddress) {
        self.clear_dependencies(cell);

        if let Some(dependents) = self.dependents.remove(&cell) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(&cell);
                    if precs.is_empty() {
                        self.precedents.remove(&dependent);
                    }
                }
            }
        }
    }

    /// Cells that read the given cell, in address order
    pub fn dependents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells the given cell reads, in address order
    pub fn precedents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Plan the recalculation that follows a change to `changed`
    ///
    /// Walks dependents depth-first with an explicit stack. Each cell is entered at most once per
    /// pass; reaching a cell that is still on the current path closes a cycle, and every cell on
    /// that stretch of the path is reported in [`RecalcOrder::cycles`] instead of being descended
    /// into again.
    pub fn recalc_order(&self, changed: &[CellAddress]) -> RecalcOrder {
        let mut postorder = Vec::new();
        let mut cycles = BTreeSet::new();
        let mut visited: AHashSet<CellAddress> = AHashSet::new();
        let mut on_path: AHashSet<CellAddress> = AHashSet::new();

        for &start in changed {
            if !visited.insert(start) {
                continue;
            }
            on_path.insert(start);
            let mut stack = vec![(start, self.pending_dependents(start))];

            loop {
                let (cell, next) = match stack.last_mut() {
                    Some((cell, pending)) => (*cell, pending.pop()),
                    None => break,
                };

                match next {
                    Some(dependent) if on_path.contains(&dependent) => {
                        if let Some(pos) = stack.iter().position(|(c, _)| *c == dependent) {
                            cycles.extend(stack[pos..].iter().map(|(c, _)| *c));
                        }
                    }
                    Some(dependent) => {
                        if visited.insert(dependent) {
                            on_path.insert(dependent);
                            stack.push((dependent, self.pending_dependents(dependent)));
                        }
                    }
                    None => {
                        stack.pop();
                        on_path.remove(&cell);
                        postorder.push(cell);
                    }
                }
            }
        }

        postorder.reverse();
        RecalcOrder {
            order: postorder,
            cycles,
        }
    }

    /// Dependents in reverse order, so popping visits them in address order
    fn pending_dependents(&self, cell: CellAddress) -> Vec<CellAddress> {
        let mut pending: Vec<_> = self.dependents(cell).collect();
        pending.reverse();
        pending
    }

    /// Detect circular references reachable from a cell
    pub fn has_circular_reference(&self, cell: CellAddress) -> bool {
        !self.recalc_order(&[cell]).cycles.is_empty()
    }

    /// Move every edge endpoint through `f`
    ///
    /// Edges with an endpoint mapped to `None` are dropped.
    pub fn remap<F>(&mut self, f: F)
    where
        F: Fn(CellAddress) -> Option<CellAddress>,
    {
        let precedents = std::mem::take(&mut self.precedents);
        self.dependents.clear();

        for (dependent, precs) in precedents {
            let Some(new_dependent) = f(dependent) else {
                continue;
            };
            for precedent in precs {
                if let Some(new_precedent) = f(precedent) {
                    self.add_dependency(new_precedent, new_dependent);
                }
            }
        }
    }

    /// Whether every edge is recorded in both directions
    pub fn is_consistent(&self) -> bool {
        let forward = self.precedents.iter().all(|(dependent, precs)| {
            precs.iter().all(|p| {
                self.dependents
                    .get(p)
                    .is_some_and(|deps| deps.contains(dependent))
            })
        });
        let backward = self.dependents.iter().all(|(precedent, deps)| {
            deps.iter().all(|d| {
                self.precedents
                    .get(d)
                    .is_some_and(|precs| precs.contains(precedent))
            })
        });
        forward && backward
    }

    /// Number of cells that read at least one other cell
    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }
}
