//! Per-cell branching version history
//!
//! Every content change of a cell is recorded as an immutable [`VersionEntry`]. Entries are
//! appended to the active (last) [`Branch`]. Reverting to an older entry does not touch the
//! history by itself: the *next* edit forks a new branch whose parent is the reverted entry.
//! If that fork's content equals the head of an existing branch, the fork is dropped again
//! (the edit converged on known content).
//!
//! ```text
//! branch 0:  e1 ── e2 ── e3
//!                   └── branch 1:  e4 ── e5      (revert(e2) then two edits)
//! ```

use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ahash::AHashMap;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::user::User;

/// Opaque identifier of a version entry, unique within one cell's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix('v')
            .and_then(|n| n.parse().ok())
            .map(EntryId)
            .ok_or_else(|| Error::UnknownVersion(s.to_string()))
    }
}

/// Hash of an entry's content, used to detect convergent edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentHash(u64);

impl ContentHash {
    /// Hash a piece of content with fixed keys (stable across runs)
    pub fn of(content: &str) -> Self {
        let mut hasher = ahash::AHasher::default();
        content.hash(&mut hasher);
        ContentHash(hasher.finish())
    }
}

/// A single recorded content change
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionEntry {
    id: EntryId,
    parent: Option<EntryId>,
    author: User,
    timestamp: DateTime<Utc>,
    content: String,
    content_hash: ContentHash,
}

impl VersionEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The entry this one was derived from (`None` for the very first entry)
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn author(&self) -> &User {
        &self.author
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }
}

/// Where a branch forked off: the branch index and entry id it grew from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchParent {
    pub branch: usize,
    pub entry: EntryId,
}

/// An ordered run of entries sharing a lineage
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Branch {
    entries: Vec<VersionEntry>,
    parent: Option<BranchParent>,
}

impl Branch {
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Fork point; `None` only for branch 0
    pub fn parent(&self) -> Option<BranchParent> {
        self.parent
    }

    /// Latest entry of the branch
    pub fn head(&self) -> Option<&VersionEntry> {
        self.entries.last()
    }
}

/// Branching history of a single cell
#[derive(Debug, Clone)]
pub struct VersionHistory {
    branches: Vec<Branch>,
    next_id: u64,
    pending_revert: Option<EntryId>,
    /// Entry id -> (branch index, position in branch)
    locations: AHashMap<EntryId, (usize, usize)>,
    /// Head content hash -> branches whose head has that hash
    heads: AHashMap<ContentHash, Vec<usize>>,
}

impl Default for VersionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionHistory {
    /// Create an empty history (branch 0 exists and has no parent)
    pub fn new() -> Self {
        Self {
            branches: vec![Branch::default()],
            next_id: 1,
            pending_revert: None,
            locations: AHashMap::new(),
            heads: AHashMap::new(),
        }
    }

    /// Record a content change made now
    pub fn add_entry(&mut self, content: &str, author: &User) -> EntryId {
        self.add_entry_at(content, author, Utc::now())
    }

    /// Record a content change with an explicit timestamp
    ///
    /// Returns the id of the entry that represents the content afterwards. When a pending
    /// revert forks a branch that converges on an existing head, that head's id is returned.
    pub fn add_entry_at(
        &mut self,
        content: &str,
        author: &User,
        timestamp: DateTime<Utc>,
    ) -> EntryId {
        let content_hash = ContentHash::of(content);
        let id = EntryId(self.next_id);
        self.next_id += 1;

        if let Some(reverted) = self.pending_revert.take() {
            if let Some(&(branch, _)) = self.locations.get(&reverted) {
                if let Some(existing) = self.find_head(content_hash, content) {
                    // Convergent edit: the fork would duplicate an existing head
                    return existing;
                }

                let entry = VersionEntry {
                    id,
                    parent: Some(reverted),
                    author: author.clone(),
                    timestamp,
                    content: content.to_string(),
                    content_hash,
                };
                self.branches.push(Branch {
                    entries: Vec::new(),
                    parent: Some(BranchParent {
                        branch,
                        entry: reverted,
                    }),
                });
                let index = self.branches.len() - 1;
                self.push_entry(index, entry);
                return id;
            }
        }

        let index = self.branches.len() - 1;
        let parent = self.branches[index].head().map(|e| e.id);
        let entry = VersionEntry {
            id,
            parent,
            author: author.clone(),
            timestamp,
            content: content.to_string(),
            content_hash,
        };
        self.push_entry(index, entry);
        id
    }

    /// Mark an entry as the base for the next edit
    pub fn revert(&mut self, entry: EntryId) -> Result<()> {
        if !self.locations.contains_key(&entry) {
            return Err(Error::UnknownVersion(entry.to_string()));
        }
        self.pending_revert = Some(entry);
        Ok(())
    }

    /// Entry awaiting the next edit, if a revert is pending
    pub fn pending_revert(&self) -> Option<EntryId> {
        self.pending_revert
    }

    /// All branches, branch 0 first
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Look up an entry by id
    pub fn entry(&self, id: EntryId) -> Option<&VersionEntry> {
        let &(branch, pos) = self.locations.get(&id)?;
        self.branches.get(branch)?.entries.get(pos)
    }

    /// Index of the branch holding an entry
    pub fn branch_of(&self, id: EntryId) -> Option<usize> {
        self.locations.get(&id).map(|&(branch, _)| branch)
    }

    /// Latest entry of the active branch
    pub fn head(&self) -> Option<&VersionEntry> {
        self.branches.last().and_then(Branch::head)
    }

    /// Total number of entries across all branches
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn find_head(&self, hash: ContentHash, content: &str) -> Option<EntryId> {
        let candidates = self.heads.get(&hash)?;
        candidates
            .iter()
            .filter_map(|&b| self.branches[b].head())
            // Hash collision check
            .find(|head| head.content == content)
            .map(|head| head.id)
    }

    fn push_entry(&mut self, branch: usize, entry: VersionEntry) {
        if let Some(old_head) = self.branches[branch].head() {
            if let Some(list) = self.heads.get_mut(&old_head.content_hash) {
                list.retain(|&b| b != branch);
            }
        }

        match self.heads.entry(entry.content_hash) {
            Entry::Occupied(mut e) => e.get_mut().push(branch),
            Entry::Vacant(e) => {
                e.insert(vec![branch]);
            }
        }

        let pos = self.branches[branch].entries.len();
        self.locations.insert(entry.id, (branch, pos));
        self.branches[branch].entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contents(branch: &Branch) -> Vec<&str> {
        branch.entries().iter().map(|e| e.content()).collect()
    }

    #[test]
    fn test_linear_history() {
        let user = User::from_id("alice");
        let mut history = VersionHistory::new();
        assert_eq!(history.branch_count(), 1);
        assert!(history.is_empty());

        let first = history.add_entry("1", &user);
        let second = history.add_entry("2", &user);

        assert_eq!(history.len(), 2);
        assert_eq!(history.branch_count(), 1);
        assert_eq!(contents(&history.branches()[0]), vec!["1", "2"]);
        assert_eq!(history.branches()[0].parent(), None);
        assert_eq!(history.entry(first).unwrap().parent(), None);
        assert_eq!(history.entry(second).unwrap().parent(), Some(first));
        assert_eq!(history.head().unwrap().id(), second);
    }

    #[test]
    fn test_revert_then_edit_forks_branch() {
        let user = User::from_id("alice");
        let mut history = VersionHistory::new();
        let first = history.add_entry("1", &user);
        history.add_entry("2", &user);

        history.revert(first).unwrap();
        assert_eq!(history.branch_count(), 1);
        assert_eq!(history.pending_revert(), Some(first));

        let forked = history.add_entry("3", &user);
        assert_eq!(history.branch_count(), 2);
        assert_eq!(history.pending_revert(), None);

        let branch = &history.branches()[1];
        assert_eq!(
            branch.parent(),
            Some(BranchParent {
                branch: 0,
                entry: first
            })
        );
        assert_eq!(history.entry(forked).unwrap().parent(), Some(first));

        // Later edits land on the active (last) branch
        history.add_entry("4", &user);
        assert_eq!(contents(&history.branches()[1]), vec!["3", "4"]);
    }

    #[test]
    fn test_convergent_fork_is_dropped() {
        let user = User::from_id("alice");
        let mut history = VersionHistory::new();
        let first = history.add_entry("1", &user);
        let second = history.add_entry("2", &user);

        history.revert(first).unwrap();
        let merged = history.add_entry("2", &user);

        assert_eq!(history.branch_count(), 1);
        assert_eq!(merged, second);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let user = User::from_id("bob");
        let mut history = VersionHistory::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(history.add_entry(&i.to_string(), &user));
        }
        history.revert(ids[1]).unwrap();
        ids.push(history.add_entry("x", &user));
        ids.push(history.add_entry("y", &user));

        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn test_revert_unknown_entry() {
        let mut history = VersionHistory::new();
        let err = history.revert(EntryId(99)).unwrap_err();
        assert_eq!(err, Error::UnknownVersion("v99".into()));
    }

    #[test]
    fn test_entry_id_parse() {
        assert_eq!("v12".parse::<EntryId>().unwrap(), EntryId(12));
        assert!("12".parse::<EntryId>().is_err());
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(ContentHash::of("=1+1"), ContentHash::of("=1+1"));
        assert_ne!(ContentHash::of("=1+1"), ContentHash::of("=1+2"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_branch_serializes() {
        let user = User::from_id("alice");
        let mut history = VersionHistory::new();
        history.add_entry("=42", &user);
        let json = serde_json::to_string(history.branches()).unwrap();
        assert!(json.contains("=42"));
    }
}
