//! Parent → children map built from one harvest pass.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::collections::VecDeque;

use super::status::parse_ppid;
use super::Pid;

/// Child lists keyed by parent pid.
///
/// Sibling order is discovery order, which depends on completion order and
/// is not numeric.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyMap {
    children: HashMap<Pid, Vec<Pid>>,
}

impl AdjacencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from `(child, parent)` links.
    pub fn from_links(links: impl IntoIterator<Item = (Pid, Pid)>) -> Self {
        let mut map = Self::new();
        for (child, parent) in links {
            map.insert(parent, child);
        }
        map
    }

    pub fn insert(&mut self, parent: Pid, child: Pid) {
        self.children.entry(parent).or_default().push(child);
    }

    /// Records `pid` under the parent named in its status text.
    ///
    /// Returns false when the buffer has no parent or the parent is 0.
    pub fn record_status(&mut self, pid: Pid, status: &[u8]) -> bool {
        match parse_ppid(status) {
            Some(0) | None => false,
            Some(ppid) => {
                self.insert(ppid, pid);
                true
            }
        }
    }

    pub fn children(&self, pid: Pid) -> &[Pid] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of parents with at least one child.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// `root` and all of its transitive children.
    pub fn descendants(&self, root: Pid) -> Vec<Pid> {
        self.descendants_of(&[root])
    }

    /// Union of the descendant sets of `roots`, each pid listed once.
    pub fn descendants_of(&self, roots: &[Pid]) -> Vec<Pid> {
        let mut seen: HashSet<Pid> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<Pid> = roots.iter().copied().collect();

        while let Some(pid) = queue.pop_front() {
            if !seen.insert(pid) {
                continue;
            }
            out.push(pid);
            queue.extend(self.children(pid).iter().copied());
        }
        out
    }
}
