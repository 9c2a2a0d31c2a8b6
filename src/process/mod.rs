//! Process-side plumbing: ancestry harvest and stop/continue delivery.
//!
//! This module provides:
//! - `scanner`: enumeration of candidate pids under the proc root
//! - `status`: `PPid:` extraction from status buffers
//! - `tree`: the parent → children map and descendant walks
//! - `harvest`: the io_uring pass that fills the map
//! - `signal`: SIGSTOP / SIGCONT delivery

pub mod harvest;
pub mod scanner;
pub mod signal;
pub mod status;
pub mod tree;

/// Kernel process id as reported by the compositor and the proc filesystem.
pub type Pid = u32;

pub use harvest::{HarvestConfig, HarvestError, Harvester, DEFAULT_BATCH_UNITS, STATUS_READ_BYTES};
pub use scanner::{collect_proc_entries, ProcEntry};
pub use signal::{NixSignaller, ProcessSignaller};
pub use status::parse_ppid;
pub use tree::AdjacencyMap;

/// Anything that can expand a set of root pids into their process subtrees.
pub trait DescendantSource {
    /// Union of `roots` and every process below them.
    fn descendants_of(&mut self, roots: &[Pid]) -> Result<Vec<Pid>, HarvestError>;
}
