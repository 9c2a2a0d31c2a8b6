//! sway-freezer library
//!
//! Building blocks for suspending unfocused compositor applications together
//! with every process they spawned.
//!
//! # Modules
//!
//! - [`arena`]: region-chained bump allocator with snapshot/rewind
//! - [`ipc`]: i3-ipc framing, the async client and typed payloads
//! - [`process`]: io_uring process-tree harvest and SIGSTOP/SIGCONT delivery
//! - [`engine`]: the focus/debounce state machine tying them together
//!
//! # Usage
//!
//! ```rust
//! use sway_freezer::process::AdjacencyMap;
//!
//! let map = AdjacencyMap::from_links([(2, 1), (3, 2), (4, 2), (5, 1)]);
//! let mut below_two = map.descendants(2);
//! below_two.sort_unstable();
//! assert_eq!(below_two, vec![2, 3, 4]);
//! ```

pub mod arena;
pub mod engine;
pub mod ipc;
pub mod process;

// Re-export main types for convenience
pub use arena::{Arena, ArenaSlice, ArenaStr, Snapshot};
pub use engine::{AppState, SuspensionEngine, TimerCommand, TrackedApp};
pub use ipc::{IpcClient, IpcError};
pub use process::{DescendantSource, HarvestError, Harvester, NixSignaller, Pid, ProcessSignaller};
