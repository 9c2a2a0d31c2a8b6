//! Batched process-ancestry harvest over io_uring.
//!
//! Every candidate pid becomes one linked chain of three operations:
//!
//! ```text
//! openat(<proc>/<pid>/status) -> fixed slot N   [IO_LINK]
//! read(slot N, 4 KiB arena buffer)              [IO_HARDLINK]
//! close(slot N)
//! ```
//!
//! A failed open cancels the rest of its chain. A failed read still lets the
//! close run. Slots are registered once per pass and indexed by position in
//! the batch, so the kernel's file table never grows per operation.
//!
//! Paths and read buffers live in the harvester's [`Arena`]. A snapshot taken
//! at the start of a pass is rewound at the end, so repeated passes reuse the
//! same regions.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

use io_uring::{opcode, squeue, types, IoUring};
use tracing::{debug, trace};

use crate::arena::{Arena, ArenaSlice, ArenaStr, REGION_DEFAULT_CAPACITY};
use crate::arena_format;

use super::scanner::{collect_proc_entries, ProcEntry};
use super::tree::AdjacencyMap;
use super::{DescendantSource, Pid};

/// Bytes read from each status file; `PPid:` is well inside this prefix.
pub const STATUS_READ_BYTES: usize = 4096;

/// Candidates submitted per ring batch.
pub const DEFAULT_BATCH_UNITS: usize = 4096;

const OPS_PER_UNIT: usize = 3;

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub proc_root: PathBuf,
    pub status_read_bytes: usize,
    pub batch_units: usize,
    pub arena_region_bytes: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            status_read_bytes: STATUS_READ_BYTES,
            batch_units: DEFAULT_BATCH_UNITS,
            arena_region_bytes: REGION_DEFAULT_CAPACITY * std::mem::size_of::<usize>(),
        }
    }
}

/// One in-flight candidate: its pid, relative status path and read buffer.
struct PendingOp {
    pid: Pid,
    path: ArenaStr,
    buf: ArenaSlice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind {
    Open = 0,
    Read = 1,
    Close = 2,
}

impl OpKind {
    fn name(self) -> &'static str {
        match self {
            OpKind::Open => "open",
            OpKind::Read => "read",
            OpKind::Close => "close",
        }
    }
}

pub(crate) fn encode_user_data(index: usize, kind: OpKind) -> u64 {
    ((index as u64) << 2) | kind as u64
}

pub(crate) fn decode_user_data(data: u64) -> Option<(usize, OpKind)> {
    let kind = match data & 0b11 {
        0 => OpKind::Open,
        1 => OpKind::Read,
        2 => OpKind::Close,
        _ => return None,
    };
    Some(((data >> 2) as usize, kind))
}

/// What a single completion means for the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Open or close finished.
    Done,
    /// Read finished with this many bytes.
    Data(usize),
    /// The process went away between listing and access.
    Vanished,
}

/// Maps a completion result to an outcome; unexpected errnos are fatal.
pub(crate) fn classify(pid: Pid, kind: OpKind, result: i32) -> Result<Outcome, HarvestError> {
    if result >= 0 {
        return Ok(match kind {
            OpKind::Read => Outcome::Data(result as usize),
            OpKind::Open | OpKind::Close => Outcome::Done,
        });
    }
    match -result {
        libc::ENOENT | libc::ESRCH | libc::ECANCELED => Ok(Outcome::Vanished),
        errno => Err(HarvestError::Completion {
            pid,
            op: kind.name(),
            source: io::Error::from_raw_os_error(errno),
        }),
    }
}

/// Builds process ancestry maps from the proc filesystem.
pub struct Harvester {
    config: HarvestConfig,
    arena: Arena,
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new(HarvestConfig::default())
    }
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Self {
        let arena = Arena::with_region_capacity(config.arena_region_bytes);
        Self { config, arena }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Scratch arena, exposed for inspection.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Runs one full pass and returns the parent → children map.
    pub fn adjacency(&mut self) -> Result<AdjacencyMap, HarvestError> {
        let snapshot = self.arena.snapshot();
        let result = self.scan();
        self.arena.rewind(snapshot);
        result
    }

    /// `root` plus every process below it.
    pub fn descendants(&mut self, root: Pid) -> Result<Vec<Pid>, HarvestError> {
        Ok(self.adjacency()?.descendants(root))
    }

    fn scan(&mut self) -> Result<AdjacencyMap, HarvestError> {
        let root = &self.config.proc_root;
        let proc_dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY)
            .open(root)
            .map_err(|source| HarvestError::ProcRoot {
                path: root.clone(),
                source,
            })?;
        let entries = collect_proc_entries(root).map_err(|source| HarvestError::ProcRoot {
            path: root.clone(),
            source,
        })?;

        let mut map = AdjacencyMap::new();
        if entries.is_empty() {
            return Ok(map);
        }

        let batch_units = self.config.batch_units.clamp(1, entries.len());
        let capacity = batch_units * OPS_PER_UNIT;
        let ring_entries =
            u32::try_from(capacity).map_err(|_| HarvestError::QueueFull { capacity })?;
        let mut ring = IoUring::new(ring_entries).map_err(HarvestError::RingSetup)?;

        let slots: Vec<RawFd> = vec![-1; batch_units];
        ring.submitter()
            .register_files(&slots)
            .map_err(HarvestError::Register)?;

        for chunk in entries.chunks(batch_units) {
            self.run_batch(&mut ring, &proc_dir, chunk, &mut map)?;
        }

        debug!(
            "Harvested {} candidates into {} parents ({} KiB scratch)",
            entries.len(),
            map.len(),
            self.arena.used_bytes() / 1024
        );
        Ok(map)
    }

    fn run_batch(
        &mut self,
        ring: &mut IoUring,
        proc_dir: &File,
        chunk: &[ProcEntry],
        map: &mut AdjacencyMap,
    ) -> Result<(), HarvestError> {
        let read_len = self.config.status_read_bytes;
        let ops: Vec<PendingOp> = chunk
            .iter()
            .map(|entry| PendingOp {
                pid: entry.pid,
                path: arena_format!(self.arena, "{}/status", entry.pid),
                buf: self.arena.alloc(read_len),
            })
            .collect();

        let capacity = ring.params().sq_entries() as usize;
        for (index, op) in ops.iter().enumerate() {
            let chain = self.prepare(proc_dir.as_raw_fd(), index, op, capacity)?;
            // SAFETY: the path and buffer pointers in `chain` point into arena
            // regions that stay allocated and un-rewound until every
            // completion of this batch has been reaped below.
            unsafe { ring.submission().push_multiple(&chain) }
                .map_err(|_| HarvestError::QueueFull { capacity })?;
        }
        ring.submit().map_err(HarvestError::Submit)?;

        // Every chain is reaped even after a fatal completion: the kernel may
        // still write into this batch's buffers until its last CQE arrives.
        let mut first_error = None;
        let mut outstanding = ops.len() * OPS_PER_UNIT;
        while outstanding > 0 {
            let ready: Vec<(u64, i32)> = ring
                .completion()
                .map(|cqe| (cqe.user_data(), cqe.result()))
                .collect();

            if ready.is_empty() {
                match ring.submit_and_wait(1) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(HarvestError::Wait(e)),
                }
                continue;
            }

            for (data, result) in ready {
                outstanding = outstanding.saturating_sub(1);
                let Some((kind, op)) = decode_user_data(data)
                    .and_then(|(index, kind)| Some((kind, ops.get(index)?)))
                else {
                    first_error.get_or_insert(HarvestError::UnknownCompletion(data));
                    continue;
                };
                if first_error.is_some() {
                    continue;
                }

                match classify(op.pid, kind, result) {
                    Ok(Outcome::Data(0)) => trace!("pid {}: empty status", op.pid),
                    Ok(Outcome::Data(n)) => {
                        let status = &self.arena.bytes(op.buf)[..n.min(op.buf.len())];
                        if !map.record_status(op.pid, status) {
                            trace!("pid {}: no parent recorded", op.pid);
                        }
                    }
                    Ok(Outcome::Vanished) => {
                        trace!("pid {}: {} raced with exit ({})", op.pid, kind.name(), result)
                    }
                    Ok(Outcome::Done) => {}
                    Err(e) => {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn prepare(
        &mut self,
        dirfd: RawFd,
        index: usize,
        op: &PendingOp,
        capacity: usize,
    ) -> Result<[squeue::Entry; OPS_PER_UNIT], HarvestError> {
        let slot = u32::try_from(index).map_err(|_| HarvestError::QueueFull { capacity })?;
        let target = types::DestinationSlot::try_from_slot_target(slot)
            .map_err(|_| HarvestError::QueueFull { capacity })?;

        let path = self.arena.as_ptr(op.path.as_slice()).cast::<libc::c_char>();
        let len = u32::try_from(op.buf.len()).unwrap_or(u32::MAX);
        let buf = self.arena.as_mut_ptr(op.buf);

        let open = opcode::OpenAt::new(types::Fd(dirfd), path)
            .flags(libc::O_RDONLY)
            .file_index(Some(target))
            .build()
            .flags(squeue::Flags::IO_LINK)
            .user_data(encode_user_data(index, OpKind::Open));
        let read = opcode::Read::new(types::Fixed(slot), buf, len)
            .build()
            .flags(squeue::Flags::IO_HARDLINK)
            .user_data(encode_user_data(index, OpKind::Read));
        let close = opcode::Close::new(types::Fixed(slot))
            .build()
            .user_data(encode_user_data(index, OpKind::Close));

        Ok([open, read, close])
    }
}

impl DescendantSource for Harvester {
    fn descendants_of(&mut self, roots: &[Pid]) -> Result<Vec<Pid>, HarvestError> {
        Ok(self.adjacency()?.descendants_of(roots))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("cannot read process table {path:?}: {source}")]
    ProcRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io_uring setup failed: {0}")]
    RingSetup(#[source] io::Error),

    #[error("io_uring file registration failed: {0}")]
    Register(#[source] io::Error),

    #[error("io_uring submission failed: {0}")]
    Submit(#[source] io::Error),

    #[error("io_uring wait failed: {0}")]
    Wait(#[source] io::Error),

    #[error("io_uring submission queue exhausted ({capacity} entries reserved)")]
    QueueFull { capacity: usize },

    #[error("{op} of status for pid {pid} failed: {source}")]
    Completion {
        pid: Pid,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("completion for unknown submission {0:#x}")]
    UnknownCompletion(u64),
}

impl HarvestError {
    /// True when the kernel or sandbox does not offer the io_uring features
    /// the harvester needs.
    pub fn is_unsupported(&self) -> bool {
        let errno = match self {
            HarvestError::RingSetup(e) | HarvestError::Register(e) => e.raw_os_error(),
            HarvestError::Completion { source, .. } => source.raw_os_error(),
            _ => None,
        };
        matches!(
            errno,
            Some(libc::EPERM | libc::ENOSYS | libc::EACCES | libc::EINVAL | libc::EOPNOTSUPP)
        )
    }
}
